pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod record;
pub mod remediation;
pub mod report;
pub mod session;
pub mod table;

pub use error::{GovernanceError, LoadError, Result};
pub use record::{ResourceField, ResourceRecord, TaggedStatus, TAG_FIELDS};
pub use table::ResourceTable;
