use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Edit error: {0}")]
    Edit(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal dataset load failures. A load either yields a complete table or one of these.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is empty")]
    Empty,

    #[error("malformed dataset: {0}")]
    Malformed(String),

    #[error("CSV missing MonthlyCostUSD or Cost column (found: {})", columns.join(", "))]
    MissingCostColumn { columns: Vec<String> },
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
