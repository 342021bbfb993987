//! Resource records - one billed cloud resource per row of the billing export.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cell values that normalize to "absent". Matches the NA markers the billing
/// exports are produced with, plus the literal `None`.
pub const ABSENT_SENTINELS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Trim a raw cell and map sentinel values to `None`.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if ABSENT_SENTINELS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Numeric coercion for the cost column. Anything unparsable or non-finite counts as zero.
pub fn coerce_cost(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Coarse compliance status of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaggedStatus {
    Yes,
    No,
}

impl TaggedStatus {
    /// Resolve the raw `Tagged` flag. Only "yes" (any case) is tagged; every
    /// other value, absent included, counts as untagged cost.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(v) if v.trim().eq_ignore_ascii_case("yes") => TaggedStatus::Yes,
            _ => TaggedStatus::No,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaggedStatus::Yes => "Yes",
            TaggedStatus::No => "No",
        }
    }
}

impl fmt::Display for TaggedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The twelve columns every loaded table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceField {
    AccountId,
    ResourceId,
    Service,
    Region,
    Environment,
    Department,
    Project,
    Owner,
    CostCenter,
    CreatedBy,
    Tagged,
    Cost,
}

/// Designated tag fields counted by the completeness score.
pub const TAG_FIELDS: [ResourceField; 6] = [
    ResourceField::Department,
    ResourceField::Project,
    ResourceField::Environment,
    ResourceField::Owner,
    ResourceField::CostCenter,
    ResourceField::CreatedBy,
];

impl ResourceField {
    pub const ALL: [ResourceField; 12] = [
        ResourceField::AccountId,
        ResourceField::ResourceId,
        ResourceField::Service,
        ResourceField::Region,
        ResourceField::Environment,
        ResourceField::Department,
        ResourceField::Project,
        ResourceField::Owner,
        ResourceField::CostCenter,
        ResourceField::CreatedBy,
        ResourceField::Tagged,
        ResourceField::Cost,
    ];

    /// Header name used in the CSV exports.
    pub fn column_name(&self) -> &'static str {
        match self {
            ResourceField::AccountId => "AccountID",
            ResourceField::ResourceId => "ResourceID",
            ResourceField::Service => "Service",
            ResourceField::Region => "Region",
            ResourceField::Environment => "Environment",
            ResourceField::Department => "Department",
            ResourceField::Project => "Project",
            ResourceField::Owner => "Owner",
            ResourceField::CostCenter => "CostCenter",
            ResourceField::CreatedBy => "CreatedBy",
            ResourceField::Tagged => "Tagged",
            ResourceField::Cost => "Cost",
        }
    }

    /// Accepts either the header name (`CostCenter`) or snake case (`cost_center`).
    pub fn parse(name: &str) -> Option<Self> {
        let wanted = fold_name(name);
        Self::ALL
            .iter()
            .copied()
            .find(|field| fold_name(field.column_name()) == wanted)
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.column_name())
    }
}

/// Computed columns. Never read from input and never editable.
pub const DERIVED_COLUMNS: &[&str] = &["TaggedResolved", "Tagged_filled", "TagCompleteness"];

pub fn is_derived_column(name: &str) -> bool {
    let folded = fold_name(name);
    DERIVED_COLUMNS.iter().any(|c| fold_name(c) == folded)
}

pub(crate) fn fold_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_' && *c != ' ')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// One row of the dataset.
///
/// `tagged_resolved` is owned by the table: it is set from `tagged` when a table
/// is built and only ever changed by remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub account_id: String,
    pub resource_id: Option<String>,
    pub service: Option<String>,
    pub region: Option<String>,
    pub environment: Option<String>,
    pub department: Option<String>,
    pub project: Option<String>,
    pub owner: Option<String>,
    pub cost_center: Option<String>,
    pub created_by: Option<String>,
    pub tagged: Option<String>,
    pub cost: f64,
    /// Columns outside the fixed schema, keyed by header. Absent cells are not stored.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    #[serde(default = "default_status")]
    tagged_resolved: TaggedStatus,
}

fn default_status() -> TaggedStatus {
    TaggedStatus::No
}

impl Default for ResourceRecord {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            resource_id: None,
            service: None,
            region: None,
            environment: None,
            department: None,
            project: None,
            owner: None,
            cost_center: None,
            created_by: None,
            tagged: None,
            cost: 0.0,
            extra: BTreeMap::new(),
            tagged_resolved: TaggedStatus::No,
        }
    }
}

impl ResourceRecord {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: normalize_cell(&resource_id.into()),
            ..Default::default()
        }
    }

    /// Builder-style setter; the value goes through the same normalization as loaded cells.
    pub fn with(mut self, field: ResourceField, value: &str) -> Self {
        self.set(field, normalize_cell(value));
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_extra(mut self, column: &str, value: &str) -> Self {
        if let Some(v) = normalize_cell(value) {
            self.extra.insert(column.to_string(), v);
        }
        self
    }

    pub fn tagged_resolved(&self) -> TaggedStatus {
        self.tagged_resolved
    }

    /// Number of designated tag fields that hold a value (0..=6).
    pub fn tag_completeness(&self) -> u8 {
        TAG_FIELDS
            .iter()
            .filter(|field| self.get(**field).is_some())
            .count() as u8
    }

    pub fn is_untagged(&self) -> bool {
        self.tagged_resolved == TaggedStatus::No
    }

    /// Text value of a column. `Cost` is numeric and always reported as present.
    pub fn get(&self, field: ResourceField) -> Option<&str> {
        match field {
            ResourceField::AccountId => Some(self.account_id.as_str()),
            ResourceField::ResourceId => self.resource_id.as_deref(),
            ResourceField::Service => self.service.as_deref(),
            ResourceField::Region => self.region.as_deref(),
            ResourceField::Environment => self.environment.as_deref(),
            ResourceField::Department => self.department.as_deref(),
            ResourceField::Project => self.project.as_deref(),
            ResourceField::Owner => self.owner.as_deref(),
            ResourceField::CostCenter => self.cost_center.as_deref(),
            ResourceField::CreatedBy => self.created_by.as_deref(),
            ResourceField::Tagged => self.tagged.as_deref(),
            ResourceField::Cost => None,
        }
    }

    /// Overwrite a column. The value is expected to be normalized already.
    pub fn set(&mut self, field: ResourceField, value: Option<String>) {
        match field {
            ResourceField::AccountId => self.account_id = value.unwrap_or_default(),
            ResourceField::ResourceId => self.resource_id = value,
            ResourceField::Service => self.service = value,
            ResourceField::Region => self.region = value,
            ResourceField::Environment => self.environment = value,
            ResourceField::Department => self.department = value,
            ResourceField::Project => self.project = value,
            ResourceField::Owner => self.owner = value,
            ResourceField::CostCenter => self.cost_center = value,
            ResourceField::CreatedBy => self.created_by = value,
            ResourceField::Tagged => self.tagged = value,
            ResourceField::Cost => self.cost = coerce_cost(value.as_deref()),
        }
    }

    pub fn is_absent(&self, field: ResourceField) -> bool {
        field != ResourceField::Cost && self.get(field).is_none()
    }

    pub(crate) fn resolve_from_flag(&mut self) {
        self.tagged_resolved = TaggedStatus::from_flag(self.tagged.as_deref());
    }

    /// Yes when both Department and Owner are present, otherwise keep the prior status.
    pub(crate) fn resolve_after_edit(&mut self) {
        if self.department.is_some() && self.owner.is_some() {
            self.tagged_resolved = TaggedStatus::Yes;
        }
    }
}
