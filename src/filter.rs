use crate::record::{ResourceField, ResourceRecord};
use crate::table::ResourceTable;
use std::collections::HashSet;

/// Service / region / department restriction. An empty set means "no restriction";
/// non-empty sets are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceFilter {
    pub services: HashSet<String>,
    pub regions: HashSet<String>,
    pub departments: HashSet<String>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_regions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_departments<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.departments.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.regions.is_empty() && self.departments.is_empty()
    }

    pub fn matches(&self, record: &ResourceRecord) -> bool {
        member(&self.services, record.get(ResourceField::Service))
            && member(&self.regions, record.get(ResourceField::Region))
            && member(&self.departments, record.get(ResourceField::Department))
    }

    pub fn apply(&self, table: &ResourceTable) -> ResourceTable {
        if self.is_empty() {
            return table.clone();
        }
        table.filter(|r| self.matches(r))
    }
}

// An absent value is never a member of a non-empty set.
fn member(allowed: &HashSet<String>, value: Option<&str>) -> bool {
    allowed.is_empty() || value.map_or(false, |v| allowed.contains(v))
}

pub fn filter_by(
    table: &ResourceTable,
    services: &HashSet<String>,
    regions: &HashSet<String>,
    departments: &HashSet<String>,
) -> ResourceTable {
    ResourceFilter {
        services: services.clone(),
        regions: regions.clone(),
        departments: departments.clone(),
    }
    .apply(table)
}
