use crate::record::{ResourceRecord, TaggedStatus};
use serde::Serialize;

/// An ordered set of resource records plus the extra (non-schema) columns they carry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResourceTable {
    records: Vec<ResourceRecord>,
    extra_columns: Vec<String>,
}

impl ResourceTable {
    /// Build a baseline table. Each record's resolved status is taken from its `tagged` flag.
    pub fn from_records(records: Vec<ResourceRecord>) -> Self {
        let mut extra_columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.extra.keys() {
                if !extra_columns.contains(key) {
                    extra_columns.push(key.clone());
                }
            }
        }
        Self::with_columns(records, extra_columns)
    }

    pub(crate) fn with_columns(mut records: Vec<ResourceRecord>, extra_columns: Vec<String>) -> Self {
        for record in &mut records {
            record.resolve_from_flag();
        }
        Self {
            records,
            extra_columns,
        }
    }

    /// Same columns, different rows. Resolved statuses are carried over untouched.
    pub(crate) fn derive(&self, records: Vec<ResourceRecord>) -> Self {
        Self {
            records,
            extra_columns: self.extra_columns.clone(),
        }
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [ResourceRecord] {
        &mut self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Extra column headers in first-seen order.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub(crate) fn register_extra_column(&mut self, name: &str) -> bool {
        if self.extra_columns.iter().any(|c| c == name) {
            return false;
        }
        self.extra_columns.push(name.to_string());
        true
    }

    /// Rows matching the predicate, order preserved.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&ResourceRecord) -> bool,
    {
        self.derive(self.records.iter().filter(|r| predicate(r)).cloned().collect())
    }

    pub fn with_status(&self, status: TaggedStatus) -> Self {
        self.filter(|r| r.tagged_resolved() == status)
    }

    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    pub fn untagged_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_untagged()).count()
    }

    pub fn untagged_cost(&self) -> f64 {
        self.records
            .iter()
            .filter(|r| r.is_untagged())
            .map(|r| r.cost)
            .sum()
    }
}

impl<'a> IntoIterator for &'a ResourceTable {
    type Item = &'a ResourceRecord;
    type IntoIter = std::slice::Iter<'a, ResourceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResourceField;

    fn record(id: &str, tagged: Option<&str>, cost: f64) -> ResourceRecord {
        let record = ResourceRecord::new(id).with_cost(cost);
        match tagged {
            Some(flag) => record.with(ResourceField::Tagged, flag),
            None => record,
        }
    }

    #[test]
    fn test_from_records_resolves_status() {
        let table = ResourceTable::from_records(vec![
            record("A", Some("Yes"), 1.0),
            record("B", None, 2.0),
            record("C", Some("No"), 3.0),
        ]);
        let statuses: Vec<_> = table.iter().map(|r| r.tagged_resolved()).collect();
        assert_eq!(statuses, vec![TaggedStatus::Yes, TaggedStatus::No, TaggedStatus::No]);
        // raw flag is never rewritten
        assert_eq!(table.records()[1].tagged, None);
        assert_eq!(table.untagged_count(), 2);
        assert_eq!(table.untagged_cost(), 5.0);
    }

    #[test]
    fn test_extra_columns_collected_in_first_seen_order() {
        let a = record("A", None, 0.0).with_extra("Team", "x");
        let b = record("B", None, 0.0)
            .with_extra("Application", "y")
            .with_extra("Team", "z");

        let table = ResourceTable::from_records(vec![a, b]);
        assert_eq!(table.extra_columns(), &["Team".to_string(), "Application".to_string()]);
    }

    #[test]
    fn test_filter_keeps_order_and_columns() {
        let a = record("A", Some("No"), 1.0).with_extra("Team", "x");
        let table = ResourceTable::from_records(vec![a, record("B", Some("Yes"), 2.0), record("C", None, 3.0)]);

        let untagged = table.with_status(TaggedStatus::No);
        let ids: Vec<_> = untagged.iter().map(|r| r.resource_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(untagged.extra_columns(), table.extra_columns());
    }
}
