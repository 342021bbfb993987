//! Remediation Engine - applies hand-entered tag values to a baseline table and
//! reports what changed.
//!
//! Edits are keyed by resource id and applied to *every* record carrying that
//! id. The before/after comparison is a key-equality join, so duplicated ids
//! produce one comparison row per (after, before) pair.

use crate::error::{GovernanceError, Result};
use crate::record::{is_derived_column, normalize_cell, ResourceField, TaggedStatus};
use crate::table::ResourceTable;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// resource id -> (field -> new value). `None` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemediationEdits(BTreeMap<String, BTreeMap<String, Option<EditValue>>>);

/// JSON edit files may carry numbers or booleans as well as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl EditValue {
    fn normalized(&self) -> Option<String> {
        match self {
            EditValue::Text(s) => normalize_cell(s),
            EditValue::Number(n) => Some(n.to_string()),
            EditValue::Flag(b) => Some(b.to_string()),
        }
    }
}

impl RemediationEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        resource_id: impl Into<String>,
        field: impl Into<String>,
        value: Option<&str>,
    ) -> &mut Self {
        self.0
            .entry(resource_id.into())
            .or_default()
            .insert(field.into(), value.map(|v| EditValue::Text(v.to_string())));
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GovernanceError::Edit(format!("invalid edit document: {}", e)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// How an edit's field name is applied.
#[derive(Debug, Clone, PartialEq)]
enum EditTarget {
    Column(ResourceField),
    Extra(String),
    Ignored,
}

impl EditTarget {
    fn classify(name: &str) -> Self {
        match ResourceField::parse(name) {
            // the join key itself is not editable
            Some(ResourceField::ResourceId) => EditTarget::Ignored,
            Some(field) => EditTarget::Column(field),
            None if is_derived_column(name) => EditTarget::Ignored,
            None => EditTarget::Extra(name.trim().to_string()),
        }
    }
}

/// A record whose resolved status differs between baseline and remediated table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedResource {
    pub resource_id: Option<String>,
    pub before: TaggedStatus,
    pub after: TaggedStatus,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationResult {
    pub remediated: ResourceTable,
    pub before_untagged_cost: f64,
    pub after_untagged_cost: f64,
    pub before_untagged_count: usize,
    pub after_untagged_count: usize,
    pub changed: Vec<ChangedResource>,
    /// Edit keys that matched no record.
    pub unmatched_resource_ids: Vec<String>,
    /// Edit fields that were dropped (the key column or a derived column).
    pub ignored_fields: Vec<String>,
    /// Field names outside the schema, stored as new extra columns.
    pub added_columns: Vec<String>,
}

impl RemediationResult {
    pub fn untagged_cost_delta(&self) -> f64 {
        self.after_untagged_cost - self.before_untagged_cost
    }

    pub fn untagged_count_delta(&self) -> i64 {
        self.after_untagged_count as i64 - self.before_untagged_count as i64
    }
}

/// Apply `edits` to a copy of `baseline` and compare the two. `baseline` is not modified.
pub fn apply_remediation(baseline: &ResourceTable, edits: &RemediationEdits) -> RemediationResult {
    let mut remediated = baseline.clone();
    let mut unmatched_resource_ids = Vec::new();
    let mut ignored_fields: Vec<String> = Vec::new();
    let mut added_columns = Vec::new();

    for (resource_id, changes) in &edits.0 {
        let targets: Vec<(EditTarget, Option<String>)> = changes
            .iter()
            .map(|(field, value)| {
                let target = EditTarget::classify(field);
                if target == EditTarget::Ignored && !ignored_fields.contains(field) {
                    warn!("Ignoring edit to non-editable field '{}'", field);
                    ignored_fields.push(field.clone());
                }
                (target, value.as_ref().and_then(EditValue::normalized))
            })
            .collect();

        // unknown fields become columns even when no record matches
        for (target, _) in &targets {
            if let EditTarget::Extra(name) = target {
                if remediated.register_extra_column(name) {
                    debug!("Edit introduced new column '{}'", name);
                    added_columns.push(name.clone());
                }
            }
        }

        let mut matched = 0usize;
        for record in remediated.records_mut() {
            if record.resource_id.as_deref() != Some(resource_id.as_str()) {
                continue;
            }
            matched += 1;
            for (target, value) in &targets {
                match target {
                    EditTarget::Column(field) => record.set(*field, value.clone()),
                    EditTarget::Extra(name) => match value {
                        Some(v) => {
                            record.extra.insert(name.clone(), v.clone());
                        }
                        None => {
                            record.extra.remove(name);
                        }
                    },
                    EditTarget::Ignored => {}
                }
            }
        }

        if matched == 0 {
            warn!("Edit for unknown resource '{}' matched no records", resource_id);
            unmatched_resource_ids.push(resource_id.clone());
        } else if matched > 1 {
            debug!("Edit for '{}' applied to {} records sharing the id", resource_id, matched);
        }
    }

    for record in remediated.records_mut() {
        record.resolve_after_edit();
    }

    let changed = changed_resources(baseline, &remediated);
    let result = RemediationResult {
        before_untagged_cost: baseline.untagged_cost(),
        after_untagged_cost: remediated.untagged_cost(),
        before_untagged_count: baseline.untagged_count(),
        after_untagged_count: remediated.untagged_count(),
        remediated,
        changed,
        unmatched_resource_ids,
        ignored_fields,
        added_columns,
    };

    info!(
        "Remediation applied: {} edits, untagged cost {:.2} -> {:.2}, untagged resources {} -> {}, {} status changes",
        edits.len(),
        result.before_untagged_cost,
        result.after_untagged_cost,
        result.before_untagged_count,
        result.after_untagged_count,
        result.changed.len()
    );
    result
}

/// Left join of `after` onto `before` by resource id, keeping rows whose status differs.
fn changed_resources(before: &ResourceTable, after: &ResourceTable) -> Vec<ChangedResource> {
    let before_by_id = before.iter().into_group_map_by(|r| r.resource_id.as_deref());

    after
        .iter()
        .flat_map(|record| {
            before_by_id
                .get(&record.resource_id.as_deref())
                .into_iter()
                .flatten()
                .filter(move |prior| prior.tagged_resolved() != record.tagged_resolved())
                .map(move |prior| ChangedResource {
                    resource_id: record.resource_id.clone(),
                    before: prior.tagged_resolved(),
                    after: record.tagged_resolved(),
                    cost: record.cost,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResourceRecord;

    fn scenario() -> ResourceTable {
        ResourceTable::from_records(vec![
            ResourceRecord::new("A")
                .with(ResourceField::Tagged, "No")
                .with_cost(100.0),
            ResourceRecord::new("B")
                .with(ResourceField::Department, "Eng")
                .with(ResourceField::Owner, "Alice")
                .with(ResourceField::Tagged, "Yes")
                .with_cost(50.0),
        ])
    }

    #[test]
    fn test_scenario_remediation() {
        let baseline = scenario();
        let mut edits = RemediationEdits::new();
        edits
            .set("A", "department", Some("Eng"))
            .set("A", "owner", Some("Bob"));

        let result = apply_remediation(&baseline, &edits);
        let a = &result.remediated.records()[0];
        assert_eq!(a.tagged_resolved(), TaggedStatus::Yes);
        assert_eq!(a.tag_completeness(), 2);
        assert_eq!(result.before_untagged_cost, 100.0);
        assert_eq!(result.after_untagged_cost, 0.0);
        assert_eq!(result.before_untagged_count, 1);
        assert_eq!(result.after_untagged_count, 0);
        assert_eq!(result.untagged_cost_delta(), -100.0);
        assert_eq!(result.untagged_count_delta(), -1);
        assert_eq!(
            result.changed,
            vec![ChangedResource {
                resource_id: Some("A".to_string()),
                before: TaggedStatus::No,
                after: TaggedStatus::Yes,
                cost: 100.0,
            }]
        );
    }

    #[test]
    fn test_baseline_is_not_mutated() {
        let baseline = scenario();
        let snapshot = baseline.clone();
        let mut edits = RemediationEdits::new();
        edits.set("A", "Department", Some("Eng"));
        let result = apply_remediation(&baseline, &edits);
        assert_eq!(baseline, snapshot);
        assert_ne!(result.remediated, baseline);
    }

    #[test]
    fn test_broadcast_edit_to_duplicate_ids() {
        let baseline = ResourceTable::from_records(vec![
            ResourceRecord::new("R1").with_cost(10.0),
            ResourceRecord::new("R1").with_cost(20.0),
            ResourceRecord::new("R2").with_cost(5.0),
        ]);
        let mut edits = RemediationEdits::new();
        edits.set("R1", "department", Some("Finance"));

        let result = apply_remediation(&baseline, &edits);
        let depts: Vec<_> = result
            .remediated
            .iter()
            .map(|r| r.department.as_deref())
            .collect();
        assert_eq!(depts, vec![Some("Finance"), Some("Finance"), None]);
    }

    #[test]
    fn test_duplicate_ids_join_many_to_many() {
        let baseline = ResourceTable::from_records(vec![
            ResourceRecord::new("R1").with_cost(10.0),
            ResourceRecord::new("R1").with_cost(20.0),
        ]);
        let mut edits = RemediationEdits::new();
        edits
            .set("R1", "Department", Some("Finance"))
            .set("R1", "Owner", Some("Dana"));

        let result = apply_remediation(&baseline, &edits);
        // two after-rows, each joined with two before-rows
        assert_eq!(result.changed.len(), 4);
        let costs: Vec<_> = result.changed.iter().map(|c| c.cost).collect();
        assert_eq!(costs, vec![10.0, 10.0, 20.0, 20.0]);
    }

    #[test]
    fn test_partial_edit_keeps_prior_status() {
        let baseline = ResourceTable::from_records(vec![
            ResourceRecord::new("Y")
                .with(ResourceField::Tagged, "Yes")
                .with(ResourceField::Department, "Eng")
                .with(ResourceField::Owner, "Alice"),
            ResourceRecord::new("N").with(ResourceField::Tagged, "No"),
        ]);
        let mut edits = RemediationEdits::new();
        // clearing the owner does not flip a Yes back to No
        edits.set("Y", "Owner", None);
        // department alone is not enough
        edits.set("N", "Department", Some("Ops"));

        let result = apply_remediation(&baseline, &edits);
        assert_eq!(result.remediated.records()[0].owner, None);
        assert_eq!(result.remediated.records()[0].tagged_resolved(), TaggedStatus::Yes);
        assert_eq!(result.remediated.records()[1].tagged_resolved(), TaggedStatus::No);
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_unknown_ids_and_fields_are_absorbed() {
        let baseline = scenario();
        let mut edits = RemediationEdits::new();
        edits
            .set("missing", "Department", Some("Eng"))
            .set("A", "Ticket", Some("OPS-12"))
            .set("A", "TagCompleteness", Some("6"))
            .set("A", "ResourceID", Some("Z"));

        let result = apply_remediation(&baseline, &edits);
        assert_eq!(result.unmatched_resource_ids, vec!["missing".to_string()]);
        assert_eq!(result.added_columns, vec!["Ticket".to_string()]);
        assert_eq!(result.remediated.extra_columns(), &["Ticket".to_string()]);
        let a = &result.remediated.records()[0];
        assert_eq!(a.extra.get("Ticket").map(String::as_str), Some("OPS-12"));
        assert_eq!(a.resource_id.as_deref(), Some("A"));
        assert_eq!(a.tag_completeness(), 0);
        assert_eq!(result.ignored_fields.len(), 2);
        assert_eq!(result.after_untagged_cost, 100.0);
    }

    #[test]
    fn test_edit_values_are_normalized() {
        let baseline = scenario();
        let edits = RemediationEdits::from_json_str(
            r#"{"B": {"owner": "  ", "cost": 75.5}, "A": {"department": "None", "project": "Atlas"}}"#,
        )
        .unwrap();

        let result = apply_remediation(&baseline, &edits);
        let a = &result.remediated.records()[0];
        let b = &result.remediated.records()[1];
        assert_eq!(a.department, None);
        assert_eq!(a.project.as_deref(), Some("Atlas"));
        assert_eq!(b.owner, None);
        assert_eq!(b.cost, 75.5);
    }

    #[test]
    fn test_invalid_edit_document() {
        let err = RemediationEdits::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, GovernanceError::Edit(_)));
    }
}
