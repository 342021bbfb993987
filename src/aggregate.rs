//! Aggregation Operations - cost and compliance roll-ups over a `ResourceTable`.
//!
//! Every function here is pure. Grouped results keep absent keys as their own
//! group (`key: None`) and are ordered by descending cost, ties by key.

use crate::filter::ResourceFilter;
use crate::record::{ResourceField, ResourceRecord, TaggedStatus, TAG_FIELDS};
use crate::table::ResourceTable;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBucket {
    pub key: Option<String>,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCostBucket {
    pub key: Option<String>,
    pub status: TaggedStatus,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSplit {
    pub total_cost: f64,
    pub tagged_cost: f64,
    pub untagged_cost: f64,
}

impl CostSplit {
    pub fn cost_by_tagged_status(&self) -> [(TaggedStatus, f64); 2] {
        [
            (TaggedStatus::Yes, self.tagged_cost),
            (TaggedStatus::No, self.untagged_cost),
        ]
    }

    /// Share of total cost that is untagged; zero when there is no cost at all.
    pub fn untagged_cost_pct(&self) -> f64 {
        percentage(self.untagged_cost, self.total_cost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub total_resources: usize,
    pub tagged: usize,
    pub untagged: usize,
    pub untagged_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCount {
    pub field: ResourceField,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCount {
    pub column: String,
    pub missing: usize,
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

pub fn total_and_split_cost(table: &ResourceTable) -> CostSplit {
    let mut split = CostSplit {
        total_cost: 0.0,
        tagged_cost: 0.0,
        untagged_cost: 0.0,
    };
    for record in table {
        split.total_cost += record.cost;
        match record.tagged_resolved() {
            TaggedStatus::Yes => split.tagged_cost += record.cost,
            TaggedStatus::No => split.untagged_cost += record.cost,
        }
    }
    split
}

pub fn dataset_overview(table: &ResourceTable) -> DatasetOverview {
    let untagged = table.untagged_count();
    let total_resources = table.len();
    DatasetOverview {
        total_resources,
        tagged: total_resources - untagged,
        untagged,
        untagged_pct: percentage(untagged as f64, total_resources as f64),
    }
}

pub fn cost_by_department(table: &ResourceTable, status: TaggedStatus) -> Vec<CostBucket> {
    cost_by(
        table.iter().filter(|r| r.tagged_resolved() == status),
        ResourceField::Department,
    )
}

pub fn cost_by_project(table: &ResourceTable) -> Vec<CostBucket> {
    cost_by(table.iter(), ResourceField::Project)
}

pub fn cost_by_service(table: &ResourceTable) -> Vec<CostBucket> {
    cost_by(table.iter(), ResourceField::Service)
}

pub fn cost_by_environment(table: &ResourceTable) -> Vec<CostBucket> {
    cost_by(table.iter(), ResourceField::Environment)
}

fn cost_by<'a, I>(records: I, field: ResourceField) -> Vec<CostBucket>
where
    I: Iterator<Item = &'a ResourceRecord>,
{
    records
        .into_grouping_map_by(|r| r.get(field))
        .fold(0.0, |acc, _, r| acc + r.cost)
        .into_iter()
        .map(|(key, cost)| CostBucket {
            key: key.map(str::to_string),
            cost,
        })
        .sorted_by(|a, b| {
            b.cost
                .partial_cmp(&a.cost)
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare_keys(&a.key, &b.key))
        })
        .collect()
}

/// Present keys ascending, absent last.
fn compare_keys(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn cost_by_department_and_status(table: &ResourceTable) -> Vec<StatusCostBucket> {
    cost_by_status(table, ResourceField::Department)
}

pub fn cost_by_environment_and_status(table: &ResourceTable) -> Vec<StatusCostBucket> {
    cost_by_status(table, ResourceField::Environment)
}

/// Chart series: (key, status) -> cost, ordered by key then status. Absent keys sort first.
fn cost_by_status(table: &ResourceTable, field: ResourceField) -> Vec<StatusCostBucket> {
    table
        .iter()
        .into_grouping_map_by(|r| (r.get(field), r.tagged_resolved()))
        .fold(0.0, |acc, _, r| acc + r.cost)
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|((key, status), cost)| StatusCostBucket {
            key: key.map(str::to_string),
            status,
            cost,
        })
        .collect()
}

/// Absent count per designated tag field, most-missing first.
pub fn missing_tag_field_counts(table: &ResourceTable) -> Vec<FieldCount> {
    TAG_FIELDS
        .iter()
        .map(|field| FieldCount {
            field: *field,
            missing: table.iter().filter(|r| r.is_absent(*field)).count(),
        })
        .sorted_by(|a, b| b.missing.cmp(&a.missing))
        .collect()
}

/// Absent count for every column, schema columns first, most-missing first.
pub fn missing_values_per_column(table: &ResourceTable) -> Vec<ColumnCount> {
    let schema = ResourceField::ALL.iter().map(|field| ColumnCount {
        column: field.column_name().to_string(),
        missing: table.iter().filter(|r| r.is_absent(*field)).count(),
    });
    let extras = table.extra_columns().iter().map(|column| ColumnCount {
        column: column.clone(),
        missing: table.iter().filter(|r| !r.extra.contains_key(column)).count(),
    });
    schema
        .chain(extras)
        .sorted_by(|a, b| b.missing.cmp(&a.missing))
        .collect()
}

/// Number of resources per completeness score, ascending by score.
pub fn completeness_distribution(table: &ResourceTable) -> Vec<(u8, usize)> {
    table
        .iter()
        .map(|r| r.tag_completeness())
        .counts()
        .into_iter()
        .sorted()
        .collect()
}

/// The `n` least complete resources; equal scores keep table order.
pub fn lowest_completeness(table: &ResourceTable, n: usize) -> Vec<ResourceRecord> {
    let mut records: Vec<&ResourceRecord> = table.iter().collect();
    records.sort_by_key(|r| r.tag_completeness());
    records.into_iter().take(n).cloned().collect()
}

pub fn untagged_resources(table: &ResourceTable) -> ResourceTable {
    table.with_status(TaggedStatus::No)
}

/// Sorted distinct present values of a column, for filter option lists.
pub fn distinct_values(table: &ResourceTable, field: ResourceField) -> Vec<String> {
    table
        .iter()
        .filter_map(|r| r.get(field))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One row of the lowest-completeness listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessRow {
    pub resource_id: Option<String>,
    pub service: Option<String>,
    pub tag_completeness: u8,
    pub cost: f64,
    pub tagged_resolved: TaggedStatus,
}

impl From<&ResourceRecord> for CompletenessRow {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            resource_id: record.resource_id.clone(),
            service: record.service.clone(),
            tag_completeness: record.tag_completeness(),
            cost: record.cost,
            tagged_resolved: record.tagged_resolved(),
        }
    }
}

/// Valid values for the service / region / department filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub services: Vec<String>,
    pub regions: Vec<String>,
    pub departments: Vec<String>,
}

impl FilterOptions {
    pub fn from_table(table: &ResourceTable) -> Self {
        Self {
            services: distinct_values(table, ResourceField::Service),
            regions: distinct_values(table, ResourceField::Region),
            departments: distinct_values(table, ResourceField::Department),
        }
    }
}

/// Everything the dashboard shows for a baseline table.
///
/// Exploration and compliance sections use the whole table; the chart
/// section (`filtered_*`) uses the rows left after `filter`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub overview: DatasetOverview,
    pub missing_values: Vec<ColumnCount>,
    pub cost_split: CostSplit,
    pub untagged_cost_by_department: Vec<CostBucket>,
    pub cost_by_project: Vec<CostBucket>,
    pub cost_by_environment_and_status: Vec<StatusCostBucket>,
    pub completeness_distribution: Vec<(u8, usize)>,
    pub lowest_completeness: Vec<CompletenessRow>,
    pub missing_tag_fields: Vec<FieldCount>,
    pub filter_options: FilterOptions,
    pub filtered_resources: usize,
    pub filtered_cost_split: CostSplit,
    pub filtered_cost_by_department_and_status: Vec<StatusCostBucket>,
    pub filtered_cost_by_service: Vec<CostBucket>,
    pub filtered_cost_by_environment: Vec<CostBucket>,
}

pub fn summarize(
    table: &ResourceTable,
    filter: &ResourceFilter,
    top_n: usize,
    lowest_n: usize,
) -> DashboardSummary {
    let filtered = filter.apply(table);
    DashboardSummary {
        overview: dataset_overview(table),
        missing_values: missing_values_per_column(table),
        cost_split: total_and_split_cost(table),
        untagged_cost_by_department: cost_by_department(table, TaggedStatus::No)
            .into_iter()
            .take(top_n)
            .collect(),
        cost_by_project: cost_by_project(table).into_iter().take(top_n).collect(),
        cost_by_environment_and_status: cost_by_environment_and_status(table),
        completeness_distribution: completeness_distribution(table),
        lowest_completeness: lowest_completeness(table, lowest_n)
            .iter()
            .map(CompletenessRow::from)
            .collect(),
        missing_tag_fields: missing_tag_field_counts(table),
        filter_options: FilterOptions::from_table(table),
        filtered_resources: filtered.len(),
        filtered_cost_split: total_and_split_cost(&filtered),
        filtered_cost_by_department_and_status: cost_by_department_and_status(&filtered),
        filtered_cost_by_service: cost_by_service(&filtered),
        filtered_cost_by_environment: cost_by_environment(&filtered),
    }
}
