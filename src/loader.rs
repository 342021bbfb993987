//! Dataset Loader - reads a billing export into a normalized `ResourceTable`.
//!
//! The exports this tool is fed are not always well-formed CSV: whole rows are
//! sometimes wrapped in double quotes. All `"` characters are stripped before
//! parsing, so quoted fields containing commas are not supported.

use crate::error::LoadError;
use crate::record::{coerce_cost, is_derived_column, normalize_cell, ResourceField, ResourceRecord};
use crate::table::ResourceTable;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Preferred raw cost column.
pub const MONTHLY_COST_COLUMN: &str = "MonthlyCostUSD";
/// Fallback raw cost column.
pub const COST_COLUMN: &str = "Cost";

pub struct DatasetLoader;

impl DatasetLoader {
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<ResourceTable, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loading dataset from {}", path.display());
        self.load_bytes(&bytes)
    }

    pub fn load_bytes(&self, bytes: &[u8]) -> Result<ResourceTable, LoadError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LoadError::Malformed(format!("input is not valid UTF-8: {}", e)))?;
        self.load_str(text)
    }

    pub fn load_str(&self, text: &str) -> Result<ResourceTable, LoadError> {
        let cleaned = text.replace('"', "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(cleaned.as_bytes());

        let headers = dedupe_headers(
            rdr.headers()
                .map_err(|e| LoadError::Malformed(format!("failed to read CSV headers: {}", e)))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
        );
        let layout = ColumnLayout::resolve(&headers)?;

        let mut records = Vec::new();
        for (row_idx, result) in rdr.records().enumerate() {
            let row = result
                .map_err(|e| LoadError::Malformed(format!("failed to read row {}: {}", row_idx + 1, e)))?;
            // short rows pad to absent; long rows would shift every later column
            if row.len() > headers.len() {
                return Err(LoadError::Malformed(format!(
                    "row {} has {} fields, header has {}",
                    row_idx + 1,
                    row.len(),
                    headers.len()
                )));
            }
            records.push(layout.build_record(&row));
        }

        info!(
            "Loaded {} resources (cost column: {}, synthesized columns: {})",
            records.len(),
            layout.cost_source,
            layout.synthesized.len()
        );
        if !layout.synthesized.is_empty() {
            debug!("Synthesized empty columns: {:?}", layout.synthesized);
        }

        Ok(ResourceTable::with_columns(records, layout.extra_names()))
    }
}

/// Repeated header names get a `.N` suffix so no column shadows another.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name.clone()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Where each schema column lives in the input, and which inputs are extras.
struct ColumnLayout {
    fields: Vec<(ResourceField, usize)>,
    cost_index: usize,
    cost_source: &'static str,
    extras: Vec<(String, usize)>,
    synthesized: Vec<ResourceField>,
}

impl ColumnLayout {
    fn resolve(headers: &[String]) -> Result<Self, LoadError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let (cost_index, cost_source) = match (position(MONTHLY_COST_COLUMN), position(COST_COLUMN)) {
            (Some(idx), _) => (idx, MONTHLY_COST_COLUMN),
            (None, Some(idx)) => (idx, COST_COLUMN),
            (None, None) => {
                return Err(LoadError::MissingCostColumn {
                    columns: headers.to_vec(),
                })
            }
        };

        let mut fields = Vec::new();
        let mut synthesized = Vec::new();
        for field in ResourceField::ALL {
            if field == ResourceField::Cost {
                continue;
            }
            match position(field.column_name()) {
                Some(idx) => fields.push((field, idx)),
                None => synthesized.push(field),
            }
        }

        let extras = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| ResourceField::ALL.iter().all(|f| f.column_name() != h.as_str()))
            // recomputed on every export
            .filter(|(_, h)| !is_derived_column(h))
            .map(|(idx, h)| (h.clone(), idx))
            .collect();

        Ok(Self {
            fields,
            cost_index,
            cost_source,
            extras,
            synthesized,
        })
    }

    fn build_record(&self, row: &csv::StringRecord) -> ResourceRecord {
        let mut record = ResourceRecord::default();
        for (field, idx) in &self.fields {
            record.set(*field, row.get(*idx).and_then(normalize_cell));
        }
        record.cost = coerce_cost(row.get(self.cost_index));
        for (name, idx) in &self.extras {
            if let Some(value) = row.get(*idx).and_then(normalize_cell) {
                record.extra.insert(name.clone(), value);
            }
        }
        record
    }

    fn extra_names(&self) -> Vec<String> {
        self.extras.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TaggedStatus;

    const SAMPLE: &str = "\
AccountID,ResourceID,Service,Region,Department,Project,Environment,Owner,CostCenter,CreatedBy,Tagged,MonthlyCostUSD
\"111,r-1,EC2,us-east-1,Finance,Atlas,Prod,alice,CC1,terraform,Yes,120.5\"
\"111,r-2,S3,us-east-1,,,Dev,None,,,No,30\"
222,r-3,RDS,eu-west-1,nan,Orion,Prod,bob,CC2,console,,abc
";

    #[test]
    fn test_load_strips_quotes_and_normalizes() {
        let table = DatasetLoader.load_str(SAMPLE).unwrap();
        assert_eq!(table.len(), 3);

        let r1 = &table.records()[0];
        assert_eq!(r1.account_id, "111");
        assert_eq!(r1.resource_id.as_deref(), Some("r-1"));
        assert_eq!(r1.cost, 120.5);
        assert_eq!(r1.tag_completeness(), 6);
        assert_eq!(r1.tagged_resolved(), TaggedStatus::Yes);

        let r2 = &table.records()[1];
        assert_eq!(r2.department, None);
        assert_eq!(r2.owner, None);
        assert_eq!(r2.environment.as_deref(), Some("Dev"));
        assert_eq!(r2.tag_completeness(), 1);

        let r3 = &table.records()[2];
        assert_eq!(r3.department, None);
        assert_eq!(r3.cost, 0.0);
        assert_eq!(r3.tagged, None);
        assert_eq!(r3.tagged_resolved(), TaggedStatus::No);
    }

    #[test]
    fn test_raw_cost_column_is_kept_as_extra() {
        let table = DatasetLoader.load_str(SAMPLE).unwrap();
        assert_eq!(table.extra_columns(), &[MONTHLY_COST_COLUMN.to_string()]);
        assert_eq!(
            table.records()[2].extra.get(MONTHLY_COST_COLUMN).map(String::as_str),
            Some("abc")
        );
    }

    #[test]
    fn test_monthly_cost_preferred_over_cost() {
        let csv = "ResourceID,Cost,MonthlyCostUSD\nr-1,1,2\n";
        let table = DatasetLoader.load_str(csv).unwrap();
        assert_eq!(table.records()[0].cost, 2.0);
    }

    #[test]
    fn test_fallback_cost_column_and_synthesized_columns() {
        let csv = " ResourceID , Cost \nr-1, 9.25\nr-2,\n";
        let table = DatasetLoader.load_str(csv).unwrap();
        assert_eq!(table.records()[0].cost, 9.25);
        assert_eq!(table.records()[1].cost, 0.0);
        assert_eq!(table.records()[0].service, None);
        assert_eq!(table.records()[0].account_id, "");
        assert!(table.extra_columns().is_empty());
    }

    #[test]
    fn test_missing_cost_column_is_fatal() {
        let err = DatasetLoader.load_str("ResourceID,Service\nr-1,EC2\n").unwrap_err();
        assert!(matches!(err, LoadError::MissingCostColumn { .. }));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(matches!(DatasetLoader.load_str(" \"\" \n").unwrap_err(), LoadError::Empty));
    }

    #[test]
    fn test_load_is_idempotent() {
        let first = DatasetLoader.load_bytes(SAMPLE.as_bytes()).unwrap();
        let second = DatasetLoader.load_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_row_wider_than_header_is_fatal() {
        let csv = "\
AccountID,ResourceID,Service,Region,Department,Project,Environment,Owner,CostCenter,CreatedBy,Tagged,Cost
1,r-1,\"EC2, large\",us-east-1,Eng,Atlas,Prod,amy,CC1,tf,Yes,500
";
        let err = DatasetLoader.load_str(csv).unwrap_err();
        match err {
            LoadError::Malformed(msg) => assert_eq!(msg, "row 1 has 13 fields, header has 12"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_short_rows_pad_to_absent() {
        let table = DatasetLoader.load_str("ResourceID,Service,Cost\nr-1\n").unwrap();
        assert_eq!(table.records()[0].service, None);
        assert_eq!(table.records()[0].cost, 0.0);
    }

    #[test]
    fn test_derived_columns_are_not_loaded_as_extras() {
        let csv = "ResourceID,Tagged,Cost,Team,TaggedResolved,TagCompleteness,Tagged_filled\n\
                   r-1,No,5,core,Yes,6,No\n";
        let table = DatasetLoader.load_str(csv).unwrap();
        assert_eq!(table.extra_columns(), &["Team".to_string()]);
        let record = &table.records()[0];
        assert_eq!(record.tagged_resolved(), TaggedStatus::No);
        assert_eq!(record.tag_completeness(), 0);
        assert!(!record.extra.contains_key("TaggedResolved"));
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        assert_eq!(
            dedupe_headers(vec!["A".into(), "B".into(), "A".into()]),
            vec!["A".to_string(), "B".to_string(), "A.1".to_string()]
        );
    }
}
