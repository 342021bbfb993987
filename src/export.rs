//! CSV artifacts: the untouched baseline, the untagged subset, and the remediated table.

use crate::aggregate::untagged_resources;
use crate::error::Result;
use crate::record::{ResourceField, ResourceRecord};
use crate::table::ResourceTable;
use csv::Writer;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ORIGINAL_FILE: &str = "original.csv";
pub const UNTAGGED_RESOURCES_FILE: &str = "untagged_resources.csv";
pub const REMEDIATED_FILE: &str = "remediated.csv";
pub const REPORT_FILE: &str = "short_report.md";

pub const TAGGED_RESOLVED_COLUMN: &str = "TaggedResolved";
pub const TAG_COMPLETENESS_COLUMN: &str = "TagCompleteness";

/// Columns of `untagged_resources.csv`, in order.
pub const UNTAGGED_COLUMNS: [ResourceField; 9] = [
    ResourceField::AccountId,
    ResourceField::ResourceId,
    ResourceField::Service,
    ResourceField::Region,
    ResourceField::Department,
    ResourceField::Project,
    ResourceField::Environment,
    ResourceField::Owner,
    ResourceField::Cost,
];

fn cell(record: &ResourceRecord, field: ResourceField) -> String {
    match field {
        ResourceField::Cost => record.cost.to_string(),
        _ => record.get(field).unwrap_or_default().to_string(),
    }
}

/// Baseline rows with a resolved status of "No", fixed column subset.
pub fn write_untagged_resources<W: Write>(table: &ResourceTable, writer: W) -> Result<usize> {
    let untagged = untagged_resources(table);
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(UNTAGGED_COLUMNS.iter().map(|f| f.column_name()))?;
    for record in &untagged {
        wtr.write_record(UNTAGGED_COLUMNS.iter().map(|f| cell(record, *f)))?;
    }
    wtr.flush()?;
    Ok(untagged.len())
}

/// Every schema column followed by every extra column.
pub fn write_original<W: Write>(table: &ResourceTable, writer: W) -> Result<usize> {
    write_full(table, writer, false)
}

/// Like `write_original`, plus the resolved status and completeness score.
pub fn write_remediated<W: Write>(table: &ResourceTable, writer: W) -> Result<usize> {
    write_full(table, writer, true)
}

fn write_full<W: Write>(table: &ResourceTable, writer: W, derived: bool) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);

    let mut header: Vec<&str> = ResourceField::ALL.iter().map(|f| f.column_name()).collect();
    header.extend(table.extra_columns().iter().map(String::as_str));
    if derived {
        header.push(TAGGED_RESOLVED_COLUMN);
        header.push(TAG_COMPLETENESS_COLUMN);
    }
    wtr.write_record(&header)?;

    for record in table {
        let mut row: Vec<String> = ResourceField::ALL.iter().map(|f| cell(record, *f)).collect();
        row.extend(
            table
                .extra_columns()
                .iter()
                .map(|c| record.extra.get(c).cloned().unwrap_or_default()),
        );
        if derived {
            row.push(record.tagged_resolved().to_string());
            row.push(record.tag_completeness().to_string());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(table.len())
}

/// Writes artifacts into one output directory.
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write_original(&self, table: &ResourceTable) -> Result<PathBuf> {
        self.write_csv(ORIGINAL_FILE, |file| write_original(table, file))
    }

    pub fn write_untagged_resources(&self, table: &ResourceTable) -> Result<PathBuf> {
        self.write_csv(UNTAGGED_RESOURCES_FILE, |file| write_untagged_resources(table, file))
    }

    pub fn write_remediated(&self, table: &ResourceTable) -> Result<PathBuf> {
        self.write_csv(REMEDIATED_FILE, |file| write_remediated(table, file))
    }

    pub fn write_report(&self, report: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(REPORT_FILE);
        std::fs::write(&path, report)?;
        info!("Wrote report to {}", path.display());
        Ok(path)
    }

    fn write_csv<F>(&self, name: &str, write: F) -> Result<PathBuf>
    where
        F: FnOnce(std::fs::File) -> Result<usize>,
    {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(name);
        let rows = write(std::fs::File::create(&path)?)?;
        info!("Wrote {} rows to {}", rows, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DatasetLoader;

    fn to_string<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<usize>,
    {
        let mut buf = Vec::new();
        write(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn table() -> ResourceTable {
        DatasetLoader
            .load_str(
                "AccountID,ResourceID,Service,Department,Owner,Tagged,Cost,Team\n\
                 1,a,EC2,Eng,amy,Yes,10,core\n\
                 1,b,S3,,,No,2.5,\n",
            )
            .unwrap()
    }

    #[test]
    fn test_untagged_export_uses_fixed_columns() {
        let out = to_string(|buf| write_untagged_resources(&table(), buf));
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[0],
            "AccountID,ResourceID,Service,Region,Department,Project,Environment,Owner,Cost"
        );
        assert_eq!(lines[1], "1,b,S3,,,,,,2.5");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_original_export_keeps_extra_columns() {
        let out = to_string(|buf| write_original(&table(), buf));
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].ends_with("Tagged,Cost,Team"));
        assert_eq!(lines[1], "1,a,EC2,,,Eng,,amy,,,Yes,10,core");
    }

    #[test]
    fn test_remediated_export_appends_derived_columns() {
        let out = to_string(|buf| write_remediated(&table(), buf));
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].ends_with("Team,TaggedResolved,TagCompleteness"));
        assert!(lines[2].ends_with(",No,0"));
    }

    #[test]
    fn test_reloaded_remediated_export_has_single_derived_columns() {
        let first = to_string(|buf| write_remediated(&table(), buf));
        let reloaded = DatasetLoader.load_str(&first).unwrap();
        let second = to_string(|buf| write_remediated(&reloaded, buf));

        let header = second.lines().next().unwrap();
        assert_eq!(header.matches(TAGGED_RESOLVED_COLUMN).count(), 1);
        assert_eq!(header.matches(TAG_COMPLETENESS_COLUMN).count(), 1);
        assert!(header.ends_with("Cost,Team,TaggedResolved,TagCompleteness"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_exported_original_reloads_identically() {
        let original = table();
        let out = to_string(|buf| write_original(&original, buf));
        let reloaded = DatasetLoader.load_str(&out).unwrap();
        assert_eq!(reloaded, original);
    }
}
