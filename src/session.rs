use crate::aggregate::{summarize, DashboardSummary};
use crate::error::Result;
use crate::export::ArtifactWriter;
use crate::filter::ResourceFilter;
use crate::loader::DatasetLoader;
use crate::remediation::{apply_remediation, RemediationEdits, RemediationResult};
use crate::report::ReportComposer;
use crate::table::ResourceTable;
use std::path::{Path, PathBuf};

/// One user's working state: the loaded baseline and, once applied, the latest remediation.
///
/// The baseline never changes for the lifetime of the session. Applying a new
/// set of edits replaces the previous remediation; edits are always applied to
/// the baseline, never stacked on an earlier remediation.
pub struct GovernanceSession {
    baseline: ResourceTable,
    remediation: Option<RemediationResult>,
}

impl GovernanceSession {
    pub fn new(baseline: ResourceTable) -> Self {
        Self {
            baseline,
            remediation: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let baseline = DatasetLoader.load_path(path)?;
        Ok(Self::new(baseline))
    }

    pub fn baseline(&self) -> &ResourceTable {
        &self.baseline
    }

    pub fn remediation(&self) -> Option<&RemediationResult> {
        self.remediation.as_ref()
    }

    pub fn summary(&self, filter: &ResourceFilter, top_n: usize, lowest_n: usize) -> DashboardSummary {
        summarize(&self.baseline, filter, top_n, lowest_n)
    }

    pub fn apply(&mut self, edits: &RemediationEdits) -> &RemediationResult {
        self.remediation
            .insert(apply_remediation(&self.baseline, edits))
    }

    /// Markdown report; `None` until a remediation has been applied.
    pub fn report(&self, top_departments: usize) -> Option<String> {
        self.remediation
            .as_ref()
            .map(|result| ReportComposer::new(top_departments).compose(&self.baseline, result))
    }

    /// `original.csv` and `untagged_resources.csv`, always available.
    pub fn export_baseline(&self, writer: &ArtifactWriter) -> Result<Vec<PathBuf>> {
        Ok(vec![
            writer.write_original(&self.baseline)?,
            writer.write_untagged_resources(&self.baseline)?,
        ])
    }

    /// `remediated.csv` and `short_report.md`; empty until a remediation has been applied.
    pub fn export_remediation(
        &self,
        writer: &ArtifactWriter,
        top_departments: usize,
    ) -> Result<Vec<PathBuf>> {
        let (Some(result), Some(report)) = (self.remediation.as_ref(), self.report(top_departments)) else {
            return Ok(Vec::new());
        };
        Ok(vec![
            writer.write_remediated(&result.remediated)?,
            writer.write_report(&report)?,
        ])
    }
}
