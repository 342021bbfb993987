//! Report Composer - renders the remediation summary as markdown.

use crate::aggregate::{cost_by_department, dataset_overview, percentage};
use crate::record::TaggedStatus;
use crate::remediation::RemediationResult;
use crate::table::ResourceTable;
use itertools::Itertools;

pub const REPORT_TITLE: &str = "# CloudMart Tagging Remediation Report";

pub const RECOMMENDATIONS: [&str; 4] = [
    "Enforce required tags at provisioning (Department, Project, Owner, CostCenter).",
    "Propagate tags via IaC (Terraform/CloudFormation) and use resource tagging policies.",
    "Alert on newly created untagged resources and block long-lived untagged Prod resources.",
    "Implement monthly remediation sweeps and chargeback using CostCenter.",
];

/// `1234567.891` -> `1,234,567.89`
pub fn format_usd(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let grouped = whole
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .join(",");
    let sign = if amount < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

pub struct ReportComposer {
    top_departments: usize,
}

impl ReportComposer {
    pub fn new(top_departments: usize) -> Self {
        Self { top_departments }
    }

    pub fn compose(&self, baseline: &ResourceTable, result: &RemediationResult) -> String {
        let overview = dataset_overview(baseline);
        let after = &result.remediated;
        let total_after = after.total_cost();
        let untagged_after = result.after_untagged_cost;

        let mut out = String::new();
        out.push_str(REPORT_TITLE);
        out.push_str("\n\n");
        out.push_str(&format!("- Total resources: {}\n", overview.total_resources));
        out.push_str(&format!(
            "- % untagged resources (before): {:.2}%\n",
            overview.untagged_pct
        ));
        out.push_str(&format!(
            "- Total untagged cost (before): ${}\n",
            format_usd(result.before_untagged_cost)
        ));
        out.push_str(&format!(
            "- Total cost (after remediation): ${}\n",
            format_usd(total_after)
        ));
        out.push_str(&format!(
            "- Total untagged cost (after remediation): ${}\n",
            format_usd(untagged_after)
        ));
        out.push_str(&format!(
            "- % of cost untagged (after): {:.2}%\n",
            percentage(untagged_after, total_after)
        ));

        out.push_str("\n## Departments with highest remaining untagged cost (after remediation)\n");
        out.push_str("| Department | UntaggedCost |\n");
        out.push_str("|:-----------|-------------:|\n");
        for bucket in cost_by_department(after, TaggedStatus::No)
            .into_iter()
            .filter_map(|b| b.key.map(|key| (key, b.cost)))
            .take(self.top_departments)
        {
            out.push_str(&format!("| {} | ${} |\n", bucket.0, format_usd(bucket.1)));
        }

        out.push_str("\n## Recommendations\n");
        for (idx, line) in RECOMMENDATIONS.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", idx + 1, line));
        }
        out
    }
}
