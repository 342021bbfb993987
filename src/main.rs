use tagging_governance::aggregate::{CostBucket, DashboardSummary, StatusCostBucket};
use tagging_governance::config::GovernanceConfig;
use tagging_governance::export::ArtifactWriter;
use tagging_governance::filter::ResourceFilter;
use tagging_governance::remediation::{RemediationEdits, RemediationResult};
use tagging_governance::report::format_usd;
use tagging_governance::session::GovernanceSession;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagging-governance")]
#[command(about = "Resource tagging compliance and untagged cost audit for multi-account billing exports")]
#[command(version)]
struct Args {
    /// Billing export to load (or set TAGGING_DATA_PATH)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// Directory for generated artifacts (or set TAGGING_OUTPUT_DIR)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exploration, cost visibility and compliance metrics for the dataset
    Summary {
        /// Restrict chart aggregates to these services (repeatable)
        #[arg(long)]
        service: Vec<String>,

        /// Restrict chart aggregates to these regions (repeatable)
        #[arg(long)]
        region: Vec<String>,

        /// Restrict chart aggregates to these departments (repeatable)
        #[arg(long)]
        department: Vec<String>,

        /// Number of lowest-completeness resources to list
        #[arg(long)]
        lowest: Option<usize>,

        /// Print machine-readable JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Write original.csv and untagged_resources.csv
    Export,
    /// Apply tag edits from a JSON file and write remediated.csv and short_report.md
    Remediate {
        /// JSON object: {"<resource id>": {"<field>": "<value>" | null}}
        #[arg(short, long)]
        edits: PathBuf,

        /// Departments listed in the report
        #[arg(long)]
        top_departments: Option<usize>,

        /// Print machine-readable JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let mut config = GovernanceConfig::from_env().context("Invalid configuration")?;
    let args = Args::parse();
    if let Some(data) = args.data.clone() {
        config.data_path = data;
    }
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let session = GovernanceSession::load(&config.data_path)
        .with_context(|| format!("Could not load dataset {}", config.data_path.display()))?;
    info!("Dataset loaded: {} resources", session.baseline().len());

    match args.command {
        Commands::Summary {
            service,
            region,
            department,
            lowest,
            json,
        } => {
            if let Some(n) = lowest {
                config.lowest_completeness_n = n;
            }
            let filter = ResourceFilter::new()
                .with_services(service)
                .with_regions(region)
                .with_departments(department);
            run_summary(&session, &filter, &config, json)
        }
        Commands::Export => run_export(&session, &config),
        Commands::Remediate {
            edits,
            top_departments,
            json,
        } => {
            if let Some(n) = top_departments {
                config.top_departments = n;
            }
            run_remediate(session, &edits, &config, json)
        }
    }
}

fn run_summary(
    session: &GovernanceSession,
    filter: &ResourceFilter,
    config: &GovernanceConfig,
    json: bool,
) -> Result<()> {
    let summary = session.summary(filter, config.top_departments, config.lowest_completeness_n);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_summary(&summary);
    Ok(())
}

fn run_export(session: &GovernanceSession, config: &GovernanceConfig) -> Result<()> {
    let writer = ArtifactWriter::new(&config.output_dir);
    for path in session.export_baseline(&writer)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_remediate(
    mut session: GovernanceSession,
    edits_path: &Path,
    config: &GovernanceConfig,
    json: bool,
) -> Result<()> {
    let edits = RemediationEdits::from_path(edits_path)
        .with_context(|| format!("Could not read edits from {}", edits_path.display()))?;
    let result = session.apply(&edits);

    if json {
        println!("{}", serde_json::to_string_pretty(&remediation_json(result))?);
    } else {
        print_remediation(result);
    }

    let writer = ArtifactWriter::new(&config.output_dir);
    for path in session.export_remediation(&writer, config.top_departments)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn remediation_json(result: &RemediationResult) -> serde_json::Value {
    serde_json::json!({
        "before_untagged_cost": result.before_untagged_cost,
        "after_untagged_cost": result.after_untagged_cost,
        "untagged_cost_delta": result.untagged_cost_delta(),
        "before_untagged_count": result.before_untagged_count,
        "after_untagged_count": result.after_untagged_count,
        "untagged_count_delta": result.untagged_count_delta(),
        "changed": result.changed,
        "unmatched_resource_ids": result.unmatched_resource_ids,
        "ignored_fields": result.ignored_fields,
        "added_columns": result.added_columns,
    })
}

fn label(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or("(missing)")
}

fn print_section(title: &str) {
    println!("\n{}", "=".repeat(80));
    println!(" {}", title);
    println!("{}", "=".repeat(80));
}

fn print_buckets(title: &str, buckets: &[CostBucket]) {
    println!("\n {}:", title);
    for bucket in buckets {
        println!("   {:<30} ${:>14}", label(&bucket.key), format_usd(bucket.cost));
    }
}

fn print_status_buckets(title: &str, buckets: &[StatusCostBucket]) {
    println!("\n {}:", title);
    for bucket in buckets {
        println!(
            "   {:<24} {:<4} ${:>14}",
            label(&bucket.key),
            bucket.status,
            format_usd(bucket.cost)
        );
    }
}

fn print_summary(summary: &DashboardSummary) {
    print_section("DATA EXPLORATION");
    let overview = &summary.overview;
    println!("   Total resources: {}", overview.total_resources);
    println!("   Tagged:          {}", overview.tagged);
    println!(
        "   Untagged:        {} ({:.2}% untagged)",
        overview.untagged, overview.untagged_pct
    );
    println!("\n Missing values per column:");
    for count in &summary.missing_values {
        println!("   {:<30} {}", count.column, count.missing);
    }

    print_section("COST VISIBILITY");
    let split = &summary.cost_split;
    println!("   Total cost:          ${}", format_usd(split.total_cost));
    println!(
        "   Total untagged cost: ${} ({:.2}% of total)",
        format_usd(split.untagged_cost),
        split.untagged_cost_pct()
    );
    print_buckets("Departments with highest untagged cost", &summary.untagged_cost_by_department);
    print_buckets("Top projects by total cost", &summary.cost_by_project);
    print_status_buckets("Cost by environment and tagging", &summary.cost_by_environment_and_status);

    print_section("TAGGING COMPLIANCE");
    println!(" Tag completeness distribution:");
    for (score, count) in &summary.completeness_distribution {
        println!("   {}: {}", score, count);
    }
    println!("\n Lowest tag completeness:");
    for row in &summary.lowest_completeness {
        println!(
            "   {:<20} {:<12} {} ${:>12} {}",
            label(&row.resource_id),
            label(&row.service),
            row.tag_completeness,
            format_usd(row.cost),
            row.tagged_resolved
        );
    }
    println!("\n Most frequently missing tag fields:");
    for count in &summary.missing_tag_fields {
        println!("   {:<30} {}", count.field, count.missing);
    }

    print_section("DASHBOARD (filtered)");
    let options = &summary.filter_options;
    println!(" Filter options:");
    println!("   --service:    {}", options.services.join(", "));
    println!("   --region:     {}", options.regions.join(", "));
    println!("   --department: {}", options.departments.join(", "));
    println!();
    let filtered = &summary.filtered_cost_split;
    println!("   Resources:     {}", summary.filtered_resources);
    println!("   Tagged cost:   ${}", format_usd(filtered.tagged_cost));
    println!("   Untagged cost: ${}", format_usd(filtered.untagged_cost));
    print_status_buckets(
        "Cost per department by tagging status",
        &summary.filtered_cost_by_department_and_status,
    );
    print_buckets("Total cost per service", &summary.filtered_cost_by_service);
    print_buckets("Cost by environment", &summary.filtered_cost_by_environment);
}

fn print_remediation(result: &RemediationResult) {
    print_section("TAG REMEDIATION");
    println!(
        "   Untagged cost:      ${} -> ${} (delta ${})",
        format_usd(result.before_untagged_cost),
        format_usd(result.after_untagged_cost),
        format_usd(result.untagged_cost_delta())
    );
    println!(
        "   Untagged resources: {} -> {} (delta {})",
        result.before_untagged_count,
        result.after_untagged_count,
        result.untagged_count_delta()
    );
    if !result.unmatched_resource_ids.is_empty() {
        println!("   Unmatched resource ids: {}", result.unmatched_resource_ids.join(", "));
    }
    if result.changed.is_empty() {
        println!("\n No resources changed tagged status.");
        return;
    }
    println!("\n Resources with changed Tagged status (before -> after):");
    for change in &result.changed {
        println!(
            "   {:<20} {} -> {}  ${:>12}",
            label(&change.resource_id),
            change.before,
            change.after,
            format_usd(change.cost)
        );
    }
}
