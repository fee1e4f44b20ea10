use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::ui;

pub struct ShowArgs {
    pub report: PathBuf,
    pub top_level: bool,
}

/// One resource of a saved report, as written by the file sink
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRow {
    pub resource: String,
    pub resource_status: String,
    pub resource_order: u64,
    #[serde(default)]
    pub resource_nest_level: u64,
    #[serde(default)]
    pub resource_duration_ms: u64,
    pub resource_execution_phase: String,
    #[serde(default)]
    pub resource_diff: Option<String>,
    #[serde(default)]
    pub resource_error_output: Option<String>,
    #[serde(default)]
    pub resource_notified_by: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub run_success: Option<bool>,
    #[serde(default)]
    pub node_instance_id: Option<String>,
}

/// Load a saved report, sorted by execution order
pub fn load_rows(path: &Path) -> Result<Vec<ReportRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read report: {}", path.display()))?;
    let mut rows: Vec<ReportRow> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid report format: {}", path.display()))?;
    rows.sort_by_key(|row| row.resource_order);
    Ok(rows)
}

/// Count of resources per status
pub fn summarize(rows: &[ReportRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.resource_status.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn run(ctx: &Context, args: ShowArgs) -> Result<()> {
    let mut rows = load_rows(&args.report)?;
    if args.top_level {
        rows.retain(|row| row.resource_nest_level == 0);
    }

    let title = rows
        .first()
        .and_then(|row| row.run_name.clone().or_else(|| row.run_id.clone()))
        .unwrap_or_else(|| args.report.display().to_string());
    ui::header(&title);

    if let Some(first) = rows.first() {
        if let Some(node) = &first.node_instance_id {
            ui::kv("Node", node);
        }
        if let Some(success) = first.run_success {
            ui::kv("Success", &success.to_string());
        }
    }
    println!();

    for row in &rows {
        let notified = row
            .resource_notified_by
            .as_ref()
            .map(|by| format!(" (notified by {by})"))
            .unwrap_or_default();

        println!(
            "{}{}. {} {} {} {}{}",
            ui::nest_prefix(row.resource_nest_level),
            row.resource_order,
            row.resource,
            ui::status(&row.resource_status),
            ui::format_duration_ms(row.resource_duration_ms),
            row.resource_execution_phase,
            notified
        );

        if ctx.verbose > 0 {
            if let Some(diff) = &row.resource_diff {
                for line in diff.lines() {
                    ui::dim(line);
                }
            }
        }
        if let Some(error) = &row.resource_error_output {
            ui::dim(error);
        }
    }

    ui::section("Summary");
    for (status, count) in summarize(&rows) {
        println!("  {} {}", ui::status(&status), count);
    }

    Ok(())
}
