//! Saves the report to a JSON file

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracker::{NodeData, ReportSink, RunData, TrackedResource, merged};

/// Writes a pretty JSON array, one flat object per resource
pub struct JsonFileSink {
    destination: PathBuf,
}

impl JsonFileSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

impl ReportSink for JsonFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn deliver(&self, run: &RunData, node: &NodeData, resources: &[TrackedResource]) -> Result<()> {
        log::info!("Processing {} resources.", resources.len());

        let rows: Vec<Map<String, Value>> = resources
            .iter()
            .map(|tracked| merged(tracked, node, run))
            .collect();
        let content = serde_json::to_string_pretty(&rows).context("Failed to serialize report")?;

        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Could not create report directory: {}", parent.display())
                })?;
            }
        }

        fs::write(&self.destination, content).with_context(|| {
            format!("Could not write report: {}", self.destination.display())
        })?;

        log::info!("The report is in {} file.", self.destination.display());
        Ok(())
    }
}
