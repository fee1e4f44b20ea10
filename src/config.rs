//! TOML configuration for runs and report sinks
//!
//! ```toml
//! [run]
//! name = "nightly"
//! why_run = false
//!
//! [node]
//! address = "10.0.0.1"
//! instance_id = "web-1"
//! role = "web"
//!
//! [outputs.log]
//! enabled = true
//!
//! [outputs.file]
//! directory = "~/reports"
//! file_name = "sous-vide-report.json"
//!
//! [outputs.http]
//! url = "http://localhost:9200/sous-vide/resource"
//! max_retries = 2
//! retry_delay_secs = 2
//! ```

use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracker::{NodeData, TrackerOptions};

/// Default report file name
pub const DEFAULT_REPORT_FILE: &str = "sous-vide-report.json";

// ============================================================================
// Main Config Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SousVideConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub outputs: OutputsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Explicit run name; derived from time, node and run id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Simulate-only run
    #[serde(default)]
    pub why_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl NodeConfig {
    /// Node metadata, with placeholders for anything unset
    pub fn to_node_data(&self) -> NodeData {
        let defaults = NodeData::default();
        NodeData {
            address: self.address.clone().unwrap_or(defaults.address),
            instance_id: self.instance_id.clone().unwrap_or(defaults.instance_id),
            role: self.role.clone().unwrap_or(defaults.role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputsConfig {
    #[serde(default)]
    pub log: LogOutput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOutput {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LogOutput {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutput {
    /// Report directory; the state directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default = "default_report_file")]
    pub file_name: String,
}

impl Default for FileOutput {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_report_file(),
        }
    }
}

impl FileOutput {
    /// Resolved report path
    pub fn destination(&self) -> Result<PathBuf> {
        let directory = match &self.directory {
            Some(dir) => paths::expand(dir),
            None => paths::state_dir()?,
        };
        Ok(directory.join(&self.file_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOutput {
    pub url: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_report_file() -> String {
    DEFAULT_REPORT_FILE.to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub why_run: bool,
    pub run_name: Option<String>,
    pub output_file: Option<PathBuf>,
    pub no_log: bool,
}

impl SousVideConfig {
    /// Load the config from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Render the config as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.outputs.file {
            if file.file_name.trim().is_empty() {
                anyhow::bail!("outputs.file.file_name cannot be empty");
            }
        }

        if let Some(http) = &self.outputs.http {
            if !(http.url.starts_with("http://") || http.url.starts_with("https://")) {
                anyhow::bail!(
                    "outputs.http.url must start with http:// or https://, got '{}'",
                    http.url
                );
            }
        }

        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if overrides.why_run {
            self.run.why_run = true;
        }
        if let Some(name) = &overrides.run_name {
            self.run.name = Some(name.clone());
        }
        if overrides.no_log {
            self.outputs.log.enabled = false;
        }
        if let Some(path) = &overrides.output_file {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ".".to_string());
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.outputs.file = Some(FileOutput {
                directory: Some(directory),
                file_name,
            });
        }
    }

    /// Tracker options for a run
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            why_run: self.run.why_run,
            run_name: self.run.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SousVideConfig::load_from(&temp.path().join("config.toml")).unwrap();

        assert_eq!(config, SousVideConfig::default());
        assert!(config.outputs.log.enabled);
        assert!(config.outputs.file.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[run]
why_run = true

[node]
role = "web"

[outputs.log]
enabled = false

[outputs.file]
directory = "/var/cache/chef"

[outputs.http]
url = "https://logs.example.com/sous-vide"
"#,
        )
        .unwrap();

        let config = SousVideConfig::load_from(&path).unwrap();
        assert!(config.run.why_run);
        assert!(!config.outputs.log.enabled);

        let file = config.outputs.file.as_ref().unwrap();
        assert_eq!(file.file_name, DEFAULT_REPORT_FILE);
        assert_eq!(
            file.destination().unwrap(),
            PathBuf::from("/var/cache/chef/sous-vide-report.json")
        );

        let http = config.outputs.http.as_ref().unwrap();
        assert_eq!(http.max_retries, 2);
        assert_eq!(http.retry_delay_secs, 2);

        let node = config.node.to_node_data();
        assert_eq!(node.role, "web");
        assert_eq!(node.address, "<no ip>");
        assert_eq!(node.instance_id, "<unknown>");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[run\nwhy_run = ").unwrap();

        let err = SousVideConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = SousVideConfig {
            outputs: OutputsConfig {
                http: Some(HttpOutput {
                    url: "localhost:9200".into(),
                    max_retries: 2,
                    retry_delay_secs: 2,
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_file_name() {
        let config = SousVideConfig {
            outputs: OutputsConfig {
                file: Some(FileOutput {
                    directory: None,
                    file_name: " ".into(),
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = SousVideConfig::default();
        config.apply(&Overrides {
            why_run: true,
            run_name: Some("manual".into()),
            output_file: Some(PathBuf::from("/tmp/out/report.json")),
            no_log: true,
        });

        assert!(config.run.why_run);
        assert!(!config.outputs.log.enabled);
        let options = config.tracker_options();
        assert_eq!(options.run_name.as_deref(), Some("manual"));
        assert!(options.why_run);
        assert_eq!(
            config.outputs.file.unwrap().destination().unwrap(),
            PathBuf::from("/tmp/out/report.json")
        );
    }

    #[test]
    fn test_bare_output_file_lands_in_current_dir() {
        let mut config = SousVideConfig::default();
        config.apply(&Overrides {
            output_file: Some(PathBuf::from("report.json")),
            ..Default::default()
        });

        let file = config.outputs.file.unwrap();
        assert_eq!(file.directory.as_deref(), Some("."));
        assert_eq!(file.file_name, "report.json");
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = SousVideConfig::default();
        config.node.role = Some("db".into());
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("role = \"db\""));
        let parsed: SousVideConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
