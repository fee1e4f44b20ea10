//! Core types shared by records, diffs and the event handler

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attribute snapshot of a resource: attribute name to value
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Outcome of a tracked resource execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Started but no outcome was reported (also used for backfilled records)
    #[default]
    Unprocessed,
    /// The engine changed the resource
    Updated,
    /// The resource was already in the desired state
    UpToDate,
    /// A guard prevented the action
    Skipped,
    /// The action failed
    Failed,
    /// The engine only simulated the action
    WhyRun,
    /// Never reached because the run failed earlier
    UnprocessedPostFailure,
}

impl Status {
    /// Every status, in report order
    pub const ALL: [Self; 7] = [
        Self::Updated,
        Self::UpToDate,
        Self::Skipped,
        Self::Failed,
        Self::WhyRun,
        Self::Unprocessed,
        Self::UnprocessedPostFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Updated => "updated",
            Self::UpToDate => "up-to-date",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::WhyRun => "why-run",
            Self::UnprocessedPostFailure => "unprocessed-post-failure",
        }
    }

    /// Whether the engine attempted to converge the resource
    pub fn is_attempted(&self) -> bool {
        matches!(self, Self::Updated | Self::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::UnknownStatus(s.to_string()))
    }
}

/// Phase of the convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Declaration time, before convergence starts
    #[default]
    Compile,
    /// Main ordered execution
    Converge,
    /// Delayed notifications after the ordered pass
    Delayed,
    /// Failure backfill
    PostConverge,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Converge => "converge",
            Self::Delayed => "delayed",
            Self::PostConverge => "post-converge",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of a notification that triggered an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Before,
    Immediate,
    Delayed,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Immediate => "immediate",
            Self::Delayed => "delayed",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource kinds the diff builder knows how to describe
///
/// Resolved once from the engine's kind tag when a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    Package,
    Service,
    User,
    File,
    /// Any kind without a diff
    #[default]
    Other,
}

impl ResourceKind {
    /// Resolve a kind tag such as "apt_package" or "template"
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "package" => Self::Package,
            "service" => Self::Service,
            "user" => Self::User,
            "file" | "template" | "cookbook_file" | "remote_file" => Self::File,
            t if t.ends_with("_package") => Self::Package,
            t if t.ends_with("_service") => Self::Service,
            t if t.ends_with("_user") => Self::User,
            _ => Self::Other,
        }
    }

    /// Attributes captured from the current and declared state
    pub fn tracked_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Package => &["version"],
            Self::Service => &["running", "enabled"],
            Self::User => &["uid", "gid", "home", "shell", "comment"],
            Self::File | Self::Other => &[],
        }
    }

    /// Whether attribute snapshots are captured for this kind
    pub fn captures_attributes(&self) -> bool {
        !self.tracked_attributes().is_empty()
    }
}
