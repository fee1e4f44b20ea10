//! Replays a recorded event log through a tracker
//!
//! The log is JSON lines, one lifecycle event per line, tagged by `event`.
//! Blank lines and lines starting with `#` are ignored. Resources are
//! declared once and then referenced by their `kind[name]` label:
//!
//! ```text
//! {"event": "declare", "resource": {"kind": "package", "name": "curl", "actions": ["install"]}}
//! {"event": "run_started"}
//! {"event": "start", "resource": "package[curl]", "action": "install"}
//! {"event": "state_loaded", "resource": "package[curl]", "action": "install", "observed": {"version": null}}
//! {"event": "updated", "resource": "package[curl]", "action": "install"}
//! {"event": "completed", "resource": "package[curl]", "elapsed_ms": 850}
//! {"event": "run_completed"}
//! ```

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracker::{Attributes, ConvergeEvents, NotificationType, ResourceRef, Tracker};

/// Resource label, e.g. "package[curl]"
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_:]+)\[(.+)\]$").expect("valid label pattern"));

/// Errors while parsing an event log; lines are 1-indexed
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: invalid event: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: malformed resource label '{label}', expected kind[name]")]
    Label { line: usize, label: String },

    #[error("line {line}: resource '{label}' was never declared")]
    Undeclared { line: usize, label: String },
}

/// One line of the event log, as written
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum RawEvent {
    Declare {
        resource: ResourceRef,
        #[serde(default = "default_true")]
        top_level: bool,
    },
    WhyRun {
        enabled: bool,
    },
    RunStarted,
    Start {
        resource: String,
        #[serde(default)]
        action: String,
        #[serde(default)]
        notification_type: Option<NotificationType>,
        #[serde(default)]
        notifying_resource: Option<String>,
    },
    StateLoaded {
        resource: String,
        #[serde(default)]
        action: String,
        #[serde(default)]
        observed: Option<Attributes>,
    },
    Updated {
        resource: String,
        #[serde(default)]
        action: String,
    },
    UpToDate {
        resource: String,
        #[serde(default)]
        action: String,
    },
    Skipped {
        resource: String,
        #[serde(default)]
        action: String,
        reason: String,
    },
    Completed {
        resource: String,
        #[serde(default)]
        elapsed_ms: Option<u64>,
        #[serde(default)]
        diff: Option<String>,
    },
    Failed {
        resource: String,
        #[serde(default)]
        action: String,
        error: String,
    },
    FailedRetriable {
        resource: String,
        #[serde(default)]
        action: String,
        remaining_retries: u32,
        error: String,
    },
    RunCompleted,
    RunFailed {
        error: String,
    },
}

fn default_true() -> bool {
    true
}

/// A resource event target: the declared handle and the action
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub resource: ResourceRef,
    pub action: String,
}

/// A parsed event with its resource labels resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Declare {
        resource: ResourceRef,
        top_level: bool,
    },
    WhyRun(bool),
    RunStarted,
    Start {
        target: Target,
        notification_type: Option<NotificationType>,
        notifying_resource: Option<ResourceRef>,
    },
    StateLoaded {
        target: Target,
        observed: Option<Attributes>,
    },
    Updated(Target),
    UpToDate(Target),
    Skipped {
        target: Target,
        reason: String,
    },
    /// The handle carries the elapsed time and engine diff of this completion
    Completed(ResourceRef),
    Failed {
        target: Target,
        error: String,
    },
    FailedRetriable {
        target: Target,
        remaining_retries: u32,
        error: String,
    },
    RunCompleted,
    RunFailed(String),
}

/// Split a `kind[name]` label
pub fn parse_label(label: &str) -> Option<(&str, &str)> {
    let captures = LABEL_RE.captures(label.trim())?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// Declared handles by label
#[derive(Default)]
struct Declarations {
    handles: HashMap<String, ResourceRef>,
}

impl Declarations {
    fn declare(&mut self, resource: &ResourceRef) {
        self.handles.insert(resource.label(), resource.clone());
    }

    fn resolve(&self, line: usize, label: &str) -> Result<ResourceRef, ParseError> {
        let (kind, name) = parse_label(label).ok_or_else(|| ParseError::Label {
            line,
            label: label.to_string(),
        })?;

        self.handles
            .get(&format!("{kind}[{name}]"))
            .cloned()
            .ok_or_else(|| ParseError::Undeclared {
                line,
                label: label.to_string(),
            })
    }

    fn target(&self, line: usize, label: &str, action: String) -> Result<Target, ParseError> {
        Ok(Target {
            resource: self.resolve(line, label)?,
            action,
        })
    }
}

/// Parse an event log
pub fn parse_events(input: &str) -> Result<Vec<Event>, ParseError> {
    let mut declarations = Declarations::default();
    let mut events = Vec::new();

    for (idx, text) in input.lines().enumerate() {
        let line = idx + 1;
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let raw: RawEvent =
            serde_json::from_str(text).map_err(|source| ParseError::Json { line, source })?;

        let event = match raw {
            RawEvent::Declare {
                resource,
                top_level,
            } => {
                declarations.declare(&resource);
                Event::Declare {
                    resource,
                    top_level,
                }
            }
            RawEvent::WhyRun { enabled } => Event::WhyRun(enabled),
            RawEvent::RunStarted => Event::RunStarted,
            RawEvent::Start {
                resource,
                action,
                notification_type,
                notifying_resource,
            } => Event::Start {
                target: declarations.target(line, &resource, action)?,
                notification_type,
                notifying_resource: notifying_resource
                    .map(|label| declarations.resolve(line, &label))
                    .transpose()?,
            },
            RawEvent::StateLoaded {
                resource,
                action,
                observed,
            } => Event::StateLoaded {
                target: declarations.target(line, &resource, action)?,
                observed,
            },
            RawEvent::Updated { resource, action } => {
                Event::Updated(declarations.target(line, &resource, action)?)
            }
            RawEvent::UpToDate { resource, action } => {
                Event::UpToDate(declarations.target(line, &resource, action)?)
            }
            RawEvent::Skipped {
                resource,
                action,
                reason,
            } => Event::Skipped {
                target: declarations.target(line, &resource, action)?,
                reason,
            },
            RawEvent::Completed {
                resource,
                elapsed_ms,
                diff,
            } => {
                let mut handle = declarations.resolve(line, &resource)?;
                handle.elapsed_ms = elapsed_ms.unwrap_or(0);
                handle.diff = diff;
                Event::Completed(handle)
            }
            RawEvent::Failed {
                resource,
                action,
                error,
            } => Event::Failed {
                target: declarations.target(line, &resource, action)?,
                error,
            },
            RawEvent::FailedRetriable {
                resource,
                action,
                remaining_retries,
                error,
            } => Event::FailedRetriable {
                target: declarations.target(line, &resource, action)?,
                remaining_retries,
                error,
            },
            RawEvent::RunCompleted => Event::RunCompleted,
            RawEvent::RunFailed { error } => Event::RunFailed(error),
        };

        events.push(event);
    }

    Ok(events)
}

/// What a replay did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Events fed to the tracker
    pub events: usize,
    /// Resource events the tracker ignored
    pub ignored: usize,
    /// Whether the log ended the run
    pub finished: bool,
}

/// Feed parsed events through a tracker
pub fn drive(tracker: &mut Tracker, events: &[Event]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for event in events {
        summary.events += 1;

        let applied = match event {
            Event::Declare {
                resource,
                top_level,
            } => {
                if *top_level {
                    tracker.declare(resource.clone());
                }
                true
            }
            Event::WhyRun(enabled) => {
                tracker.set_why_run(*enabled);
                true
            }
            Event::RunStarted => {
                tracker.run_started();
                true
            }
            Event::Start {
                target,
                notification_type,
                notifying_resource,
            } => tracker.start(
                &target.resource,
                &target.action,
                *notification_type,
                notifying_resource.as_ref(),
            ),
            Event::StateLoaded { target, observed } => {
                tracker.current_state_loaded(&target.resource, &target.action, observed.as_ref())
            }
            Event::Updated(target) => tracker.updated(&target.resource, &target.action),
            Event::UpToDate(target) => tracker.up_to_date(&target.resource, &target.action),
            Event::Skipped { target, reason } => {
                tracker.skipped(&target.resource, &target.action, reason)
            }
            Event::Completed(resource) => tracker.completed(resource),
            Event::Failed { target, error } => {
                tracker.failed(&target.resource, &target.action, error)
            }
            Event::FailedRetriable {
                target,
                remaining_retries,
                error,
            } => tracker.failed_retriable(
                &target.resource,
                &target.action,
                *remaining_retries,
                error,
            ),
            Event::RunCompleted => {
                tracker.run_completed();
                summary.finished = true;
                true
            }
            Event::RunFailed(error) => {
                tracker.run_failed(error);
                summary.finished = true;
                true
            }
        };

        if !applied {
            summary.ignored += 1;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker::{NodeData, Phase, Status, TrackerOptions};

    const RECIPE: &str = r#"
# two packages, the second one fails
{"event": "declare", "resource": {"kind": "package", "name": "curl", "actions": ["install"]}}
{"event": "declare", "resource": {"kind": "service", "name": "nginx", "actions": ["enable", "start"]}}
{"event": "declare", "resource": {"kind": "execute", "name": "inner"}, "top_level": false}

{"event": "run_started"}
{"event": "start", "resource": "package[curl]", "action": "install"}
{"event": "state_loaded", "resource": "package[curl]", "action": "install", "observed": {"version": "7.0"}}
{"event": "execute[inner]", "ignored": true}
"#;

    fn tracker() -> Tracker {
        Tracker::register(NodeData::default(), TrackerOptions::default())
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("package[curl]"), Some(("package", "curl")));
        assert_eq!(parse_label("file[/etc/motd]"), Some(("file", "/etc/motd")));
        assert_eq!(
            parse_label("execute[echo [hi]]"),
            Some(("execute", "echo [hi]"))
        );
        assert_eq!(parse_label("package"), None);
        assert_eq!(parse_label("[curl]"), None);
    }

    #[test]
    fn test_unknown_event_reports_line() {
        let err = parse_events(RECIPE).unwrap_err();
        assert!(matches!(err, ParseError::Json { line: 10, .. }), "{err}");
        assert!(err.to_string().starts_with("line 10:"));
    }

    #[test]
    fn test_undeclared_resource() {
        let input = r#"{"event": "updated", "resource": "package[git]", "action": "install"}"#;
        let err = parse_events(input).unwrap_err();
        assert!(matches!(err, ParseError::Undeclared { line: 1, .. }));
        assert_eq!(err.to_string(), "line 1: resource 'package[git]' was never declared");
    }

    #[test]
    fn test_malformed_label() {
        let input = r#"{"event": "updated", "resource": "package curl", "action": "install"}"#;
        assert!(matches!(
            parse_events(input).unwrap_err(),
            ParseError::Label { line: 1, .. }
        ));
    }

    #[test]
    fn test_completed_carries_timing_and_diff() {
        let input = r#"
{"event": "declare", "resource": {"kind": "template", "name": "/etc/motd", "actions": ["create"]}}
{"event": "completed", "resource": "template[/etc/motd]", "elapsed_ms": 12, "diff": "+hello"}
"#;
        let events = parse_events(input).unwrap();
        match &events[1] {
            Event::Completed(handle) => {
                assert_eq!(handle.elapsed_ms, 12);
                assert_eq!(handle.diff.as_deref(), Some("+hello"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_replay_failed_run() {
        let valid: String = RECIPE
            .lines()
            .filter(|line| !line.contains("ignored"))
            .collect::<Vec<_>>()
            .join("\n");
        let input = format!(
            r#"{valid}
{{"event": "updated", "resource": "package[curl]", "action": "install"}}
{{"event": "completed", "resource": "package[curl]", "elapsed_ms": 850}}
{{"event": "start", "resource": "service[nginx]", "action": "enable"}}
{{"event": "failed_retriable", "resource": "service[nginx]", "action": "enable", "remaining_retries": 1, "error": "timeout"}}
{{"event": "failed", "resource": "service[nginx]", "action": "enable", "error": "timeout again"}}
{{"event": "completed", "resource": "service[nginx]"}}
{{"event": "updated", "resource": "execute[inner]", "action": "run"}}
{{"event": "run_failed", "error": "service[nginx] failed"}}
"#
        );

        let events = parse_events(&input).unwrap();
        let mut t = tracker();
        let summary = drive(&mut t, &events);

        assert!(summary.finished);
        assert_eq!(summary.ignored, 1);
        assert_eq!(t.run().success, Some(false));

        let processed = t.processed();
        assert_eq!(processed.len(), 3);
        assert_eq!(processed[0].status, Status::Updated);
        assert_eq!(processed[0].duration_ms, Some(850));
        assert_eq!(
            processed[0].diff.as_deref(),
            Some("Packages: curl\nCurrent versions: 7.0\nWanted versions: any\n")
        );
        assert_eq!(processed[1].status, Status::Failed);
        assert_eq!(processed[1].retries, 1);
        assert_eq!(processed[2].label(), "service[nginx]#start");
        assert_eq!(processed[2].execution_phase, Phase::PostConverge);
    }

    #[test]
    fn test_why_run_event() {
        let input = r#"
{"event": "why_run", "enabled": true}
{"event": "declare", "resource": {"kind": "execute", "name": "a", "actions": ["run"]}}
{"event": "run_started"}
{"event": "start", "resource": "execute[a]", "action": "run"}
{"event": "completed", "resource": "execute[a]"}
{"event": "run_completed"}
"#;
        let mut t = tracker();
        drive(&mut t, &parse_events(input).unwrap());

        assert_eq!(t.processed()[0].status, Status::WhyRun);
        assert_eq!(t.run().success, Some(true));
    }

    #[test]
    fn test_notifying_resource_is_resolved() {
        let input = r#"
{"event": "declare", "resource": {"kind": "template", "name": "nginx.conf", "actions": ["create"]}}
{"event": "declare", "resource": {"kind": "service", "name": "nginx", "actions": ["nothing"]}}
{"event": "start", "resource": "service[nginx]", "action": "restart", "notification_type": "delayed", "notifying_resource": "template[nginx.conf]"}
"#;
        let events = parse_events(input).unwrap();
        match &events[2] {
            Event::Start {
                notification_type,
                notifying_resource,
                ..
            } => {
                assert_eq!(*notification_type, Some(NotificationType::Delayed));
                assert_eq!(
                    notifying_resource.as_ref().map(ResourceRef::label).as_deref(),
                    Some("template[nginx.conf]")
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
