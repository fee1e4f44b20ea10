//! Prints the report through the logger

use anyhow::Result;
use tracker::{NodeData, ReportSink, RunData, TrackedResource};

/// Log target of report lines
pub const TARGET: &str = "report";

/// Logs one line per resource, in execution order
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    /// Log at another level
    #[cfg(test)]
    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, run: &RunData, node: &NodeData, resources: &[TrackedResource]) -> Result<()> {
        for line in render(run, node, resources) {
            log::log!(target: TARGET, self.level, "{line}");
        }
        Ok(())
    }
}

/// Report lines, resources sorted by execution order
pub fn render(run: &RunData, node: &NodeData, resources: &[TrackedResource]) -> Vec<String> {
    let mut lines = vec![
        "=============== log ===============".to_string(),
        String::new(),
        format!("Processing {} resources.", resources.len()),
        String::new(),
    ];

    let mut sorted: Vec<_> = resources.iter().collect();
    sorted.sort_by_key(|tracked| tracked.execution_order);

    lines.extend(sorted.iter().map(|tracked| {
        format!(
            "{}{}. {} {} ({} ms) {}",
            "> ".repeat(tracked.nest_level as usize),
            tracked.execution_order,
            tracked.label(),
            tracked.status,
            tracked.duration_ms.unwrap_or(0),
            tracked.execution_phase
        )
    }));

    let optional = |value: Option<&str>| value.unwrap_or("").to_string();

    lines.extend([
        String::new(),
        "Node info:".to_string(),
        String::new(),
        format!("Name: {}", node.instance_id),
        format!("IP Address: {}", node.address),
        format!("Role: {}", node.role),
        String::new(),
        "Run info:".to_string(),
        String::new(),
        format!("ID: {}", run.id),
        format!("Name: {}", optional(run.name.as_deref())),
        format!("Started at: {}", run.started_at),
        format!("Completed at: {}", optional(run.completed_at.as_deref())),
        format!(
            "Success: {}",
            run.success.map(|s| s.to_string()).unwrap_or_default()
        ),
        String::new(),
    ]);

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker::{ResourceRef, Status};

    fn record(name: &str, order: u64, nest_level: u32) -> TrackedResource {
        let mut tracked = TrackedResource::new(&ResourceRef::new("execute", name), "run");
        tracked.execution_order = order;
        tracked.nest_level = nest_level;
        tracked
    }

    #[test]
    fn test_render_sorts_and_pads() {
        let mut outer = record("outer", 1, 0);
        outer.status = Status::Updated;
        outer.duration_ms = Some(120);
        let inner = record("inner", 2, 1);

        let run = RunData {
            id: "abcd1234".into(),
            success: Some(true),
            ..Default::default()
        };
        let lines = render(&run, &NodeData::default(), &[inner, outer]);

        assert_eq!(lines[2], "Processing 2 resources.");
        assert_eq!(lines[4], "1. execute[outer]#run updated (120 ms) compile");
        assert_eq!(lines[5], "> 2. execute[inner]#run unprocessed (0 ms) compile");
        assert!(lines.contains(&"Role: <no role>".to_string()));
        assert!(lines.contains(&"ID: abcd1234".to_string()));
        assert!(lines.contains(&"Success: true".to_string()));
    }

    #[test]
    fn test_empty_report() {
        let lines = render(&RunData::default(), &NodeData::default(), &[]);
        assert_eq!(lines[2], "Processing 0 resources.");
        assert!(lines.contains(&"Completed at: ".to_string()));
    }

    #[test]
    fn test_deliver_succeeds() {
        let sink = LogSink::with_level(log::Level::Debug);
        assert_eq!(sink.name(), "log");
        sink.deliver(&RunData::default(), &NodeData::default(), &[record("a", 1, 0)])
            .unwrap();
    }
}
