//! Report sinks and the dispatcher that fans a report out to them
//!
//! Sinks are external collaborators (file writers, HTTP posters, log
//! printers). The dispatcher isolates them from each other and from the
//! caller: a failing sink is logged and the next one still runs.

use crate::record::TrackedResource;
use crate::report::{NodeData, Report, RunData};
use anyhow::Result;

/// Destination for a finished report
pub trait ReportSink {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Deliver the report
    fn deliver(&self, run: &RunData, node: &NodeData, resources: &[TrackedResource])
    -> Result<()>;
}

/// Calls every registered sink, in registration order
#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher from a list of sinks
    pub fn with_sinks(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    /// Register a sink after the existing ones
    pub fn add(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Hand the report to every sink; returns how many delivered successfully
    pub fn dispatch(&self, report: &Report) -> usize {
        let mut delivered = 0;

        for sink in &self.sinks {
            match sink.deliver(&report.run, &report.node, &report.resources) {
                Ok(()) => {
                    log::debug!("Report delivered to {}", sink.name());
                    delivered += 1;
                }
                Err(e) => log::error!("Report sink {} failed: {:#}", sink.name(), e),
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        name: &'static str,
        calls: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl ReportSink for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn deliver(
            &self,
            run: &RunData,
            _node: &NodeData,
            resources: &[TrackedResource],
        ) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("{}:{}:{}", self.name, run.id, resources.len()));
            if self.fail {
                anyhow::bail!("{} is down", self.name);
            }
            Ok(())
        }
    }

    fn sink(name: &'static str, calls: &Rc<RefCell<Vec<String>>>, fail: bool) -> Box<dyn ReportSink> {
        Box::new(Recording {
            name,
            calls: calls.clone(),
            fail,
        })
    }

    #[test]
    fn test_dispatch_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let dispatcher = Dispatcher::with_sinks(vec![sink("a", &calls, false), sink("b", &calls, false)]);

        let report = Report {
            run: RunData {
                id: "r1".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(dispatcher.dispatch(&report), 2);
        assert_eq!(*calls.borrow(), vec!["a:r1:0", "b:r1:0"]);
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.add(sink("broken", &calls, true));
        dispatcher.add(sink("file", &calls, false));

        let delivered = dispatcher.dispatch(&Report::default());

        assert_eq!(delivered, 1);
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_empty_dispatcher() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&Report::default()), 0);
    }
}
