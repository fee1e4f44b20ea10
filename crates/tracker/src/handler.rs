//! Event stream handler - rebuilds an execution report from lifecycle events
//!
//! The converging engine calls one method per lifecycle event. For every
//! resource the expected flow is:
//!
//! 1. `start`
//! 2. `current_state_loaded` (not fired by every kind)
//! 3. zero or more outcome events (`updated`, `up_to_date`, `skipped`,
//!    `failed`, `failed_retriable`)
//! 4. `completed`
//!
//! Resources started from inside another resource's convergence are nested:
//! the enclosing record is parked on a stack until its children complete.
//! Events that cannot be matched to a record are ignored and logged at debug
//! level; they are expected for anything fired before the tracker existed.

use crate::diff;
use crate::nesting::{StartKind, Step, classify_start};
use crate::output::Dispatcher;
use crate::record::TrackedResource;
use crate::report::{NodeData, Report, RunData};
use crate::resource::ResourceRef;
use crate::types::{Attributes, NotificationType, Phase, Status};
use std::fmt;

/// Lifecycle callbacks fired by the converging engine
///
/// Resource callbacks return `false` when the event was ignored (out of
/// bound or not related to the record in progress). That is not an error.
pub trait ConvergeEvents {
    /// Called before an action is executed on a resource
    fn start(
        &mut self,
        resource: &ResourceRef,
        action: &str,
        notification_type: Option<NotificationType>,
        notifying_resource: Option<&ResourceRef>,
    ) -> bool;

    /// Called once the engine loaded the resource's current state
    fn current_state_loaded(
        &mut self,
        resource: &ResourceRef,
        action: &str,
        observed: Option<&Attributes>,
    ) -> bool;

    /// Called when the action modified the resource
    fn updated(&mut self, resource: &ResourceRef, action: &str) -> bool;

    /// Called when the resource was already in the desired state
    fn up_to_date(&mut self, resource: &ResourceRef, action: &str) -> bool;

    /// Called when a guard skipped the action
    fn skipped(&mut self, resource: &ResourceRef, action: &str, reason: &str) -> bool;

    /// Called when the action finished, whatever its outcome
    fn completed(&mut self, resource: &ResourceRef) -> bool;

    /// Called when the action failed and will not be retried
    fn failed(&mut self, resource: &ResourceRef, action: &str, error: &dyn fmt::Display) -> bool;

    /// Called when the action failed but will be retried
    fn failed_retriable(
        &mut self,
        resource: &ResourceRef,
        action: &str,
        remaining_retries: u32,
        error: &dyn fmt::Display,
    ) -> bool;

    /// Called before convergence starts
    fn run_started(&mut self);

    /// Called when convergence finished successfully
    fn run_completed(&mut self);

    /// Called when convergence failed
    fn run_failed(&mut self, error: &dyn fmt::Display);
}

/// Options for a tracker
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// The engine only simulates actions
    pub why_run: bool,
    /// Explicit run name; derived at run start when absent
    pub run_name: Option<String>,
}

/// Coarse state of the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Idle,
    ProcessingTop,
    ProcessingNested,
}

/// Bookkeeping threaded through every callback
#[derive(Debug, Default)]
struct RunState {
    /// Last execution order handed out
    execution_order: u64,
    /// Position in the expanded top-level resource list
    cursor: usize,
    phase: Phase,
    in_progress: Option<TrackedResource>,
    /// Enclosing records of the one in progress, innermost last
    nesting: Vec<TrackedResource>,
    last_step: Option<Step>,
    /// Finalized records, in completion order
    processed: Vec<TrackedResource>,
}

impl RunState {
    fn next_order(&mut self) -> u64 {
        self.execution_order += 1;
        self.execution_order
    }

    fn depth(&self) -> u32 {
        self.nesting.last().map_or(0, |parent| parent.nest_level + 1)
    }
}

/// Tracks one convergence run
///
/// Owned by whatever drives the run and handed to the engine as a
/// [`ConvergeEvents`] implementation. A tracker covers exactly one run.
pub struct Tracker {
    state: RunState,
    run: RunData,
    node: NodeData,
    why_run: bool,
    /// Top-level resources the engine intends to converge, in order
    collection: Vec<ResourceRef>,
    dispatcher: Dispatcher,
}

impl Tracker {
    /// Create a tracker for a node
    pub fn register(node: NodeData, options: TrackerOptions) -> Self {
        log::info!("Registering tracker for {}", node.instance_id);

        Self {
            state: RunState::default(),
            run: RunData {
                id: new_run_id(),
                name: options.run_name,
                started_at: timestamp(),
                completed_at: None,
                success: None,
            },
            node,
            why_run: options.why_run,
            collection: Vec::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Use a dispatcher for finished reports
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Append a top-level resource to the expected collection
    pub fn declare(&mut self, resource: ResourceRef) {
        self.collection.push(resource);
    }

    /// Replace the expected top-level collection
    pub fn set_collection(&mut self, collection: Vec<ResourceRef>) {
        self.collection = collection;
    }

    /// Switch simulate-only mode on or off
    pub fn set_why_run(&mut self, why_run: bool) {
        self.why_run = why_run;
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn run(&self) -> &RunData {
        &self.run
    }

    pub fn node(&self) -> &NodeData {
        &self.node
    }

    /// Finalized records, in completion order
    pub fn processed(&self) -> &[TrackedResource] {
        &self.state.processed
    }

    /// Record currently in progress
    pub fn in_progress(&self) -> Option<&TrackedResource> {
        self.state.in_progress.as_ref()
    }

    /// A parent waiting on the stack keeps the handler busy
    pub fn handler_state(&self) -> HandlerState {
        match self.state.in_progress.as_ref().or_else(|| self.state.nesting.last()) {
            None => HandlerState::Idle,
            Some(tracked) if tracked.nest_level > 0 => HandlerState::ProcessingNested,
            Some(_) => HandlerState::ProcessingTop,
        }
    }

    /// Snapshot of the report as it stands
    pub fn report(&self) -> Report {
        Report {
            run: self.run.clone(),
            node: self.node.clone(),
            resources: self.state.processed.clone(),
        }
    }

    /// Record in progress for an event on `resource`
    ///
    /// Kinds that skip `current_state_loaded` report outcomes after their
    /// children completed; their record is recovered from the stack.
    fn current_for(&mut self, event: &str, resource: &ResourceRef) -> Option<&mut TrackedResource> {
        if self.state.in_progress.is_none()
            && self
                .state
                .nesting
                .last()
                .is_some_and(|parent| parent.tracks(resource))
        {
            self.state.in_progress = self.state.nesting.pop();
            log::debug!("Recovered {} from the nesting stack", resource.label());
        }

        match self.state.in_progress.as_mut() {
            None => {
                log::debug!(
                    "Received :{event} on {} out of bound, ignoring",
                    resource.label()
                );
                None
            }
            Some(tracked) if !tracked.tracks(resource) => {
                log::debug!(
                    "Received :{event} on {} while processing {tracked}, ignoring",
                    resource.label()
                );
                None
            }
            Some(tracked) => Some(tracked),
        }
    }

    /// Finalize records that will never see `completed`
    fn finalize_abandoned(&mut self) {
        let mut abandoned: Vec<TrackedResource> = self.state.in_progress.take().into_iter().collect();
        abandoned.extend(self.state.nesting.drain(..).rev());

        for mut tracked in abandoned {
            log::warn!("{tracked} never completed, reporting it as {}", tracked.status);
            tracked.diff = diff::build(&tracked, None);
            tracked.completed_at = Some(timestamp());
            self.state.processed.push(tracked);
        }
        self.state.last_step = None;
    }

    /// Expand the collection into one entry per declared action
    fn expand_collection(&self) -> Vec<(ResourceRef, String)> {
        self.collection
            .iter()
            .flat_map(|resource| {
                resource
                    .actions
                    .iter()
                    .map(move |action| (resource.clone(), action.clone()))
            })
            .collect()
    }

    /// Report resources the failed run never reached
    ///
    /// Everything from the cursor onward is fed through `start` and
    /// `completed` so it lands in the report as unprocessed, in the
    /// post-converge phase.
    fn backfill(&mut self) {
        let mut expected = self.expand_collection();

        // Failure on the last resource or inside a delayed notification
        if self.state.cursor >= expected.len() {
            log::debug!("No unprocessed resources to backfill");
            return;
        }

        let missing = expected.split_off(self.state.cursor);
        log::debug!("Backfilling {} unprocessed resources", missing.len());

        for (resource, action) in missing {
            self.start(&resource, &action, None, None);
            self.completed(&resource);
        }
    }

    fn send_report(&self) {
        let report = self.report();
        log::debug!(
            "Dispatching report with {} resources to {} sinks",
            report.resources.len(),
            self.dispatcher.len()
        );
        self.dispatcher.dispatch(&report);
    }
}

impl ConvergeEvents for Tracker {
    fn start(
        &mut self,
        resource: &ResourceRef,
        action: &str,
        notification_type: Option<NotificationType>,
        notifying_resource: Option<&ResourceRef>,
    ) -> bool {
        let mut reused_order = None;

        match classify_start(self.state.in_progress.as_ref(), self.state.last_step, resource) {
            StartKind::Misrouted => {
                log::debug!(
                    "Received :start on {}#{action} while another resource is in progress, ignoring",
                    resource.label()
                );
                return false;
            }
            StartKind::Nested => {
                if let Some(parent) = self.state.in_progress.take() {
                    log::debug!("{} is nested in {parent}", resource.label());
                    self.state.nesting.push(parent);
                }
            }
            StartKind::Restart => {
                if let Some(previous) = self.state.in_progress.take() {
                    log::debug!("{previous} started again, replacing its record");
                    reused_order = Some(previous.execution_order);
                }
            }
            StartKind::Fresh => {}
        }

        if notification_type == Some(NotificationType::Delayed) && self.state.phase != Phase::Delayed
        {
            log::debug!("Changed run phase to 'delayed'");
            self.state.phase = Phase::Delayed;
        }

        let mut tracked = TrackedResource::new(resource, action);
        tracked.execution_order = match reused_order {
            Some(order) => order,
            None => self.state.next_order(),
        };
        tracked.execution_phase = self.state.phase;
        tracked.nest_level = self.state.depth();
        tracked.started_at = Some(timestamp());
        tracked.notification_type = notification_type;

        if let Some(notifier) = notifying_resource {
            log::debug!("Notified from {notifier} ({notification_type:?})");
            tracked.notifying_resource = Some(notifier.label());
        }

        log::debug!("Received :start on {tracked}");
        self.state.in_progress = Some(tracked);
        self.state.last_step = Some(Step::Started);
        true
    }

    fn current_state_loaded(
        &mut self,
        resource: &ResourceRef,
        _action: &str,
        observed: Option<&Attributes>,
    ) -> bool {
        let Some(tracked) = self.state.in_progress.as_mut() else {
            log::debug!(
                "Received :current_state_loaded on {} out of bound, ignoring",
                resource.label()
            );
            return false;
        };

        if !tracked.tracks(resource) {
            log::debug!(
                "Received :current_state_loaded on {} while processing {tracked}, ignoring",
                resource.label()
            );
            return false;
        }

        log::debug!("Received :current_state_loaded on {tracked}");

        // The only point where the current state is visible; the diff itself
        // is rendered at completion
        if tracked.kind().captures_attributes() {
            if let Some(observed) = observed {
                tracked.loaded_attributes = resource.select_attributes(observed);
            }
            tracked.wanted_attributes = resource.select_attributes(&resource.attributes);
        }
        tracked.attributes_loaded = observed.is_some();

        self.state.last_step = Some(Step::StateLoaded);
        true
    }

    fn updated(&mut self, resource: &ResourceRef, _action: &str) -> bool {
        let Some(tracked) = self.current_for("updated", resource) else {
            return false;
        };

        log::debug!("Received :updated on {tracked}");
        tracked.status = Status::Updated;
        self.state.last_step = Some(Step::Outcome);
        true
    }

    fn up_to_date(&mut self, resource: &ResourceRef, _action: &str) -> bool {
        let Some(tracked) = self.current_for("up_to_date", resource) else {
            return false;
        };

        log::debug!("Received :up_to_date on {tracked}");
        tracked.status = Status::UpToDate;
        self.state.last_step = Some(Step::Outcome);
        true
    }

    fn skipped(&mut self, resource: &ResourceRef, _action: &str, reason: &str) -> bool {
        let Some(tracked) = self.current_for("skipped", resource) else {
            return false;
        };

        log::debug!("Received :skipped on {tracked} ({reason})");
        tracked.status = Status::Skipped;
        tracked.guard_description = Some(reason.to_string());
        self.state.last_step = Some(Step::Outcome);
        true
    }

    fn completed(&mut self, resource: &ResourceRef) -> bool {
        let why_run = self.why_run;
        let phase = self.state.phase;

        let advances_cursor = {
            let Some(tracked) = self.current_for("completed", resource) else {
                return false;
            };

            log::debug!("Received :completed on {tracked}");
            tracked.duration_ms = Some(resource.elapsed_ms);

            if why_run {
                log::debug!("{tracked} marked why-run");
                tracked.status = Status::WhyRun;
            }

            // Only ordered top-level converges move through the collection;
            // notified, simulated, nested and off-phase runs are out of order
            let advances = !tracked.is_notified()
                && !why_run
                && tracked.nest_level == 0
                && phase == Phase::Converge;

            // Rendered last so it can see the final status
            tracked.diff = diff::build(tracked, resource.diff.as_deref());
            tracked.completed_at = Some(timestamp());
            advances
        };

        if advances_cursor {
            self.state.cursor += 1;
        }
        if let Some(tracked) = self.state.in_progress.take() {
            self.state.processed.push(tracked);
        }
        self.state.last_step = Some(Step::Completed);
        true
    }

    fn failed(&mut self, resource: &ResourceRef, _action: &str, error: &dyn fmt::Display) -> bool {
        let Some(tracked) = self.current_for("failed", resource) else {
            return false;
        };

        log::debug!("Received :failed on {tracked}");
        tracked.status = Status::Failed;
        tracked.error_source = Some(resource.to_text());
        tracked.error_output = Some(error.to_string());
        self.state.last_step = Some(Step::Failed);
        true
    }

    fn failed_retriable(
        &mut self,
        resource: &ResourceRef,
        _action: &str,
        remaining_retries: u32,
        error: &dyn fmt::Display,
    ) -> bool {
        let Some(tracked) = self.current_for("failed_retriable", resource) else {
            return false;
        };

        log::debug!("Received :failed_retriable on {tracked} ({remaining_retries} retries left)");
        // Only the most recent error is kept
        tracked.retries += 1;
        tracked.error_source = Some(resource.to_text());
        tracked.error_output = Some(error.to_string());
        self.state.last_step = Some(Step::Failed);
        true
    }

    fn run_started(&mut self) {
        log::debug!("Received :run_started, changed run phase to 'converge'");
        self.state.phase = Phase::Converge;

        if self.run.name.is_none() {
            self.run.name = Some(
                [
                    self.run.started_at.as_str(),
                    self.node.role.as_str(),
                    self.node.address.as_str(),
                    self.run.id.as_str(),
                ]
                .join(" "),
            );
        }
    }

    fn run_completed(&mut self) {
        log::debug!("Received :run_completed");
        self.run.success = Some(true);
        self.run.completed_at = Some(timestamp());
        self.finalize_abandoned();
        self.send_report();
    }

    fn run_failed(&mut self, error: &dyn fmt::Display) {
        log::debug!("Received :run_failed ({error}), changed run phase to 'post-converge'");
        self.run.success = Some(false);
        self.run.completed_at = Some(timestamp());
        self.state.phase = Phase::PostConverge;

        self.finalize_abandoned();
        self.backfill();
        self.send_report();
    }
}

/// Local time in the report's timestamp format
fn timestamp() -> String {
    chrono::Local::now().format("%F %T").to_string()
}

/// Short random id for the run
fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect()
}
