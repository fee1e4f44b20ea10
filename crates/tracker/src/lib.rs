//! # Tracker
//!
//! Reconstructs an ordered execution report from the lifecycle events of a
//! two-phase convergence run.
//!
//! The converging engine never hands out a report of its own. It only fires
//! callbacks while it works. A [`Tracker`] listens to those callbacks and
//! rebuilds one [`TrackedResource`] per (resource, action) execution, with
//! ordering, nesting, timing, notifications, outcome and a human readable
//! diff. When the run ends the report is handed to every registered
//! [`ReportSink`].
//!
//! ## Core Concepts
//!
//! - **ResourceRef**: The engine's handle to a resource, passed with every event
//! - **TrackedResource**: One execution record in the report
//! - **Tracker**: The event handler state machine
//! - **Dispatcher**: Fans the finished report out to sinks
//!
//! ## Example
//!
//! ```ignore
//! use tracker::{ConvergeEvents, Dispatcher, NodeData, ResourceRef, Tracker, TrackerOptions};
//!
//! let mut tracker = Tracker::register(NodeData::default(), TrackerOptions::default())
//!     .with_dispatcher(Dispatcher::with_sinks(vec![Box::new(MySink)]));
//!
//! let curl = ResourceRef::new("package", "curl").with_actions(["install"]);
//! tracker.declare(curl.clone());
//!
//! tracker.run_started();
//! tracker.start(&curl, "install", None, None);
//! tracker.updated(&curl, "install");
//! tracker.completed(&curl);
//! tracker.run_completed();
//! ```
//!
//! ## Failed Runs
//!
//! When a run fails, everything the engine never reached is backfilled
//! into the report as `unprocessed` in the `post-converge` phase, so the
//! report always covers the whole declared collection.

pub mod diff;
pub mod error;
pub mod handler;
pub mod nesting;
pub mod output;
pub mod record;
pub mod report;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use handler::{ConvergeEvents, HandlerState, Tracker, TrackerOptions};
pub use output::{Dispatcher, ReportSink};
pub use record::{DYNAMIC_SOURCE, TrackedResource};
pub use report::{NodeData, Report, RunData, merged};
pub use resource::{NotificationCounts, ResourceRef};
pub use types::{Attributes, NotificationType, Phase, ResourceKind, Status};
