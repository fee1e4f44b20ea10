//! Classification of incoming start events
//!
//! The engine never says whether a resource runs inside another one. A
//! start that arrives right after the in-progress resource loaded its
//! current state can only come from that resource's own convergence, so it
//! is nested. Everything else either starts a new top-level record or is a
//! misrouted event.
//!
//! Known ambiguity: if a top-level resource loads its state and then never
//! completes, the next top-level start is classified as nested.

use crate::record::TrackedResource;
use crate::resource::ResourceRef;

/// Last lifecycle step applied to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Started,
    StateLoaded,
    Outcome,
    Failed,
    Completed,
}

/// How an incoming start event relates to the record in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Nothing in progress: a new record at the current stack depth
    Fresh,
    /// Started from inside the in-progress record's convergence
    Nested,
    /// The in-progress resource started again; its record is replaced
    Restart,
    /// Unrelated to the in-progress record; ignored
    Misrouted,
}

/// Classify a start event for `resource`
pub fn classify_start(
    in_progress: Option<&TrackedResource>,
    last_step: Option<Step>,
    resource: &ResourceRef,
) -> StartKind {
    match in_progress {
        None => StartKind::Fresh,
        Some(_) if last_step == Some(Step::StateLoaded) => StartKind::Nested,
        Some(current) if current.tracks(resource) => StartKind::Restart,
        Some(_) => StartKind::Misrouted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str, name: &str) -> TrackedResource {
        TrackedResource::new(&ResourceRef::new(kind, name), "run")
    }

    #[test]
    fn test_nothing_in_progress_is_fresh() {
        let r = ResourceRef::new("execute", "a");
        assert_eq!(classify_start(None, None, &r), StartKind::Fresh);
        assert_eq!(
            classify_start(None, Some(Step::StateLoaded), &r),
            StartKind::Fresh
        );
    }

    #[test]
    fn test_start_after_state_loaded_is_nested() {
        let parent = record("custom", "parent");
        let child = ResourceRef::new("execute", "child");
        assert_eq!(
            classify_start(Some(&parent), Some(Step::StateLoaded), &child),
            StartKind::Nested
        );
    }

    #[test]
    fn test_same_handle_after_state_loaded_is_still_nested() {
        // A resource re-invoking itself from its own action
        let parent = record("custom", "parent");
        let again = ResourceRef::new("custom", "parent");
        assert_eq!(
            classify_start(Some(&parent), Some(Step::StateLoaded), &again),
            StartKind::Nested
        );
    }

    #[test]
    fn test_other_resource_without_state_loaded_is_misrouted() {
        let parent = record("execute", "a");
        let other = ResourceRef::new("execute", "b");
        for step in [Step::Started, Step::Outcome, Step::Failed] {
            assert_eq!(
                classify_start(Some(&parent), Some(step), &other),
                StartKind::Misrouted
            );
        }
    }

    #[test]
    fn test_same_resource_without_state_loaded_restarts() {
        let current = record("service", "nginx");
        let again = ResourceRef::new("service", "nginx");
        assert_eq!(
            classify_start(Some(&current), Some(Step::Started), &again),
            StartKind::Restart
        );
    }

    #[test]
    fn test_abandoned_top_level_after_state_loaded_looks_nested() {
        // The documented ambiguity: A loaded state and never completed
        let abandoned = record("package", "a");
        let next = ResourceRef::new("package", "b");
        assert_eq!(
            classify_start(Some(&abandoned), Some(Step::StateLoaded), &next),
            StartKind::Nested
        );
    }
}
