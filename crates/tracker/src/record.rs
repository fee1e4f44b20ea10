//! Tracked execution record - one per (resource, action) execution

use crate::resource::ResourceRef;
use crate::types::{Attributes, NotificationType, Phase, ResourceKind, Status};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Provenance placeholder for resources defined at converge time
pub const DYNAMIC_SOURCE: &str = "<Dynamically Defined Resource>";

/// Everything the report says about one resource execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedResource {
    // Identity
    #[serde(rename = "type")]
    pub kind_tag: String,
    pub name: String,
    pub action: String,
    pub identity: String,
    pub cookbook: String,
    pub recipe: String,
    pub source_line: String,

    // Timing
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_ms: Option<u64>,

    // Outcome
    pub status: Status,
    pub guard_description: Option<String>,
    pub retries: u32,
    pub error_source: Option<String>,
    pub error_output: Option<String>,

    // Ordering
    pub execution_order: u64,
    pub execution_phase: Phase,
    pub nest_level: u32,

    // Notifications
    pub notifying_resource: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub before_notifications: usize,
    pub immediate_notifications: usize,
    pub delayed_notifications: usize,

    // Diff inputs and output
    pub loaded_attributes: Attributes,
    pub wanted_attributes: Attributes,
    pub attributes_loaded: bool,
    pub diff: Option<String>,

    #[serde(skip)]
    kind: ResourceKind,
    #[serde(skip)]
    handle: Option<ResourceRef>,
}

impl TrackedResource {
    /// Create a record for one action of an engine resource
    pub fn new(resource: &ResourceRef, action: &str) -> Self {
        let provenance = |value: &Option<String>| {
            value.clone().unwrap_or_else(|| DYNAMIC_SOURCE.to_string())
        };

        Self {
            kind_tag: resource.kind.clone(),
            name: resource.name.clone(),
            action: action.to_string(),
            identity: resource.identity().to_string(),
            cookbook: provenance(&resource.cookbook),
            recipe: provenance(&resource.recipe),
            source_line: provenance(&resource.source_line),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            status: Status::Unprocessed,
            guard_description: None,
            retries: 0,
            error_source: None,
            error_output: None,
            execution_order: 0,
            execution_phase: Phase::Compile,
            nest_level: 0,
            notifying_resource: None,
            notification_type: None,
            before_notifications: resource.notifications.before,
            immediate_notifications: resource.notifications.immediate,
            delayed_notifications: resource.notifications.delayed,
            loaded_attributes: Attributes::new(),
            wanted_attributes: Attributes::new(),
            attributes_loaded: false,
            diff: None,
            kind: resource.resource_kind(),
            handle: Some(resource.clone()),
        }
    }

    /// Short label, e.g. "package[curl]#install"
    pub fn label(&self) -> String {
        format!("{}[{}]#{}", self.kind_tag, self.name, self.action)
    }

    /// Kind resolved when the record was created, used to pick the diff
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Engine handle this record was created from
    pub fn handle(&self) -> Option<&ResourceRef> {
        self.handle.as_ref()
    }

    /// Whether this record belongs to the given engine resource
    pub fn tracks(&self, resource: &ResourceRef) -> bool {
        match &self.handle {
            Some(handle) => handle.same_resource(resource),
            None => self.kind_tag == resource.kind && self.name == resource.name,
        }
    }

    /// Whether a notification triggered this execution
    pub fn is_notified(&self) -> bool {
        self.notifying_resource.is_some() || self.notification_type.is_some()
    }

    /// Flat export of every field, used by report sinks
    pub fn to_map(&self) -> Map<String, Value> {
        let value = json!({
            "resource": self.label(),
            "resource_name": self.name,
            "resource_type": self.kind_tag,
            "resource_identity": self.identity,
            "resource_cookbook": self.cookbook,
            "resource_recipe": self.recipe,
            "resource_source_line": self.source_line,
            "resource_action": self.action,
            "resource_guard": self.guard_description,
            "resource_duration_ms": self.duration_ms.unwrap_or(0),
            "resource_error_output": self.error_output,
            "resource_error_source": self.error_source,
            "resource_retries": self.retries,
            "resource_notified_by": self.notifying_resource,
            "resource_notified_via": self.notification_type,
            "resource_before_notifications": self.before_notifications,
            "resource_immediate_notifications": self.immediate_notifications,
            "resource_delayed_notifications": self.delayed_notifications,
            "resource_order": self.execution_order,
            "resource_execution_phase": self.execution_phase,
            "resource_nest_level": self.nest_level,
            "resource_started_at": self.started_at,
            "resource_completed_at": self.completed_at,
            "resource_status": self.status,
            "resource_attributes_loaded": self.attributes_loaded,
            "resource_loaded_attributes": self.loaded_attributes,
            "resource_wanted_attributes": self.wanted_attributes,
            "resource_diff": self.diff,
        });

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]#{}", self.kind_tag, self.name, self.action)
    }
}
