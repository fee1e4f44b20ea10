//! Lightweight handle to a resource owned by the converging engine
//!
//! The engine passes a handle with every lifecycle event. Handles carry
//! identity, provenance, notification metadata, timing and the declared
//! attributes; they never execute anything.

use crate::types::{Attributes, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of notifications attached to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationCounts {
    #[serde(default)]
    pub before: usize,
    #[serde(default)]
    pub immediate: usize,
    #[serde(default)]
    pub delayed: usize,
}

/// A resource as seen by the event handler
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Kind tag, e.g. "package", "service", "template"
    pub kind: String,
    /// Declared name
    pub name: String,
    /// Engine-assigned identity; joined names for multi-target resources
    #[serde(default)]
    pub identity: Option<String>,
    /// Declared actions, in order
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub cookbook: Option<String>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub source_line: Option<String>,
    #[serde(default)]
    pub notifications: NotificationCounts,
    /// Declared (wanted) attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Time spent converging, as reported at completion
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Engine-rendered content diff (file kinds only)
    #[serde(default)]
    pub diff: Option<String>,
}

impl ResourceRef {
    /// Create a handle with a kind and a name
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the declared actions
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Set a declared attribute
    pub fn with_attribute(mut self, name: &str, value: serde_json::Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Set the engine-assigned identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Label used to refer to the resource, e.g. "package[curl]"
    pub fn label(&self) -> String {
        format!("{}[{}]", self.kind, self.name)
    }

    /// Textual form used as an error source, e.g. "package 'curl'"
    pub fn to_text(&self) -> String {
        format!("{} '{}'", self.kind, self.name)
    }

    /// Identity, falling back to the name
    pub fn identity(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.name)
    }

    /// Resolved resource kind
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::from_tag(&self.kind)
    }

    /// Whether two handles refer to the same engine resource
    pub fn same_resource(&self, other: &ResourceRef) -> bool {
        self.kind == other.kind && self.name == other.name
    }

    /// Pick the tracked attributes of this resource's kind out of a snapshot
    pub fn select_attributes(&self, snapshot: &Attributes) -> Attributes {
        self.resource_kind()
            .tracked_attributes()
            .iter()
            .map(|attr| {
                let value = snapshot.get(*attr).cloned().unwrap_or_default();
                ((*attr).to_string(), value)
            })
            .collect()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_and_text() {
        let r = ResourceRef::new("package", "curl");
        assert_eq!(r.label(), "package[curl]");
        assert_eq!(r.to_text(), "package 'curl'");
        assert_eq!(r.identity(), "curl");
    }

    #[test]
    fn test_same_resource_ignores_timing() {
        let a = ResourceRef::new("service", "nginx");
        let mut b = a.clone();
        b.elapsed_ms = 250;
        assert!(a.same_resource(&b));
        assert!(!a.same_resource(&ResourceRef::new("package", "nginx")));
    }

    #[test]
    fn test_select_attributes_fills_missing() {
        let r = ResourceRef::new("service", "nginx");
        let mut snapshot = Attributes::new();
        snapshot.insert("running".into(), json!(true));
        snapshot.insert("pattern".into(), json!("nginx"));

        let selected = r.select_attributes(&snapshot);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected["running"], json!(true));
        assert_eq!(selected["enabled"], serde_json::Value::Null);
    }

    #[test]
    fn test_deserialize_minimal() {
        let r: ResourceRef =
            serde_json::from_str(r#"{"kind": "user", "name": "deploy"}"#).unwrap();
        assert_eq!(r.kind, "user");
        assert!(r.actions.is_empty());
        assert_eq!(r.notifications, NotificationCounts::default());
    }
}
