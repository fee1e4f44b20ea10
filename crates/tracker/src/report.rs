//! Report payload handed to sinks

use crate::record::TrackedResource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Run metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunData {
    pub id: String,
    pub name: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub success: Option<bool>,
}

impl RunData {
    /// Flat fields merged into every exported resource
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("run_id".into(), Value::from(self.id.clone()));
        map.insert("run_name".into(), Value::from(self.name.clone()));
        map.insert("run_started_at".into(), Value::from(self.started_at.clone()));
        map.insert("run_completed_at".into(), Value::from(self.completed_at.clone()));
        map.insert("run_success".into(), Value::from(self.success));
        map
    }
}

/// Node metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub address: String,
    pub instance_id: String,
    pub role: String,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            address: "<no ip>".to_string(),
            instance_id: "<unknown>".to_string(),
            role: "<no role>".to_string(),
        }
    }
}

impl NodeData {
    /// Flat fields merged into every exported resource
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("node_address".into(), Value::from(self.address.clone()));
        map.insert("node_instance_id".into(), Value::from(self.instance_id.clone()));
        map.insert("node_role".into(), Value::from(self.role.clone()));
        map
    }
}

/// A finished report
///
/// Resources are in completion order: nested executions come before the
/// resource that contains them. Sort by `execution_order` for start order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Report {
    pub run: RunData,
    pub node: NodeData,
    pub resources: Vec<TrackedResource>,
}

impl Report {
    /// Resources sorted by the order in which they started
    pub fn by_execution_order(&self) -> Vec<&TrackedResource> {
        let mut sorted: Vec<_> = self.resources.iter().collect();
        sorted.sort_by_key(|r| r.execution_order);
        sorted
    }

    /// One flat object per resource, with node and run fields merged in
    pub fn flattened(&self) -> Vec<Map<String, Value>> {
        self.resources
            .iter()
            .map(|tracked| merged(tracked, &self.node, &self.run))
            .collect()
    }
}

/// Flat export of one record with node and run fields merged in
pub fn merged(tracked: &TrackedResource, node: &NodeData, run: &RunData) -> Map<String, Value> {
    let mut map = tracked.to_map();
    map.extend(node.to_map());
    map.extend(run.to_map());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRef;

    #[test]
    fn test_flattened_merges_node_and_run() {
        let mut tracked = TrackedResource::new(&ResourceRef::new("execute", "true"), "run");
        tracked.execution_order = 1;

        let report = Report {
            run: RunData {
                id: "596e9d00".into(),
                started_at: "2026-10-19 10:00:00".into(),
                success: Some(true),
                ..Default::default()
            },
            node: NodeData::default(),
            resources: vec![tracked],
        };

        let flat = report.flattened();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0]["resource"], "execute[true]#run");
        assert_eq!(flat[0]["node_role"], "<no role>");
        assert_eq!(flat[0]["run_id"], "596e9d00");
        assert_eq!(flat[0]["run_success"], true);
        assert_eq!(flat[0]["run_name"], Value::Null);
    }

    #[test]
    fn test_by_execution_order() {
        let mut inner = TrackedResource::new(&ResourceRef::new("execute", "inner"), "run");
        inner.execution_order = 2;
        let mut outer = TrackedResource::new(&ResourceRef::new("custom", "outer"), "run");
        outer.execution_order = 1;

        let report = Report {
            resources: vec![inner, outer],
            ..Default::default()
        };
        let names: Vec<_> = report.by_execution_order().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
    }
}
