//! Patch serialization for saving and loading.
//!
//! The snapshot holds the persisted graph model (nodes, edges, logical
//! connections) plus the computed engine's per-node persisted state. It
//! never contains volatile references: backend instances, bridges, and
//! runtime subscriptions are rebuilt by the synchronizer after load.
//!
//! Snapshots are versioned. Version 1 predates typed logical connections
//! and used different field names ("params", "links"); [`SerializedPatch::from_json`]
//! migrates those onto the current schema before loading.

use crate::core::error::{GraphError, NodeId};
use crate::core::types::Value;
use crate::graph::connection::ConnectionKind;
use crate::graph::node::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Serializable representation of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Node ID
    pub id: NodeId,
    /// Type id (resolved against the registry at load time)
    pub type_id: String,
    /// Position in the UI
    pub position: Position,
    /// Property values
    pub properties: HashMap<String, Value>,
}

/// Serializable representation of a logical connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedConnection {
    /// Source node ID
    pub from_node: NodeId,
    /// Source port name
    pub from_port: String,
    /// Target node ID
    pub to_node: NodeId,
    /// Target port name
    pub to_port: String,
    /// Classification captured when the edge was created. Optional because
    /// v1 snapshots predate classification; the loader re-derives it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConnectionKind>,
}

/// Persisted computed-engine state for one node.
///
/// Only the property and output maps survive; timer handles, decoded
/// buffers, and subscriptions are ephemeral and rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedComputedState {
    /// Property map at save time
    pub properties: HashMap<String, Value>,
    /// Output map at save time
    pub outputs: HashMap<String, Value>,
}

/// Serializable representation of a complete patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedPatch {
    /// Snapshot format version
    pub schema_version: u32,
    /// All nodes
    pub nodes: Vec<SerializedNode>,
    /// All logical connections
    pub connections: Vec<SerializedConnection>,
    /// Computed per-node persisted state, keyed by node id
    #[serde(default)]
    pub computed: HashMap<Uuid, SerializedComputedState>,
}

impl SerializedPatch {
    /// Current format version.
    pub const VERSION: u32 = 2;

    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            schema_version: Self::VERSION,
            nodes: Vec::new(),
            connections: Vec::new(),
            computed: HashMap::new(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON, migrating older snapshot shapes first.
    pub fn from_json(json: &str) -> Result<Self, crate::core::error::NaadaError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;

        let version = raw
            .get("schema_version")
            .or_else(|| raw.get("version"))
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32;

        match version {
            1 => Ok(migrate_v1(&raw)?),
            Self::VERSION => Ok(serde_json::from_value(raw)?),
            other => Err(GraphError::UnsupportedVersion(other).into()),
        }
    }
}

impl Default for SerializedPatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a version-1 snapshot onto the current schema.
///
/// v1 shape: `{"version": 1, "nodes": [{"id", "type", "x", "y", "params"}],
/// "links": [{"source", "sourceOutput", "target", "targetInput"}]}`.
fn migrate_v1(raw: &serde_json::Value) -> Result<SerializedPatch, serde_json::Error> {
    #[derive(Deserialize)]
    struct V1Node {
        id: Uuid,
        #[serde(rename = "type")]
        type_id: String,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        params: HashMap<String, Value>,
    }

    #[derive(Deserialize)]
    struct V1Link {
        source: Uuid,
        #[serde(rename = "sourceOutput", default = "default_out")]
        source_output: String,
        target: Uuid,
        #[serde(rename = "targetInput", default = "default_in")]
        target_input: String,
    }

    fn default_out() -> String {
        "out".to_string()
    }
    fn default_in() -> String {
        "in".to_string()
    }

    #[derive(Deserialize)]
    struct V1Patch {
        #[serde(default)]
        nodes: Vec<V1Node>,
        #[serde(default)]
        links: Vec<V1Link>,
    }

    let v1: V1Patch = serde_json::from_value(raw.clone())?;

    let nodes = v1
        .nodes
        .into_iter()
        .map(|n| SerializedNode {
            id: NodeId::from_uuid(n.id),
            type_id: n.type_id,
            position: Position::new(n.x, n.y),
            properties: n.params,
        })
        .collect();

    let connections = v1
        .links
        .into_iter()
        .map(|l| SerializedConnection {
            from_node: NodeId::from_uuid(l.source),
            from_port: l.source_output,
            to_node: NodeId::from_uuid(l.target),
            to_port: l.target_input,
            // v1 predates classification; the loader derives it.
            kind: None,
        })
        .collect();

    Ok(SerializedPatch {
        schema_version: SerializedPatch::VERSION,
        nodes,
        connections,
        computed: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut patch = SerializedPatch::new();
        let id = NodeId::new();
        patch.nodes.push(SerializedNode {
            id,
            type_id: "oscillator".to_string(),
            position: Position::new(10.0, 20.0),
            properties: HashMap::from([("frequency".to_string(), Value::Float(220.0))]),
        });

        let json = patch.to_json().unwrap();
        let back = SerializedPatch::from_json(&json).unwrap();
        assert_eq!(back.schema_version, SerializedPatch::VERSION);
        assert_eq!(back.nodes.len(), 1);
        assert_eq!(back.nodes[0].id, id);
        assert_eq!(
            back.nodes[0].properties.get("frequency"),
            Some(&Value::Float(220.0))
        );
    }

    #[test]
    fn test_v1_migration() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let json = format!(
            r#"{{
                "version": 1,
                "nodes": [
                    {{"id": "{a}", "type": "oscillator", "x": 5.0, "y": 6.0,
                      "params": {{"frequency": {{"type": "float", "data": 110.0}}}}}},
                    {{"id": "{b}", "type": "gain"}}
                ],
                "links": [
                    {{"source": "{a}", "target": "{b}", "targetInput": "in"}}
                ]
            }}"#
        );

        let patch = SerializedPatch::from_json(&json).unwrap();
        assert_eq!(patch.schema_version, SerializedPatch::VERSION);
        assert_eq!(patch.nodes.len(), 2);
        assert_eq!(patch.nodes[0].type_id, "oscillator");
        assert_eq!(patch.nodes[0].position, Position::new(5.0, 6.0));
        assert_eq!(
            patch.nodes[0].properties.get("frequency"),
            Some(&Value::Float(110.0))
        );
        assert_eq!(patch.connections.len(), 1);
        assert_eq!(patch.connections[0].from_port, "out");
        assert_eq!(patch.connections[0].to_port, "in");
        assert!(patch.connections[0].kind.is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let json = r#"{"schema_version": 99, "nodes": [], "connections": []}"#;
        assert!(SerializedPatch::from_json(json).is_err());
    }
}
