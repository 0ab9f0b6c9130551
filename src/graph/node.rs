//! Node instances in the patch graph.

use crate::core::error::NodeId;
use crate::core::types::Value;
use crate::registry::{NodeDomain, NodeTypeMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Position of a node in the UI (metadata only, not behaviorally relevant).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node instance in the patch graph.
///
/// Carries a copy of its type's schema captured at creation time, so the
/// node keeps validating and restoring defaults correctly even if the
/// registry entry changes later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchNode {
    /// Unique identifier
    pub id: NodeId,
    /// Type tag resolved against the registry at creation time
    pub type_id: String,
    /// Position in the UI
    pub position: Position,
    /// Current property values
    pub properties: HashMap<String, Value>,
    /// Schema snapshot from the registry
    pub schema: NodeTypeMetadata,
}

impl PatchNode {
    /// Create a new node from registry metadata, with default properties.
    pub fn new(metadata: &NodeTypeMetadata) -> Self {
        Self {
            id: NodeId::new(),
            type_id: metadata.id.clone(),
            position: Position::default(),
            properties: metadata.default_properties(),
            schema: metadata.clone(),
        }
    }

    /// Create with a specific ID (used when replaying patches and snapshots).
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the position.
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    /// Set a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Which engine executes this node.
    pub fn domain(&self) -> NodeDomain {
        self.schema.domain
    }

    /// Get a property value, falling back to the schema default.
    pub fn property(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.properties.get(name) {
            return Some(value.clone());
        }
        self.schema
            .get_property(name)
            .map(|p| p.default_value.clone())
    }

    /// Set a property value, clamped to the schema's declared range.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let value = match self.schema.get_property(&name) {
            Some(def) => def.clamp(value),
            None => value,
        };
        self.properties.insert(name, value);
    }

    /// The declared default for a property, if the schema defines one.
    pub fn property_default(&self, name: &str) -> Option<Value> {
        self.schema
            .get_property(name)
            .map(|p| p.default_value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeTypeRegistry;

    #[test]
    fn test_node_captures_defaults() {
        let registry = NodeTypeRegistry::with_builtins();
        let node = PatchNode::new(registry.metadata("oscillator").unwrap());

        assert_eq!(node.type_id, "oscillator");
        assert_eq!(node.property("frequency"), Some(Value::Float(440.0)));
        assert_eq!(node.property("waveform"), Some(Value::Text("sine".into())));
    }

    #[test]
    fn test_set_property_clamps_to_schema() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut node = PatchNode::new(registry.metadata("gain").unwrap());

        node.set_property("level", Value::Float(99.0));
        assert_eq!(node.property("level"), Some(Value::Float(4.0)));
    }

    #[test]
    fn test_schema_is_a_snapshot() {
        let registry = NodeTypeRegistry::with_builtins();
        let node = PatchNode::new(registry.metadata("gain").unwrap());

        // Even if the registry were rebuilt, the node's copy answers.
        drop(registry);
        assert_eq!(node.property_default("level"), Some(Value::Float(1.0)));
    }
}
