//! Node type registry.
//!
//! The registry is the static catalog of node types: for each type id it
//! holds the port schema, property definitions, and the flags the runtime
//! needs (domain, single-shot, stoppable). It is a read-only lookup service
//! constructed once at startup and passed into the session explicitly;
//! there is no ambient global state.

pub mod builtin;

use crate::core::port::{PortDefinition, PropertyDefinition};
use crate::core::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which family executes a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDomain {
    /// Opaque processing unit executed by the external backend
    Native,
    /// Fully modeled unit executed by the computed node engine
    Computed,
}

/// Category for organizing node types in a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Signal generators (oscillator, noise, sample player)
    Source,
    /// Signal processors (gain, filter, delay)
    Effect,
    /// Control-rate logic (scale, compare, route)
    Logic,
    /// Terminal nodes (destination, display)
    Sink,
    /// Input devices
    Input,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Source => "Source",
            Category::Effect => "Effect",
            Category::Logic => "Logic",
            Category::Sink => "Sink",
            Category::Input => "Input",
        }
    }
}

/// Metadata describing a node type.
///
/// A copy of this schema is captured on each node at creation time, so a
/// live patch keeps working even if the registry changes underneath it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeTypeMetadata {
    /// Unique identifier for this type (e.g. "oscillator")
    pub id: String,
    /// Human-readable name (e.g. "Oscillator")
    pub name: String,
    /// Category for palette organization
    pub category: Category,
    /// Which engine executes nodes of this type
    pub domain: NodeDomain,
    /// Detailed description
    pub description: String,

    /// Input port definitions
    pub inputs: Vec<PortDefinition>,
    /// Output port definitions
    pub outputs: Vec<PortDefinition>,
    /// Property definitions
    pub properties: Vec<PropertyDefinition>,

    /// Native sources that can be started only once; property changes and
    /// trigger edges rebuild the backend instance instead of updating it.
    pub single_shot: bool,
    /// Whether the backend instance has a stop operation.
    pub stoppable: bool,
    /// Sources of this kind modulate a target parameter around its current
    /// base value instead of replacing it with zero (e.g. an LFO wobbling
    /// a frequency).
    pub baseline_modulator: bool,
    /// Whether instances need an asynchronously acquired device stream.
    pub needs_device: bool,
}

impl NodeTypeMetadata {
    /// Create a new metadata builder.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> NodeTypeMetadataBuilder {
        NodeTypeMetadataBuilder::new(id, name)
    }

    /// Find an input port by name.
    pub fn get_input(&self, name: &str) -> Option<&PortDefinition> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Find an output port by name.
    pub fn get_output(&self, name: &str) -> Option<&PortDefinition> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Find a property by name.
    pub fn get_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Build the default property map for a new node of this type.
    pub fn default_properties(&self) -> HashMap<String, Value> {
        self.properties
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }
}

/// Builder for NodeTypeMetadata.
pub struct NodeTypeMetadataBuilder {
    id: String,
    name: String,
    category: Category,
    domain: NodeDomain,
    description: String,
    inputs: Vec<PortDefinition>,
    outputs: Vec<PortDefinition>,
    properties: Vec<PropertyDefinition>,
    single_shot: bool,
    stoppable: bool,
    baseline_modulator: bool,
    needs_device: bool,
}

impl NodeTypeMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: Category::Effect,
            domain: NodeDomain::Native,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Vec::new(),
            single_shot: false,
            stoppable: false,
            baseline_modulator: false,
            needs_device: false,
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the execution domain.
    pub fn domain(mut self, domain: NodeDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an input port.
    pub fn input(mut self, port: PortDefinition) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port.
    pub fn output(mut self, port: PortDefinition) -> Self {
        self.outputs.push(port);
        self
    }

    /// Add a property.
    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Mark as a single-shot source.
    pub fn single_shot(mut self) -> Self {
        self.single_shot = true;
        self
    }

    /// Mark as stoppable.
    pub fn stoppable(mut self) -> Self {
        self.stoppable = true;
        self
    }

    /// Mark as modulating around the target's baseline.
    pub fn baseline_modulator(mut self) -> Self {
        self.baseline_modulator = true;
        self
    }

    /// Mark as requiring an asynchronously acquired device stream.
    pub fn needs_device(mut self) -> Self {
        self.needs_device = true;
        self
    }

    /// Build the metadata.
    pub fn build(self) -> NodeTypeMetadata {
        NodeTypeMetadata {
            id: self.id,
            name: self.name,
            category: self.category,
            domain: self.domain,
            description: self.description,
            inputs: self.inputs,
            outputs: self.outputs,
            properties: self.properties,
            single_shot: self.single_shot,
            stoppable: self.stoppable,
            baseline_modulator: self.baseline_modulator,
            needs_device: self.needs_device,
        }
    }
}

/// Registry of all available node types.
///
/// Uses IndexMap so palette iteration order matches registration order.
pub struct NodeTypeRegistry {
    types: IndexMap<String, NodeTypeMetadata>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with the builtin catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a node type.
    pub fn register(&mut self, metadata: NodeTypeMetadata) {
        self.types.insert(metadata.id.clone(), metadata);
    }

    /// Get metadata for a type id.
    pub fn metadata(&self, id: &str) -> Option<&NodeTypeMetadata> {
        self.types.get(id)
    }

    /// Check if a type is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered type ids.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|s| s.as_str())
    }

    /// Get all registered types.
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeMetadata> {
        self.types.values()
    }

    /// Get types grouped by category for palette display.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&NodeTypeMetadata>> {
        let mut grouped: IndexMap<Category, Vec<&NodeTypeMetadata>> = IndexMap::new();
        for metadata in self.types.values() {
            grouped.entry(metadata.category).or_default().push(metadata);
        }
        for types in grouped.values_mut() {
            types.sort_by(|a, b| a.name.cmp(&b.name));
        }
        grouped
    }

    /// Get the total number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PortType;

    #[test]
    fn test_metadata_builder() {
        let metadata = NodeTypeMetadata::builder("test_gain", "Test Gain")
            .category(Category::Effect)
            .description("A test effect")
            .input(PortDefinition::signal("in"))
            .input(PortDefinition::control("level"))
            .output(PortDefinition::signal("out"))
            .property(PropertyDefinition::new("level", 1.0).with_range(0.0, 4.0))
            .build();

        assert_eq!(metadata.id, "test_gain");
        assert_eq!(metadata.domain, NodeDomain::Native);
        assert_eq!(metadata.get_input("level").unwrap().port_type, PortType::Control);
        assert!(metadata.get_output("out").is_some());
        assert!(!metadata.single_shot);
    }

    #[test]
    fn test_default_properties() {
        let metadata = NodeTypeMetadata::builder("t", "T")
            .property(PropertyDefinition::new("frequency", 440.0))
            .property(PropertyDefinition::new("waveform", "sine"))
            .build();

        let defaults = metadata.default_properties();
        assert_eq!(defaults.get("frequency"), Some(&Value::Float(440.0)));
        assert_eq!(defaults.get("waveform"), Some(&Value::Text("sine".into())));
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = NodeTypeRegistry::new();
        registry.register(NodeTypeMetadata::builder("custom", "Custom").build());

        assert!(registry.contains("custom"));
        assert_eq!(registry.metadata("custom").unwrap().name, "Custom");
        assert!(registry.metadata("missing").is_none());
    }

    #[test]
    fn test_builtin_catalog() {
        let registry = NodeTypeRegistry::with_builtins();

        assert!(registry.contains("oscillator"));
        assert!(registry.contains("gain"));
        assert!(registry.contains("destination"));
        assert!(registry.contains("scale"));
        assert!(registry.contains("sample-player"));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_category_grouping() {
        let registry = NodeTypeRegistry::with_builtins();
        let grouped = registry.grouped_by_category();

        let sources = grouped.get(&Category::Source).unwrap();
        assert!(sources.iter().any(|m| m.id == "oscillator"));
    }
}
