//! Port and property definitions for node schemas.
//!
//! Ports define the connection surface of a node; properties define its
//! configurable parameters. Both live in the type metadata held by the
//! registry, and a copy of that schema is captured on every node at
//! creation time so later registry edits cannot change live nodes.

use crate::core::types::{PortType, Value};
use serde::{Deserialize, Serialize};

/// Definition of a node port (input or output).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortDefinition {
    /// Unique name within the node (used in code)
    pub name: String,
    /// Type of data this port accepts/produces
    pub port_type: PortType,
    /// Description for documentation and tooltips
    pub description: String,
}

impl PortDefinition {
    /// Create a new port definition.
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            description: String::new(),
        }
    }

    /// Shorthand for a continuous-signal port.
    pub fn signal(name: impl Into<String>) -> Self {
        Self::new(name, PortType::Signal)
    }

    /// Shorthand for a control-value port.
    pub fn control(name: impl Into<String>) -> Self {
        Self::new(name, PortType::Control)
    }

    /// Shorthand for a trigger port.
    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(name, PortType::Trigger)
    }

    /// Attach a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Definition of a node property (configuration parameter).
///
/// Properties differ from inputs: they are set through the command surface
/// rather than connected to other nodes. A control connection into a native
/// node targets the continuous parameter that backs one of these
/// definitions; on disconnect the parameter is restored to `default_value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyDefinition {
    /// Unique name within the node
    pub name: String,
    /// Default value (required; used for creation and disconnect restore)
    pub default_value: Value,
    /// Lower bound for numeric properties
    pub min: Option<f64>,
    /// Upper bound for numeric properties
    pub max: Option<f64>,
    /// Description for documentation
    pub description: String,
}

impl PropertyDefinition {
    /// Create a new property definition.
    pub fn new(name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
            min: None,
            max: None,
            description: String::new(),
        }
    }

    /// Set the numeric range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Attach a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Clamp a numeric value into this property's declared range.
    ///
    /// Non-numeric values and unbounded properties pass through unchanged.
    pub fn clamp(&self, value: Value) -> Value {
        match value.as_f64() {
            Some(v) => {
                let mut clamped = v;
                if let Some(min) = self.min {
                    clamped = clamped.max(min);
                }
                if let Some(max) = self.max {
                    clamped = clamped.min(max);
                }
                if clamped != v {
                    Value::Float(clamped)
                } else {
                    value
                }
            }
            None => value,
        }
    }
}
