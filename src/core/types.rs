//! Core value and port types that flow through the patch graph.
//!
//! The type system uses an enum-based approach for several reasons:
//! - Closed set of types: patch values are a finite set of shapes
//! - Zero-cost pattern matching: the compiler optimizes to jump tables
//! - Serialization: serde handles enums natively
//! - Type safety: exhaustive matching catches missing cases at compile time

use serde::{Deserialize, Serialize};
use std::fmt;

/// Values carried by node properties, computed outputs, and bridge streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// 64-bit floating point number
    Float(f64),
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// UTF-8 string (waveform names, file paths, labels)
    Text(String),
    /// Homogeneous list of values (sequencer steps, routing tables)
    List(Vec<Value>),
    /// Represents absence of value (unloaded sample, silent output)
    None,
}

impl Value {
    /// Interpret this value as a float where possible.
    ///
    /// Bridges carry scalars, so most of the engine funnels through here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Interpret this value as an integer where possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Interpret this value as a boolean where possible.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Get the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list content, if this is a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this value reads as a rising trigger edge (> 0).
    pub fn is_rising(&self) -> bool {
        self.as_f64().map(|v| v > 0.0).unwrap_or(false)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::None => write!(f, "none"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Port types for checking connections between nodes.
///
/// Every port is either a continuous audio-rate signal, a control-rate
/// value, or an edge-sensitive trigger. Triggers behave like control values
/// for compatibility purposes but carry no continuous stream: their rising
/// edge dispatches a discrete action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Continuous audio-rate signal
    Signal,
    /// Control-rate scalar value
    Control,
    /// Edge-sensitive pseudo-control
    Trigger,
}

impl PortType {
    /// Check whether an output of this type may drive an input of `other`.
    ///
    /// Signals may feed signals or modulate control inputs. Control values
    /// may feed control or trigger inputs, but never a signal input: there
    /// is no implicit upsampling from control rate to audio rate.
    pub fn compatible_with(&self, other: &PortType) -> bool {
        match (self, other) {
            (PortType::Signal, PortType::Signal) => true,
            (PortType::Signal, PortType::Control) => true,
            (PortType::Control, PortType::Control) => true,
            (PortType::Control, PortType::Trigger) => true,
            (PortType::Trigger, PortType::Trigger) => true,
            (PortType::Trigger, PortType::Control) => true,
            (_, PortType::Signal) => false,
            (PortType::Signal, PortType::Trigger) => false,
        }
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> &'static str {
        match self {
            PortType::Signal => "Signal",
            PortType::Control => "Control",
            PortType::Trigger => "Trigger",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Boolean(true).as_f64(), Some(1.0));
        assert_eq!(Value::Text("x".into()).as_f64(), None);
        assert_eq!(Value::None.as_f64(), None);
    }

    #[test]
    fn test_rising_edge() {
        assert!(Value::Float(0.5).is_rising());
        assert!(Value::Integer(1).is_rising());
        assert!(!Value::Float(0.0).is_rising());
        assert!(!Value::None.is_rising());
    }

    #[test]
    fn test_port_compatibility() {
        assert!(PortType::Signal.compatible_with(&PortType::Signal));
        assert!(PortType::Signal.compatible_with(&PortType::Control));
        assert!(PortType::Control.compatible_with(&PortType::Control));
        assert!(!PortType::Control.compatible_with(&PortType::Signal));
        assert!(!PortType::Trigger.compatible_with(&PortType::Signal));
        assert!(PortType::Control.compatible_with(&PortType::Trigger));
    }

    #[test]
    fn test_value_serde_roundtrip() {
        let value = Value::List(vec![Value::Float(1.0), Value::Integer(2)]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    proptest! {
        #[test]
        fn prop_signal_inputs_only_accept_signals(from in prop_oneof![
            Just(PortType::Signal),
            Just(PortType::Control),
            Just(PortType::Trigger),
        ]) {
            // The one forbidden direction: nothing but a signal drives a signal.
            prop_assert_eq!(
                from.compatible_with(&PortType::Signal),
                from == PortType::Signal
            );
        }

        #[test]
        fn prop_numeric_values_roundtrip_f64(v in -1.0e6f64..1.0e6) {
            let value = Value::Float(v);
            prop_assert_eq!(value.as_f64(), Some(v));
        }
    }
}
