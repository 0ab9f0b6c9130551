//! Core types for the Naada patch engine.
//!
//! This module contains the foundational types shared by every subsystem:
//! - Value and port types
//! - Port and property definitions
//! - Error types and id newtypes

pub mod error;
pub mod port;
pub mod types;

// Re-export commonly used types
pub use error::{
    BackendError, EdgeId, GraphError, NaadaError, NodeId, ResourceError, ValidationError,
};
pub use port::{PortDefinition, PropertyDefinition};
pub use types::{PortType, Value};
