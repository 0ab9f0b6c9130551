//! Error types for Naada.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Be serializable for sending to a frontend
//! - Include actionable information (which node, what to fix)
//! - Stay node-scoped: one node's failure never aborts processing for others

use crate::core::types::PortType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a node ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for an edge in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random edge ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Top-level error type for Naada.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum NaadaError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to graph structure and operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("Property '{property}' not found on node {node_id}")]
    PropertyNotFound { node_id: NodeId, property: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Clipboard is empty")]
    ClipboardEmpty,

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// Errors raised while validating a requested connection.
///
/// Validation runs before any mutation: a rejected connection leaves the
/// model untouched.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Port '{port}' not found on node {node_id}")]
    PortNotFound { node_id: NodeId, port: String },

    #[error("Cannot connect {from_type} output to {to_type} input")]
    IncompatiblePorts { from_type: PortType, to_type: PortType },

    #[error("Edge already exists between these ports")]
    DuplicateEdge,

    #[error("{0}")]
    Other(String),
}

/// Errors from backend instantiation and wiring.
///
/// A creation failure leaves the node attached without a backend instance;
/// the synchronizer retries on the next relevant model change.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum BackendError {
    #[error("Failed to create backend instance for node {node_id} ({type_id}): {reason}")]
    CreationFailed {
        node_id: NodeId,
        type_id: String,
        reason: String,
    },

    #[error("No backend instance exists for node {0}")]
    NoInstance(NodeId),

    #[error("Backend rejected wiring from {from} to {to}: {reason}")]
    WiringFailed {
        from: NodeId,
        to: NodeId,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Errors at an external-resource boundary (device, clipboard, decode).
///
/// Resource errors are captured as values returned to the caller; they are
/// never thrown across the synchronous command boundary. The affected node
/// is left in a well-defined "not loaded" state.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ResourceError {
    #[error("Failed to decode audio data: {0}")]
    DecodeFailed(String),

    #[error("Failed to acquire input device: {0}")]
    DeviceUnavailable(String),

    #[error("Clipboard access failed: {0}")]
    ClipboardFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl ValidationError {
    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ValidationError::IncompatiblePorts { from_type, to_type } => Some(format!(
                "A {} output cannot drive a {} input; route it through a control-rate node instead",
                from_type, to_type
            )),
            ValidationError::PortNotFound { port, .. } => {
                Some(format!("Check the spelling of port '{}'", port))
            }
            _ => None,
        }
    }

    /// Get the node IDs involved in this error, if any.
    pub fn affected_nodes(&self) -> Vec<NodeId> {
        match self {
            ValidationError::PortNotFound { node_id, .. } => vec![*node_id],
            _ => vec![],
        }
    }
}

impl BackendError {
    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            BackendError::CreationFailed { node_id, .. } | BackendError::NoInstance(node_id) => {
                Some(*node_id)
            }
            BackendError::WiringFailed { from, .. } => Some(*from),
            BackendError::Other(_) => None,
        }
    }
}

/// Result type alias for Naada operations.
pub type NaadaResult<T> = Result<T, NaadaError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
