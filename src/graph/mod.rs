//! Graph module: the persisted patch model.
//!
//! Nodes, edges, and logical connections live here. The model is a plain
//! data store with validated mutation; backend lifecycles, bridges, and
//! history all react to it from the runtime layer.

pub mod connection;
pub mod model;
pub mod node;
pub mod serialization;
pub mod topology;

// Re-export commonly used types
pub use connection::{ConnectionKind, Edge, Endpoint, LogicalConnection};
pub use model::PatchGraph;
pub use node::{PatchNode, Position};
pub use topology::TopologyInspector;
