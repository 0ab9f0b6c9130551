//! # Naada - Node-based Audio Patching
//!
//! Naada is a node-based audio patching engine. It maintains a persisted
//! patch graph (nodes, typed ports, connections) and keeps an opaque
//! native audio backend synchronized with it in real time: adding a node
//! creates a backend instance, connecting ports wires instances or spins
//! up value bridges, and removing things tears the runtime half down in
//! the right order.
//!
//! ## Features
//!
//! - **Two node domains**: native nodes executed by the backend, computed
//!   nodes fully modeled in the engine
//! - **Typed connections**: signal, control, and trigger ports validated
//!   before any mutation
//! - **Live synchronization**: backend instances, wires, and bridges
//!   follow the model; single-shot sources are transparently rebuilt
//! - **Undo/redo**: patch-based history with compound commands undone
//!   atomically
//! - **Persistence**: versioned JSON snapshots with migration from the
//!   legacy format
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use naada::prelude::*;
//!
//! let mut session = PatchSession::new(
//!     NodeTypeRegistry::with_builtins(),
//!     Box::new(InMemoryBackendFactory::new()),
//! );
//!
//! // Build a small patch: oscillator -> gain -> destination.
//! let osc = session.add_node("oscillator")?;
//! let gain = session.add_node("gain")?;
//! let dest = session.add_node("destination")?;
//! session.add_edge(osc, "out", gain, "in")?;
//! session.add_edge(gain, "out", dest, "in")?;
//!
//! // Modulate the gain level from a step sequencer.
//! let seq = session.add_node("sequencer")?;
//! session.set_property(seq, "steps", Value::List(vec![
//!     Value::Float(0.2), Value::Float(0.8),
//! ]))?;
//! session.add_edge(seq, "value", gain, "level")?;
//!
//! // Advance cooperative time; the sequencer steps drive the backend.
//! session.tick(0.25);
//!
//! // Save and restore.
//! let snapshot = session.save_snapshot()?;
//! session.load_snapshot(&snapshot)?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: value/port types and error handling
//! - [`registry`]: the node type catalog with schemas and builtins
//! - [`graph`]: the persisted model, connection classification, snapshots
//! - [`runtime`]: backend boundary, lifecycle synchronizer, bridges,
//!   external resources
//! - [`computed`]: the computed node engine and builtin behaviors
//! - [`history`]: patch-based undo/redo
//! - [`session`]: the command surface tying everything together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod computed;
pub mod core;
pub mod graph;
pub mod history;
pub mod registry;
pub mod runtime;
pub mod session;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use naada::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{PortType, Value};

    // Errors and ids
    pub use crate::core::error::{
        BackendError, EdgeId, GraphError, NaadaError, NaadaResult, NodeId, ResourceError,
        ValidationError,
    };

    // Port and property schemas
    pub use crate::core::port::{PortDefinition, PropertyDefinition};

    // Registry
    pub use crate::registry::{Category, NodeDomain, NodeTypeMetadata, NodeTypeRegistry};

    // Graph model
    pub use crate::graph::connection::{ConnectionKind, Edge, Endpoint, LogicalConnection};
    pub use crate::graph::model::PatchGraph;
    pub use crate::graph::node::{PatchNode, Position};
    pub use crate::graph::serialization::{
        SerializedConnection, SerializedNode, SerializedPatch,
    };

    // Runtime
    pub use crate::runtime::{
        AudioBuffer, BackendFactory, BackendHandle, Bridge, BridgeEffect, BridgeManager,
        Clipboard, InMemoryBackendFactory, LifecycleSynchronizer, LoadState, MemoryClipboard,
        PendingKind,
    };

    // Computed engine
    pub use crate::computed::{ComputedBehavior, ComputedEngine, Delta};

    // History
    pub use crate::history::{GraphPatch, HistoryEntry, UndoHistory};

    // Session
    pub use crate::session::{PatchSession, RuntimeStatus};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
