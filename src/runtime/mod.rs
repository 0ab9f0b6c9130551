//! Runtime module: everything volatile.
//!
//! The persisted model lives in `graph`; this module owns what exists only
//! while the engine runs — backend instances, bridges, and in-flight
//! resource operations — and the synchronizer that keeps them honest.

pub mod backend;
pub mod bridge;
pub mod resources;
pub mod sync;

// Re-export commonly used types
pub use backend::{BackendFactory, BackendHandle, FactoryCall, InMemoryBackendFactory};
pub use bridge::{Bridge, BridgeEffect, BridgeKey, BridgeKind, BridgeManager};
pub use resources::{AudioBuffer, Clipboard, LoadState, MemoryClipboard, PendingKind};
pub use sync::LifecycleSynchronizer;
