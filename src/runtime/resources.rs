//! External resource boundaries: clipboard, audio decode, devices.
//!
//! Everything in this module crosses out of the engine's single-threaded
//! world. The clipboard is a trait so the demo binary and tests can run
//! against an in-memory one. Decode and device acquisition are modeled as
//! pending operations: the session enqueues them, something outside the
//! engine performs the work, and the result re-enters through the
//! session's `complete_*` methods, which liveness-check the node first.

use crate::core::error::{NodeId, ResourceError};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// Clipboard
// ============================================================================

/// Copy/paste payload transport.
///
/// Payloads are opaque JSON produced by the session. A real implementation
/// may talk to the OS clipboard; either side may fail.
pub trait Clipboard {
    /// Store a payload, replacing any previous one.
    fn put(&mut self, payload: String) -> Result<(), ResourceError>;

    /// Fetch the current payload, if any.
    fn get(&self) -> Result<Option<String>, ResourceError>;
}

/// Process-local clipboard used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    payload: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn put(&mut self, payload: String) -> Result<(), ResourceError> {
        self.payload = Some(payload);
        Ok(())
    }

    fn get(&self) -> Result<Option<String>, ResourceError> {
        Ok(self.payload.clone())
    }
}

// ============================================================================
// Audio decode
// ============================================================================

/// A decoded sample, as much of it as the engine needs to know.
///
/// Actual PCM lives behind the backend boundary; the engine tracks shape
/// and duration so computed playback nodes can report position.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
}

impl AudioBuffer {
    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file's header into an [`AudioBuffer`].
///
/// This is the synchronous half of the decode boundary, invoked by
/// whatever drives the pending-operation queue. The reference decode
/// reads only enough to size the buffer; an empty or unreadable file is
/// a decode failure, not an engine failure.
pub fn decode_file(path: &str) -> Result<AudioBuffer, ResourceError> {
    let metadata = match fs::metadata(Path::new(path)) {
        Ok(m) => m,
        Err(_) => return Err(ResourceError::FileNotFound(path.to_string())),
    };
    if metadata.len() == 0 {
        return Err(ResourceError::DecodeFailed(format!("{}: empty file", path)));
    }
    // Header parsing belongs to the backend; size the buffer from the
    // byte count assuming 16-bit stereo at the default rate.
    let sample_rate = 44_100;
    let channels = 2;
    let frames = metadata.len() / (2 * channels as u64);
    Ok(AudioBuffer {
        path: path.to_string(),
        sample_rate,
        channels,
        frames,
    })
}

// ============================================================================
// Pending operations
// ============================================================================

/// Per-node load state, surfaced through runtime status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No resource requested or resource absent.
    #[default]
    NotLoaded,
    /// A decode or acquisition is in flight.
    Loading,
    /// The resource is available.
    Loaded,
    /// The last attempt failed; stays until re-requested.
    Failed,
}

/// What an in-flight operation will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingKind {
    /// Decoding a file for a playback node.
    Decode { path: String },
    /// Acquiring a capture device stream.
    DeviceAcquisition,
}

/// One outstanding async boundary crossing, tagged with its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub node_id: NodeId,
    pub kind: PendingKind,
}

/// Book-keeping for everything currently in flight.
///
/// Removal of a node does NOT cancel its entries; completion is
/// liveness-guarded at the session instead, so a late result for a gone
/// node simply drains here and goes nowhere.
#[derive(Debug, Default)]
pub struct PendingOperations {
    ops: Vec<PendingOperation>,
    load_states: HashMap<NodeId, LoadState>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an operation and mark the node loading.
    pub fn enqueue(&mut self, node_id: NodeId, kind: PendingKind) {
        debug!("pending {:?} enqueued for node {}", kind, node_id);
        self.load_states.insert(node_id, LoadState::Loading);
        self.ops.push(PendingOperation { node_id, kind });
    }

    /// Take the oldest in-flight operation for a node, if any.
    pub fn take(&mut self, node_id: NodeId) -> Option<PendingOperation> {
        let pos = self.ops.iter().position(|op| op.node_id == node_id)?;
        Some(self.ops.remove(pos))
    }

    /// Whether the node has anything in flight.
    pub fn is_pending(&self, node_id: NodeId) -> bool {
        self.ops.iter().any(|op| op.node_id == node_id)
    }

    /// Record the outcome of a completed operation.
    pub fn resolve(&mut self, node_id: NodeId, loaded: bool) {
        let state = if loaded {
            LoadState::Loaded
        } else {
            LoadState::Failed
        };
        self.load_states.insert(node_id, state);
    }

    /// The node's load state.
    pub fn load_state(&self, node_id: NodeId) -> LoadState {
        self.load_states
            .get(&node_id)
            .copied()
            .unwrap_or_default()
    }

    /// Drop status for a removed node. In-flight entries stay; their
    /// completion will fail the liveness check.
    pub fn forget(&mut self, node_id: NodeId) {
        self.load_states.remove(&node_id);
    }

    /// All outstanding operations, oldest first.
    pub fn pending(&self) -> &[PendingOperation] {
        &self.ops
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.load_states.clear();
    }
}
