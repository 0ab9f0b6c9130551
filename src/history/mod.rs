//! Patch-based undo/redo.
//!
//! Every structural mutation is recorded as a [`GraphPatch`] describing
//! the forward change with enough detail to invert it. Patches are
//! batched into one [`HistoryEntry`] per user command, so compound
//! commands (remove-node-with-edges, paste) undo as a unit. Replay goes
//! through the same mutation paths as user edits with recording
//! suppressed; the synchronizer reconciles afterwards, never the history.
//!
//! Excluded from history by construction: running flags, selection,
//! bridge state, and any other volatile runtime data.

use crate::core::error::NodeId;
use crate::core::types::Value;
use crate::graph::connection::LogicalConnection;
use crate::graph::node::{PatchNode, Position};
use log::trace;

/// Maximum retained undo entries; oldest fall off first.
const HISTORY_LIMIT: usize = 200;

/// One invertible structural change.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPatch {
    /// A node was added (captured post-add, with its properties).
    AddNode(PatchNode),
    /// A node was removed along with its incident connections.
    RemoveNode {
        node: PatchNode,
        connections: Vec<LogicalConnection>,
    },
    /// A connection was added.
    AddConnection(LogicalConnection),
    /// A connection was removed.
    RemoveConnection(LogicalConnection),
    /// A property changed value.
    SetProperty {
        node: NodeId,
        name: String,
        before: Value,
        after: Value,
    },
    /// A node moved.
    MoveNode {
        node: NodeId,
        before: Position,
        after: Position,
    },
}

impl GraphPatch {
    /// The patch that exactly reverses this one.
    pub fn inverted(&self) -> GraphPatch {
        match self {
            GraphPatch::AddNode(node) => GraphPatch::RemoveNode {
                node: node.clone(),
                connections: Vec::new(),
            },
            // Cascaded connections are reinstated separately; see
            // HistoryEntry::inverse_patches.
            GraphPatch::RemoveNode { node, .. } => GraphPatch::AddNode(node.clone()),
            GraphPatch::AddConnection(connection) => {
                GraphPatch::RemoveConnection(connection.clone())
            }
            GraphPatch::RemoveConnection(connection) => {
                GraphPatch::AddConnection(connection.clone())
            }
            GraphPatch::SetProperty {
                node,
                name,
                before,
                after,
            } => GraphPatch::SetProperty {
                node: *node,
                name: name.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            GraphPatch::MoveNode {
                node,
                before,
                after,
            } => GraphPatch::MoveNode {
                node: *node,
                before: *after,
                after: *before,
            },
        }
    }
}

/// One user command's worth of patches, applied and reverted atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Human-readable command label ("add oscillator", "paste 3 nodes").
    pub label: String,
    /// Forward patches in execution order.
    pub patches: Vec<GraphPatch>,
}

impl HistoryEntry {
    /// The patch sequence that undoes this entry: inverted, in reverse
    /// order. `RemoveNode` inversions are expanded so cascaded
    /// connections come back after their node.
    pub fn inverse_patches(&self) -> Vec<GraphPatch> {
        let mut inverse = Vec::new();
        for patch in self.patches.iter().rev() {
            inverse.push(patch.inverted());
            if let GraphPatch::RemoveNode { connections, .. } = patch {
                for connection in connections {
                    inverse.push(GraphPatch::AddConnection(connection.clone()));
                }
            }
        }
        inverse
    }
}

/// The undo/redo stacks plus in-progress batching.
#[derive(Debug, Default)]
pub struct UndoHistory {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    batch: Option<HistoryEntry>,
    batch_depth: usize,
    suppressed: bool,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start batching patches under a command label.
    ///
    /// Begins nest: a command built from smaller recorded commands still
    /// commits as one entry, labeled by the outermost begin.
    pub fn begin(&mut self, label: impl Into<String>) {
        if self.suppressed {
            return;
        }
        if self.batch.is_none() {
            self.batch = Some(HistoryEntry {
                label: label.into(),
                patches: Vec::new(),
            });
        }
        self.batch_depth += 1;
    }

    /// Record a forward patch into the open batch.
    ///
    /// With no open batch the patch becomes its own entry. Recording is
    /// a no-op while suppressed (i.e. during undo/redo replay).
    pub fn record(&mut self, patch: GraphPatch) {
        if self.suppressed {
            return;
        }
        match &mut self.batch {
            Some(entry) => entry.patches.push(patch),
            None => {
                self.push_entry(HistoryEntry {
                    label: "edit".to_string(),
                    patches: vec![patch],
                });
            }
        }
    }

    /// Close one level of batching; the outermost close pushes the entry.
    /// Empty batches are discarded.
    pub fn commit(&mut self) {
        if self.suppressed {
            return;
        }
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth > 0 {
            return;
        }
        if let Some(entry) = self.batch.take() {
            if !entry.patches.is_empty() {
                self.push_entry(entry);
            }
        }
    }

    /// Discard the open batch without recording it.
    pub fn abort(&mut self) {
        self.batch = None;
        self.batch_depth = 0;
    }

    /// Pop the most recent entry for undoing. The caller applies
    /// [`HistoryEntry::inverse_patches`] with suppression on.
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo_stack.pop()?;
        trace!("undo '{}' ({} patches)", entry.label, entry.patches.len());
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    /// Pop the most recent undone entry for redoing (forward patches).
    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo_stack.pop()?;
        trace!("redo '{}' ({} patches)", entry.label, entry.patches.len());
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Suppress recording while replaying history.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Number of undoable entries.
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty() && self.redo_stack.is_empty()
    }

    /// Drop everything, including an open batch.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch = None;
        self.batch_depth = 0;
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > HISTORY_LIMIT {
            self.undo_stack.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::connection::{ConnectionKind, Edge, Endpoint};
    use crate::registry::NodeTypeRegistry;

    fn sample_node() -> PatchNode {
        let registry = NodeTypeRegistry::with_builtins();
        PatchNode::new(registry.metadata("gain").unwrap())
    }

    fn sample_connection(from: NodeId, to: NodeId) -> LogicalConnection {
        LogicalConnection {
            edge: Edge::new(
                Endpoint::new(from, "out"),
                Endpoint::new(to, "in"),
            ),
            kind: ConnectionKind::SignalWire,
        }
    }

    #[test]
    fn test_set_property_inverts() {
        let patch = GraphPatch::SetProperty {
            node: NodeId::new(),
            name: "level".to_string(),
            before: Value::Float(1.0),
            after: Value::Float(0.5),
        };
        let GraphPatch::SetProperty { before, after, .. } = patch.inverted() else {
            panic!("inversion changed patch kind");
        };
        assert_eq!(before, Value::Float(0.5));
        assert_eq!(after, Value::Float(1.0));
    }

    #[test]
    fn test_remove_node_inverse_restores_connections() {
        let node = sample_node();
        let other = NodeId::new();
        let connection = sample_connection(other, node.id);
        let entry = HistoryEntry {
            label: "remove gain".to_string(),
            patches: vec![GraphPatch::RemoveNode {
                node: node.clone(),
                connections: vec![connection.clone()],
            }],
        };

        let inverse = entry.inverse_patches();
        assert_eq!(inverse[0], GraphPatch::AddNode(node));
        assert_eq!(inverse[1], GraphPatch::AddConnection(connection));
    }

    #[test]
    fn test_batch_commits_as_one_entry() {
        let mut history = UndoHistory::new();
        history.begin("paste");
        history.record(GraphPatch::AddNode(sample_node()));
        history.record(GraphPatch::AddNode(sample_node()));
        history.commit();

        assert_eq!(history.len(), 1);
        let entry = history.pop_undo().unwrap();
        assert_eq!(entry.patches.len(), 2);
        assert!(history.can_redo());
    }

    #[test]
    fn test_suppressed_recording_is_dropped() {
        let mut history = UndoHistory::new();
        history.set_suppressed(true);
        history.record(GraphPatch::AddNode(sample_node()));
        history.set_suppressed(false);

        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_entry_clears_redo() {
        let mut history = UndoHistory::new();
        history.record(GraphPatch::AddNode(sample_node()));
        history.pop_undo().unwrap();
        assert!(history.can_redo());

        history.record(GraphPatch::AddNode(sample_node()));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_batch_discarded() {
        let mut history = UndoHistory::new();
        history.begin("noop");
        history.commit();
        assert!(!history.can_undo());
    }
}
