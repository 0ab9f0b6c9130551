//! The patch session: command surface and propagation pipeline.
//!
//! `PatchSession` owns everything — the model, the synchronizer, the
//! computed engine, bridges, history, clipboard, and pending resource
//! operations — and is the single entry point for edits. Every command
//! runs on one thread and completes its full cascade before returning:
//! validate, mutate the model, record history, then reconcile the
//! runtime. Failures are node-scoped; a backend that refuses to create
//! an instance leaves its node attached and is retried on the next
//! model change.
//!
//! Value propagation between computed nodes and across bridges uses an
//! explicit work queue rather than recursion, bounded by
//! [`MAX_PROPAGATION_DEPTH`] so feedback wiring cannot wedge a command.

use crate::computed::{Applied, BehaviorRequest, ComputedEngine};
use crate::core::error::{
    EdgeId, GraphError, NaadaError, NaadaResult, NodeId, ResourceError,
};
use crate::core::types::Value;
use crate::graph::connection::{ConnectionKind, LogicalConnection};
use crate::graph::model::PatchGraph;
use crate::graph::node::{PatchNode, Position};
use crate::graph::serialization::{
    SerializedComputedState, SerializedConnection, SerializedNode, SerializedPatch,
};
use crate::graph::topology::TopologyInspector;
use crate::history::{GraphPatch, UndoHistory};
use crate::registry::{NodeDomain, NodeTypeRegistry};
use crate::runtime::backend::{BackendFactory, BackendHandle};
use crate::runtime::bridge::{BridgeEffect, BridgeKind, BridgeManager};
use crate::runtime::resources::{
    AudioBuffer, Clipboard, LoadState, MemoryClipboard, PendingKind, PendingOperation,
    PendingOperations,
};
use crate::runtime::sync::LifecycleSynchronizer;
use log::{debug, warn};
use std::collections::{HashMap, HashSet, VecDeque};

/// Upper bound on deliveries processed per cascade. Feedback wiring is
/// legal in the model; when a cycle keeps a cascade alive past this
/// bound, the remaining deliveries are logged and dropped.
pub const MAX_PROPAGATION_DEPTH: usize = 64;

/// Offset applied to pasted node positions.
const PASTE_OFFSET: f64 = 24.0;

/// Per-node runtime status, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStatus {
    /// Whether a backend instance (native) exists for this node.
    pub backend_present: bool,
    /// Whether the node is producing output.
    pub running: bool,
    /// Resource load state (decode, device acquisition).
    pub load_state: LoadState,
}

/// One queued value delivery: (source node, output port, value).
type Delivery = (NodeId, String, Value);

/// The live editing session.
pub struct PatchSession {
    registry: NodeTypeRegistry,
    graph: PatchGraph,
    sync: LifecycleSynchronizer,
    computed: ComputedEngine,
    bridges: BridgeManager,
    history: UndoHistory,
    clipboard: Box<dyn Clipboard>,
    pending: PendingOperations,
    /// Continuous bridges awaiting their one deferred re-push.
    repush_queue: Vec<(NodeId, NodeId, String)>,
}

impl PatchSession {
    /// Create a session over a registry and a backend factory, with an
    /// in-memory clipboard.
    pub fn new(registry: NodeTypeRegistry, factory: Box<dyn BackendFactory>) -> Self {
        Self::with_clipboard(registry, factory, Box::new(MemoryClipboard::new()))
    }

    /// Create a session with an explicit clipboard implementation.
    pub fn with_clipboard(
        registry: NodeTypeRegistry,
        factory: Box<dyn BackendFactory>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self {
            registry,
            graph: PatchGraph::new(),
            sync: LifecycleSynchronizer::new(factory),
            computed: ComputedEngine::with_builtins(),
            bridges: BridgeManager::new(),
            history: UndoHistory::new(),
            clipboard,
            pending: PendingOperations::new(),
            repush_queue: Vec::new(),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Add a node of the given type at the origin.
    pub fn add_node(&mut self, type_id: &str) -> NaadaResult<NodeId> {
        self.add_node_at(type_id, 0.0, 0.0)
    }

    /// Add a node of the given type at a position.
    pub fn add_node_at(&mut self, type_id: &str, x: f64, y: f64) -> NaadaResult<NodeId> {
        let metadata = self
            .registry
            .metadata(type_id)
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_string()))?;
        let node = PatchNode::new(metadata).with_position(x, y);
        let id = node.id;

        self.history.begin(format!("add {}", type_id));
        self.history.record(GraphPatch::AddNode(node.clone()));
        self.graph.add_node(node.clone());
        self.attach_node(&node);
        self.history.commit();
        self.reconcile();
        Ok(id)
    }

    /// Remove a node, cascading to its edges. Runtime teardown runs
    /// before the node leaves the model.
    pub fn remove_node(&mut self, node_id: NodeId) -> NaadaResult<()> {
        self.graph.node(node_id)?;
        self.history.begin("remove node");
        let Some((node, connections)) = self.detach_and_remove(node_id) else {
            self.history.abort();
            return Err(GraphError::NodeNotFound(node_id).into());
        };
        self.history
            .record(GraphPatch::RemoveNode { node, connections });
        self.history.commit();
        self.reconcile();
        Ok(())
    }

    /// Connect an output port to an input port.
    ///
    /// Validation happens before mutation; a rejected edge leaves the
    /// session untouched.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> NaadaResult<EdgeId> {
        let connection = self.graph.connect(from, from_port, to, to_port)?;
        let edge_id = connection.edge.id;
        if TopologyInspector::new(&self.graph).is_reachable(to, from) {
            warn!("edge {} -> {} closes a feedback loop", from, to);
        }
        self.history.begin("connect");
        self.history
            .record(GraphPatch::AddConnection(connection.clone()));
        self.history.commit();
        self.establish_connection(&connection);
        self.reconcile();
        Ok(edge_id)
    }

    /// Remove an edge, reversing its runtime wiring.
    pub fn remove_edge(&mut self, edge_id: EdgeId) -> NaadaResult<()> {
        let connection = self.graph.disconnect(edge_id)?;
        self.history.begin("disconnect");
        self.history
            .record(GraphPatch::RemoveConnection(connection.clone()));
        self.history.commit();
        self.teardown_connection(&connection);
        self.reconcile();
        Ok(())
    }

    /// Set a property, clamped to the schema range, and apply it to the
    /// runtime. Single-shot native instances that cannot absorb the
    /// change are rebuilt with their wiring replayed.
    pub fn set_property(
        &mut self,
        node_id: NodeId,
        name: &str,
        value: Value,
    ) -> NaadaResult<()> {
        let node = self.graph.node(node_id)?;
        if node.schema.get_property(name).is_none() {
            return Err(GraphError::PropertyNotFound {
                node_id,
                property: name.to_string(),
            }
            .into());
        }
        let before = node.property(name).unwrap_or(Value::None);

        let target = self.graph.node_mut(node_id)?;
        target.set_property(name, value);
        let after = target.property(name).unwrap_or(Value::None);

        self.history.begin(format!("set {}", name));
        self.history.record(GraphPatch::SetProperty {
            node: node_id,
            name: name.to_string(),
            before,
            after: after.clone(),
        });
        self.history.commit();

        self.apply_property_runtime(node_id, name, &after);
        self.reconcile();
        Ok(())
    }

    /// Move a node. Position is UI metadata; no runtime work follows.
    pub fn set_position(&mut self, node_id: NodeId, x: f64, y: f64) -> NaadaResult<()> {
        let node = self.graph.node_mut(node_id)?;
        let before = node.position;
        node.position = Position::new(x, y);
        self.history.begin("move node");
        self.history.record(GraphPatch::MoveNode {
            node: node_id,
            before,
            after: Position::new(x, y),
        });
        self.history.commit();
        Ok(())
    }

    /// Undo the most recent command.
    pub fn undo(&mut self) -> NaadaResult<()> {
        let entry = self.history.pop_undo().ok_or(GraphError::NothingToUndo)?;
        self.history.set_suppressed(true);
        for patch in entry.inverse_patches() {
            self.apply_patch(patch);
        }
        self.history.set_suppressed(false);
        self.reconcile();
        Ok(())
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self) -> NaadaResult<()> {
        let entry = self.history.pop_redo().ok_or(GraphError::NothingToRedo)?;
        self.history.set_suppressed(true);
        for patch in entry.patches.clone() {
            self.apply_patch(patch);
        }
        self.history.set_suppressed(false);
        self.reconcile();
        Ok(())
    }

    /// Copy a selection (nodes plus the edges fully inside it) to the
    /// clipboard as a snapshot fragment.
    pub fn copy_selection(&mut self, selection: &[NodeId]) -> NaadaResult<()> {
        let fragment = self.serialize_selection(selection);
        if fragment.nodes.is_empty() {
            return Err(NaadaError::Other("nothing to copy".to_string()));
        }
        let json = fragment.to_json()?;
        self.clipboard.put(json)?;
        Ok(())
    }

    /// Copy a selection, then remove it as one undoable command.
    pub fn cut_selection(&mut self, selection: &[NodeId]) -> NaadaResult<()> {
        self.copy_selection(selection)?;
        self.history.begin("cut");
        for &node_id in selection {
            if self.graph.has_node(node_id) {
                let _ = self.remove_node(node_id);
            }
        }
        self.history.commit();
        Ok(())
    }

    /// Paste the clipboard fragment with fresh node ids, offset slightly.
    pub fn paste(&mut self) -> NaadaResult<Vec<NodeId>> {
        let payload = self.clipboard.get()?.ok_or(GraphError::ClipboardEmpty)?;
        let fragment = SerializedPatch::from_json(&payload)?;

        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut pasted = Vec::new();
        self.history.begin("paste");

        for snode in &fragment.nodes {
            let Some(metadata) = self.registry.metadata(&snode.type_id) else {
                warn!("clipboard node of unknown type '{}', skipped", snode.type_id);
                continue;
            };
            let mut node = PatchNode::new(metadata);
            node.position = Position::new(
                snode.position.x + PASTE_OFFSET,
                snode.position.y + PASTE_OFFSET,
            );
            for (name, value) in &snode.properties {
                node.set_property(name.clone(), value.clone());
            }
            mapping.insert(snode.id, node.id);
            pasted.push(node.id);
            self.history.record(GraphPatch::AddNode(node.clone()));
            self.graph.add_node(node.clone());
            self.attach_node(&node);
        }

        // Restore copied computed outputs before wiring, mirroring
        // snapshot load, so re-established connections push the copied
        // values rather than freshly initialized ones.
        for (uuid, state) in &fragment.computed {
            let Some(&new_id) = mapping.get(&NodeId::from_uuid(*uuid)) else {
                continue;
            };
            self.computed
                .restore_state(new_id, state.properties.clone(), state.outputs.clone());
        }

        for sconn in &fragment.connections {
            let (Some(&from), Some(&to)) = (
                mapping.get(&sconn.from_node),
                mapping.get(&sconn.to_node),
            ) else {
                continue;
            };
            match self.graph.connect(from, &sconn.from_port, to, &sconn.to_port) {
                Ok(connection) => {
                    self.history
                        .record(GraphPatch::AddConnection(connection.clone()));
                    self.establish_connection(&connection);
                }
                Err(error) => warn!("pasted connection rejected: {}", error),
            }
        }

        self.history.commit();
        self.reconcile();
        Ok(pasted)
    }

    /// Tear everything down: model, instances, bridges, computed state,
    /// pending operations, and history, atomically.
    pub fn clear_all(&mut self) {
        let stoppable: HashSet<NodeId> = self
            .graph
            .nodes()
            .filter(|n| n.schema.stoppable)
            .map(|n| n.id)
            .collect();
        self.sync.clear(|id| stoppable.contains(&id));
        self.computed.clear();
        self.bridges.clear();
        self.pending.clear();
        self.repush_queue.clear();
        self.graph.clear();
        self.history.clear();
    }

    /// Advance cooperative time: drain deferred bridge re-pushes, then
    /// give every periodic computed behavior its slice.
    pub fn tick(&mut self, elapsed: f64) {
        let repush = std::mem::take(&mut self.repush_queue);
        let mut queue = VecDeque::new();
        for (source, target, port) in repush {
            if let Some(effect) = self.bridges.repush(source, target, &port) {
                self.dispatch_effect(effect, &mut queue);
            }
        }
        for (node_id, applied) in self.computed.tick(elapsed) {
            self.enqueue_applied(node_id, applied, &mut queue);
        }
        self.run_queue(queue);
    }

    // ========================================================================
    // Async completions
    // ========================================================================

    /// Complete an in-flight decode. If the node was removed while the
    /// decode ran, the result is dropped.
    pub fn complete_decode(
        &mut self,
        node_id: NodeId,
        result: Result<AudioBuffer, ResourceError>,
    ) {
        let _ = self.pending.take(node_id);
        if !self.graph.has_node(node_id) {
            debug!("decode completion for removed node {}, dropped", node_id);
            return;
        }
        match result {
            Ok(buffer) => {
                self.pending.resolve(node_id, true);
                let applied = self.computed.decode_complete(node_id, Ok(&buffer));
                self.process_applied(node_id, applied);
            }
            Err(error) => {
                warn!("decode failed for node {}: {}", node_id, error);
                self.pending.resolve(node_id, false);
                let message = error.to_string();
                let applied = self.computed.decode_complete(node_id, Err(&message));
                self.process_applied(node_id, applied);
            }
        }
    }

    /// Complete an in-flight device acquisition.
    pub fn complete_device_acquisition(
        &mut self,
        node_id: NodeId,
        result: Result<(), ResourceError>,
    ) {
        let _ = self.pending.take(node_id);
        if !self.graph.has_node(node_id) {
            debug!("device acquisition for removed node {}, dropped", node_id);
            return;
        }
        match result {
            Ok(()) => self.pending.resolve(node_id, true),
            Err(error) => {
                warn!("device acquisition failed for node {}: {}", node_id, error);
                self.pending.resolve(node_id, false);
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Serialize the whole patch, including computed per-node state.
    pub fn save_snapshot(&self) -> NaadaResult<String> {
        let mut patch = SerializedPatch::new();
        for node in self.graph.nodes() {
            patch.nodes.push(SerializedNode {
                id: node.id,
                type_id: node.type_id.clone(),
                position: node.position,
                properties: node.properties.clone(),
            });
            if node.domain() == NodeDomain::Computed {
                if let Some(state) = self.computed.state(node.id) {
                    patch.computed.insert(
                        node.id.0,
                        SerializedComputedState {
                            properties: state.properties.clone(),
                            outputs: state.outputs.clone(),
                        },
                    );
                }
            }
        }
        for connection in self.graph.connections() {
            patch.connections.push(SerializedConnection {
                from_node: connection.edge.from.node_id,
                from_port: connection.edge.from.port.clone(),
                to_node: connection.edge.to.node_id,
                to_port: connection.edge.to.port.clone(),
                kind: Some(connection.kind),
            });
        }
        Ok(patch.to_json()?)
    }

    /// Replace the session contents with a snapshot. Nodes of unknown
    /// type and invalid connections are skipped with a warning; the rest
    /// of the patch loads.
    pub fn load_snapshot(&mut self, json: &str) -> NaadaResult<()> {
        let patch = SerializedPatch::from_json(json)?;
        self.clear_all();
        self.history.set_suppressed(true);

        for snode in &patch.nodes {
            let Some(metadata) = self.registry.metadata(&snode.type_id) else {
                warn!("snapshot node of unknown type '{}', skipped", snode.type_id);
                continue;
            };
            let mut node = PatchNode::new(metadata).with_id(snode.id);
            node.position = snode.position;
            for (name, value) in &snode.properties {
                node.set_property(name.clone(), value.clone());
            }
            self.graph.add_node(node.clone());
            self.attach_node(&node);
        }

        // Restore computed outputs before wiring so bridges pick up the
        // saved values as their initial push.
        for (uuid, state) in &patch.computed {
            self.computed.restore_state(
                NodeId::from_uuid(*uuid),
                state.properties.clone(),
                state.outputs.clone(),
            );
        }

        for sconn in &patch.connections {
            match self.graph.connect(
                sconn.from_node,
                &sconn.from_port,
                sconn.to_node,
                &sconn.to_port,
            ) {
                Ok(connection) => self.establish_connection(&connection),
                Err(error) => warn!("snapshot connection rejected: {}", error),
            }
        }

        self.history.set_suppressed(false);
        self.reconcile();
        Ok(())
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// The persisted model.
    pub fn graph(&self) -> &PatchGraph {
        &self.graph
    }

    /// The node type catalog.
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// The backend factory, read-only.
    pub fn backend(&self) -> &dyn BackendFactory {
        self.sync.factory()
    }

    /// The backend factory, mutable (failure injection in tests).
    pub fn backend_mut(&mut self) -> &mut dyn BackendFactory {
        self.sync.factory_mut()
    }

    /// The backend handle for a node, if one exists.
    pub fn backend_handle(&self, node_id: NodeId) -> Option<BackendHandle> {
        self.sync.handle(node_id)
    }

    /// Live bridges.
    pub fn bridges(&self) -> &BridgeManager {
        &self.bridges
    }

    /// A computed node's last published output.
    pub fn computed_output(&self, node_id: NodeId, output: &str) -> Option<Value> {
        self.computed.output(node_id, output).cloned()
    }

    /// Per-node runtime status.
    pub fn status(&self, node_id: NodeId) -> Option<RuntimeStatus> {
        let node = self.graph.node(node_id).ok()?;
        Some(match node.domain() {
            NodeDomain::Native => RuntimeStatus {
                backend_present: self.sync.has_instance(node_id),
                running: self.sync.is_running(node_id),
                load_state: self.pending.load_state(node_id),
            },
            NodeDomain::Computed => RuntimeStatus {
                backend_present: false,
                running: self.computed.has_state(node_id),
                load_state: self.pending.load_state(node_id),
            },
        })
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether the clipboard currently holds a pasteable fragment.
    pub fn clipboard_has_content(&self) -> bool {
        matches!(self.clipboard.get(), Ok(Some(_)))
    }

    /// Outstanding resource operations, oldest first. The embedding
    /// drives these (decode, device acquisition) and reports back via
    /// the `complete_*` methods.
    pub fn pending_operations(&self) -> &[PendingOperation] {
        self.pending.pending()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Retry backend creation for native nodes left without an instance,
    /// wiring connections only for the instances created in this pass.
    pub fn reconcile(&mut self) {
        let missing: Vec<PatchNode> = self
            .graph
            .nodes()
            .filter(|n| n.domain() == NodeDomain::Native && !self.sync.has_instance(n.id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut fresh = HashSet::new();
        for node in &missing {
            match self.sync.instantiate(node) {
                Ok(_) => {
                    fresh.insert(node.id);
                }
                Err(error) => {
                    debug!("backend creation still failing for node {}: {}", node.id, error)
                }
            }
        }
        if fresh.is_empty() {
            return;
        }

        let connections: Vec<LogicalConnection> = self
            .graph
            .connections()
            .iter()
            .filter(|c| {
                fresh.contains(&c.edge.from.node_id) || fresh.contains(&c.edge.to.node_id)
            })
            .cloned()
            .collect();

        let mut queue = VecDeque::new();
        for connection in &connections {
            match connection.kind {
                ConnectionKind::SignalWire | ConnectionKind::ParamWire => {
                    self.establish_connection(connection)
                }
                ConnectionKind::Bridged if fresh.contains(&connection.edge.to.node_id) => {
                    if let Some(effect) = self.bridges.repush(
                        connection.edge.from.node_id,
                        connection.edge.to.node_id,
                        &connection.edge.to.port,
                    ) {
                        self.dispatch_effect(effect, &mut queue);
                    }
                }
                _ => {}
            }
        }
        self.run_queue(queue);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Bring a freshly added node's runtime half up.
    fn attach_node(&mut self, node: &PatchNode) {
        match node.domain() {
            NodeDomain::Native => {
                if let Err(error) = self.sync.instantiate(node) {
                    warn!("backend creation failed for node {}: {}", node.id, error);
                }
                if node.schema.needs_device {
                    self.pending
                        .enqueue(node.id, PendingKind::DeviceAcquisition);
                }
            }
            NodeDomain::Computed => match self.computed.instantiate(node) {
                Ok(applied) => self.process_applied(node.id, applied),
                Err(error) => warn!("no behavior for node {}: {}", node.id, error),
            },
        }
    }

    /// Runtime teardown plus model removal, shared by the command path
    /// and history replay.
    fn detach_and_remove(
        &mut self,
        node_id: NodeId,
    ) -> Option<(PatchNode, Vec<LogicalConnection>)> {
        if !self.graph.has_node(node_id) {
            debug!("removal of missing node {}, dropped", node_id);
            return None;
        }
        let connections = self.graph.connections_of(node_id);
        for connection in &connections {
            self.teardown_connection(connection);
        }
        let stoppable = self
            .graph
            .node(node_id)
            .map(|n| n.schema.stoppable)
            .unwrap_or(false);
        let peers: Vec<NodeId> = connections
            .iter()
            .map(|c| {
                if c.edge.from.node_id == node_id {
                    c.edge.to.node_id
                } else {
                    c.edge.from.node_id
                }
            })
            .collect();
        self.sync.teardown(node_id, stoppable, &peers);
        self.bridges.remove_for_node(node_id);
        self.computed.destroy(node_id);
        self.pending.forget(node_id);
        self.repush_queue
            .retain(|(s, t, _)| *s != node_id && *t != node_id);
        self.graph.remove_node(node_id).ok()
    }

    /// Realize a connection at the runtime layer according to its kind.
    fn establish_connection(&mut self, connection: &LogicalConnection) {
        let from = connection.edge.from.node_id;
        let to = connection.edge.to.node_id;
        let from_port = connection.edge.from.port.clone();
        let to_port = connection.edge.to.port.clone();

        match connection.kind {
            ConnectionKind::SignalWire => {
                if let Err(error) = self.sync.wire_signal(from, to) {
                    debug!("signal wiring deferred: {}", error);
                }
            }
            ConnectionKind::ParamWire => {
                let Ok(from_node) = self.graph.node(from).cloned() else {
                    return;
                };
                if let Err(error) = self.sync.wire_param(&from_node, to, &to_port) {
                    debug!("param wiring deferred: {}", error);
                }
            }
            ConnectionKind::Bridged => {
                let Ok(from_domain) = self.graph.node(from).map(|n| n.domain()) else {
                    return;
                };
                if from_domain == NodeDomain::Computed {
                    let initial = self
                        .computed
                        .output(from, &from_port)
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                    let effect = self.bridges.create_continuous(
                        from,
                        from_port,
                        to,
                        to_port.clone(),
                        initial,
                    );
                    let mut queue = VecDeque::new();
                    self.dispatch_effect(effect, &mut queue);
                    self.run_queue(queue);
                    // One deferred re-push covers a value published
                    // between validation and bridge creation.
                    self.repush_queue.push((from, to, to_port));
                } else {
                    // Native sources do not push values into the engine;
                    // the bridge exists as the connection handshake.
                    let _ = self
                        .bridges
                        .create_continuous(from, from_port, to, to_port, 0.0);
                }
            }
            ConnectionKind::Reactive => {
                self.computed.subscribe(from, &from_port, to, &to_port);
                if let Some(value) = self.computed.output(from, &from_port).cloned() {
                    let applied = self.computed.handle_input(to, &to_port, &value);
                    let mut queue = VecDeque::new();
                    self.enqueue_applied(to, applied, &mut queue);
                    self.run_queue(queue);
                }
            }
            ConnectionKind::Trigger => {
                let Ok(to_domain) = self.graph.node(to).map(|n| n.domain()) else {
                    return;
                };
                self.bridges
                    .create_trigger(from, from_port, to, to_port, to_domain);
            }
        }
    }

    /// Reverse a connection's runtime wiring and restore the target
    /// parameter's declared default where one applies.
    fn teardown_connection(&mut self, connection: &LogicalConnection) {
        let from = connection.edge.from.node_id;
        let from_port = connection.edge.from.port.as_str();
        let to = connection.edge.to.node_id;
        let to_port = connection.edge.to.port.as_str();

        match connection.kind {
            ConnectionKind::SignalWire => self.sync.unwire(from, to),
            ConnectionKind::ParamWire => {
                self.sync.unwire(from, to);
                self.restore_param_default(to, to_port);
            }
            ConnectionKind::Bridged => {
                self.bridges.remove(from, to, to_port);
                let native_target = self
                    .graph
                    .node(to)
                    .map(|n| n.domain() == NodeDomain::Native)
                    .unwrap_or(false);
                if native_target {
                    self.restore_param_default(to, to_port);
                }
            }
            ConnectionKind::Reactive => self.computed.unsubscribe(from, from_port, to, to_port),
            ConnectionKind::Trigger => {
                self.bridges.remove(from, to, to_port);
            }
        }
    }

    fn restore_param_default(&mut self, node_id: NodeId, param: &str) {
        let default = self
            .graph
            .node(node_id)
            .ok()
            .and_then(|n| n.property_default(param))
            .and_then(|v| v.as_f64());
        if let Some(value) = default {
            self.sync.set_param(node_id, param, value);
        }
    }

    /// Apply a changed property to whichever runtime executes the node.
    fn apply_property_runtime(&mut self, node_id: NodeId, name: &str, value: &Value) {
        let Ok(node) = self.graph.node(node_id).cloned() else {
            debug!("property change for missing node {}, dropped", node_id);
            return;
        };
        match node.domain() {
            NodeDomain::Native => {
                if self.sync.apply_property(&node, name, value) {
                    self.restart_native(node_id);
                }
            }
            NodeDomain::Computed => {
                let applied = self.computed.on_property_change(node_id, name, value);
                self.process_applied(node_id, applied);
            }
        }
    }

    /// Destroy-and-recreate a native instance, replaying its wiring and
    /// re-pushing continuous bridges into it.
    fn restart_native(&mut self, node_id: NodeId) {
        let Ok(node) = self.graph.node(node_id).cloned() else {
            debug!("restart for removed node {}, dropped", node_id);
            return;
        };
        let connections = self.graph.connections_of(node_id);
        if let Err(error) = self.sync.recreate(&node) {
            warn!("recreate failed for node {}: {}", node_id, error);
            return;
        }
        for connection in &connections {
            match connection.kind {
                ConnectionKind::SignalWire | ConnectionKind::ParamWire => {
                    self.establish_connection(connection)
                }
                _ => {}
            }
        }
        let repush: Vec<(NodeId, String)> = self
            .bridges
            .bridges()
            .iter()
            .filter(|b| {
                b.key.target == node_id && matches!(b.kind, BridgeKind::Continuous { .. })
            })
            .filter_map(|b| b.key.port.clone().map(|p| (b.key.source, p)))
            .collect();
        let mut queue = VecDeque::new();
        for (source, port) in repush {
            if let Some(effect) = self.bridges.repush(source, node_id, &port) {
                self.dispatch_effect(effect, &mut queue);
            }
        }
        self.run_queue(queue);
    }

    /// Replay one history patch through the normal runtime paths.
    fn apply_patch(&mut self, patch: GraphPatch) {
        match patch {
            GraphPatch::AddNode(node) => {
                self.graph.add_node(node.clone());
                self.attach_node(&node);
            }
            GraphPatch::RemoveNode { node, .. } => {
                self.detach_and_remove(node.id);
            }
            GraphPatch::AddConnection(connection) => {
                self.graph.insert_connection(connection.clone());
                self.establish_connection(&connection);
            }
            GraphPatch::RemoveConnection(connection) => {
                if self.graph.disconnect(connection.edge.id).is_ok() {
                    self.teardown_connection(&connection);
                }
            }
            GraphPatch::SetProperty {
                node, name, after, ..
            } => {
                match self.graph.node_mut(node) {
                    Ok(target) => target.set_property(name.clone(), after.clone()),
                    Err(_) => {
                        debug!("property replay for missing node {}, dropped", node);
                        return;
                    }
                }
                self.apply_property_runtime(node, &name, &after);
            }
            GraphPatch::MoveNode { node, after, .. } => {
                if let Ok(target) = self.graph.node_mut(node) {
                    target.position = after;
                }
            }
        }
    }

    // ========================================================================
    // Propagation
    // ========================================================================

    fn process_applied(&mut self, node_id: NodeId, applied: Applied) {
        let mut queue = VecDeque::new();
        self.enqueue_applied(node_id, applied, &mut queue);
        self.run_queue(queue);
    }

    fn enqueue_applied(
        &mut self,
        node_id: NodeId,
        applied: Applied,
        queue: &mut VecDeque<Delivery>,
    ) {
        for request in applied.requests {
            match request {
                BehaviorRequest::Decode { path } => {
                    self.pending.enqueue(node_id, PendingKind::Decode { path })
                }
            }
        }
        for (output, value) in applied.outputs {
            queue.push_back((node_id, output, value));
        }
    }

    /// Drain the delivery queue: each output change feeds its bridges
    /// and reactive subscribers, whose own outputs re-enter the queue.
    fn run_queue(&mut self, mut queue: VecDeque<Delivery>) {
        let mut processed = 0usize;
        while let Some((source, output, value)) = queue.pop_front() {
            processed += 1;
            if processed > MAX_PROPAGATION_DEPTH {
                warn!(
                    "propagation depth limit reached at node {}, dropping {} deliveries",
                    source,
                    queue.len() + 1
                );
                return;
            }
            let effects = self.bridges.push_from_source(source, &output, &value);
            for effect in effects {
                self.dispatch_effect(effect, &mut queue);
            }
            for (target, input) in self.computed.subscribers(source, &output) {
                let applied = self.computed.handle_input(target, &input, &value);
                self.enqueue_applied(target, applied, &mut queue);
            }
        }
    }

    fn dispatch_effect(&mut self, effect: BridgeEffect, queue: &mut VecDeque<Delivery>) {
        match effect {
            BridgeEffect::SetParam {
                target,
                param,
                value,
            } => match self.graph.node(target).map(|n| n.domain()) {
                Ok(NodeDomain::Native) => self.sync.set_param(target, &param, value),
                Ok(NodeDomain::Computed) => {
                    let applied =
                        self.computed
                            .handle_input(target, &param, &Value::Float(value));
                    self.enqueue_applied(target, applied, queue);
                }
                Err(_) => debug!("bridge push for removed node {}, dropped", target),
            },
            BridgeEffect::RestartSource { target } => self.restart_native(target),
            BridgeEffect::ForwardTrigger { target, input, .. } => {
                let applied = self.computed.trigger(target, &input);
                self.enqueue_applied(target, applied, queue);
            }
        }
    }

    fn serialize_selection(&self, selection: &[NodeId]) -> SerializedPatch {
        let selected: HashSet<NodeId> = selection.iter().copied().collect();
        let mut fragment = SerializedPatch::new();
        for node in self.graph.nodes().filter(|n| selected.contains(&n.id)) {
            fragment.nodes.push(SerializedNode {
                id: node.id,
                type_id: node.type_id.clone(),
                position: node.position,
                properties: node.properties.clone(),
            });
            if node.domain() == NodeDomain::Computed {
                if let Some(state) = self.computed.state(node.id) {
                    fragment.computed.insert(
                        node.id.0,
                        SerializedComputedState {
                            properties: state.properties.clone(),
                            outputs: state.outputs.clone(),
                        },
                    );
                }
            }
        }
        for connection in self.graph.connections() {
            if selected.contains(&connection.edge.from.node_id)
                && selected.contains(&connection.edge.to.node_id)
            {
                fragment.connections.push(SerializedConnection {
                    from_node: connection.edge.from.node_id,
                    from_port: connection.edge.from.port.clone(),
                    to_node: connection.edge.to.node_id,
                    to_port: connection.edge.to.port.clone(),
                    kind: Some(connection.kind),
                });
            }
        }
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::backend::InMemoryBackendFactory;
    use uuid::Uuid;

    fn session() -> PatchSession {
        PatchSession::new(
            NodeTypeRegistry::with_builtins(),
            Box::new(InMemoryBackendFactory::new()),
        )
    }

    fn factory(session: &PatchSession) -> &InMemoryBackendFactory {
        session
            .backend()
            .as_any()
            .downcast_ref::<InMemoryBackendFactory>()
            .unwrap()
    }

    fn steps(values: &[f64]) -> Value {
        Value::List(values.iter().map(|v| Value::Float(*v)).collect())
    }

    #[test]
    fn test_add_creates_exactly_one_instance() {
        let mut s = session();
        s.add_node("oscillator").unwrap();
        s.add_node("gain").unwrap();
        assert_eq!(factory(&s).create_count(), 2);

        s.add_node("delay").unwrap();
        assert_eq!(factory(&s).create_count(), 3);
    }

    #[test]
    fn test_unconnected_add_remove_disturbs_nothing() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        s.add_edge(osc, "out", gain, "in").unwrap();

        let osc_handle = s.backend_handle(osc).unwrap();
        let gain_handle = s.backend_handle(gain).unwrap();

        let extra = s.add_node("noise").unwrap();
        s.remove_node(extra).unwrap();

        assert_eq!(factory(&s).teardown_calls_for(osc_handle), 0);
        assert_eq!(factory(&s).teardown_calls_for(gain_handle), 0);
        assert!(factory(&s).is_alive(osc_handle));
        assert!(factory(&s).is_alive(gain_handle));
        assert_eq!(factory(&s).instance_count(), 2);
    }

    #[test]
    fn test_undo_redo_add_node() {
        let mut s = session();
        let id = s.add_node("oscillator").unwrap();
        assert!(s.can_undo());

        s.undo().unwrap();
        assert!(!s.graph().has_node(id));
        assert_eq!(factory(&s).instance_count(), 0);
        assert!(s.can_redo());

        s.redo().unwrap();
        let node = s.graph().node(id).unwrap();
        assert_eq!(node.type_id, "oscillator");
        assert_eq!(node.property("frequency"), Some(Value::Float(440.0)));
        assert_eq!(factory(&s).instance_count(), 1);
    }

    #[test]
    fn test_undo_remove_restores_node_and_edges() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        s.add_edge(osc, "out", gain, "in").unwrap();

        s.remove_node(gain).unwrap();
        assert_eq!(s.graph().connection_count(), 0);
        assert!(!s.graph().has_node(gain));

        s.undo().unwrap();
        assert!(s.graph().has_node(gain));
        assert_eq!(s.graph().connection_count(), 1);
        // The signal wire is re-established against the new instance.
        let osc_handle = s.backend_handle(osc).unwrap();
        let gain_handle = s.backend_handle(gain).unwrap();
        assert_eq!(factory(&s).wires(osc_handle), vec![(gain_handle, None)]);
    }

    #[test]
    fn test_undo_only_removes_its_own_node() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        let edge = s.add_edge(osc, "out", gain, "in").unwrap();
        let extra = s.add_node("noise").unwrap();

        s.undo().unwrap();
        assert!(!s.graph().has_node(extra));
        assert!(s.graph().has_node(osc));
        assert!(s.graph().has_node(gain));
        assert!(s.graph().connection(edge).is_ok());
    }

    #[test]
    fn test_bridge_reflects_and_tracks_computed_value() {
        let mut s = session();
        let seq = s.add_node("sequencer").unwrap();
        let gain = s.add_node("gain").unwrap();
        s.set_property(seq, "steps", steps(&[0.3, 0.6])).unwrap();

        let edge = s.add_edge(seq, "value", gain, "level").unwrap();
        // Current value is pushed immediately on connection.
        assert_eq!(s.backend_handle(gain).and_then(|h| factory(&s).param(h, "level")), Some(0.3));

        s.tick(0.25);
        assert_eq!(s.backend_handle(gain).and_then(|h| factory(&s).param(h, "level")), Some(0.6));

        // Disconnect restores the declared default.
        s.remove_edge(edge).unwrap();
        assert_eq!(s.backend_handle(gain).and_then(|h| factory(&s).param(h, "level")), Some(1.0));
    }

    #[test]
    fn test_chain_propagates_in_order() {
        let mut s = session();
        let seq = s.add_node("sequencer").unwrap();
        let scale = s.add_node("scale").unwrap();
        let filter = s.add_node("filter").unwrap();

        s.set_property(seq, "steps", steps(&[0.2, 0.5, 1.0])).unwrap();
        s.add_edge(seq, "value", scale, "in").unwrap();
        let edge = s.add_edge(scale, "out", filter, "frequency").unwrap();

        let filter_handle = s.backend_handle(filter).unwrap();
        // Default scale mapping is [0,1] -> [0,100].
        assert_eq!(factory(&s).param(filter_handle, "frequency"), Some(20.0));

        s.tick(0.25);
        assert_eq!(factory(&s).param(filter_handle, "frequency"), Some(50.0));
        s.tick(0.25);
        assert_eq!(factory(&s).param(filter_handle, "frequency"), Some(100.0));

        s.remove_edge(edge).unwrap();
        assert_eq!(factory(&s).param(filter_handle, "frequency"), Some(1_000.0));
    }

    #[test]
    fn test_trigger_restarts_single_shot_with_replay() {
        let mut s = session();
        let seq = s.add_node("sequencer").unwrap();
        let compare = s.add_node("compare").unwrap();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        let other = s.add_node("noise").unwrap();

        s.set_property(seq, "steps", steps(&[0.2, 0.9])).unwrap();
        s.add_edge(seq, "value", compare, "in").unwrap();
        s.add_edge(compare, "result", osc, "restart").unwrap();
        s.add_edge(osc, "out", gain, "in").unwrap();

        let old_osc = s.backend_handle(osc).unwrap();
        let gain_handle = s.backend_handle(gain).unwrap();
        let other_handle = s.backend_handle(other).unwrap();
        let creates = factory(&s).create_count();

        // 0.9 crosses the threshold: rising edge into the trigger input.
        s.tick(0.25);

        let new_osc = s.backend_handle(osc).unwrap();
        assert_ne!(new_osc, old_osc);
        assert!(!factory(&s).is_alive(old_osc));
        assert_eq!(factory(&s).create_count(), creates + 1);
        // Outgoing signal wire replayed onto the new instance.
        assert_eq!(factory(&s).wires(new_osc), vec![(gain_handle, None)]);
        // Unrelated instances untouched.
        assert!(factory(&s).is_alive(other_handle));
        assert_eq!(factory(&s).teardown_calls_for(other_handle), 0);
    }

    #[test]
    fn test_trigger_rewinds_computed_target() {
        let mut s = session();
        let driver = s.add_node("sequencer").unwrap();
        let compare = s.add_node("compare").unwrap();
        let target = s.add_node("sequencer").unwrap();

        s.set_property(driver, "steps", steps(&[0.2, 0.9])).unwrap();
        s.set_property(target, "steps", steps(&[5.0, 7.0])).unwrap();
        s.add_edge(driver, "value", compare, "in").unwrap();
        s.add_edge(compare, "result", target, "reset").unwrap();
        assert_eq!(s.computed_output(target, "value"), Some(Value::Float(5.0)));

        // The same tick advances the target to 7.0, then the rising edge
        // out of the comparator rewinds it to its first step.
        s.tick(0.25);
        assert_eq!(s.computed_output(target, "value"), Some(Value::Float(5.0)));

        // Disconnecting the trigger leaves the target free-running again.
        let edges: Vec<_> = s
            .graph()
            .connections_to(target)
            .map(|c| c.edge.id)
            .collect();
        for edge in edges {
            s.remove_edge(edge).unwrap();
        }
        s.tick(0.25);
        assert_eq!(s.computed_output(target, "value"), Some(Value::Float(7.0)));
    }

    #[test]
    fn test_single_shot_property_change_recreates() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let old = s.backend_handle(osc).unwrap();

        s.set_property(osc, "frequency", Value::Float(880.0)).unwrap();
        let new = s.backend_handle(osc).unwrap();
        assert_ne!(new, old);
        assert_eq!(factory(&s).param(new, "frequency"), Some(880.0));
    }

    #[test]
    fn test_native_param_wire_zeroes_then_restores() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();

        let edge = s.add_edge(osc, "out", gain, "level").unwrap();
        let gain_handle = s.backend_handle(gain).unwrap();
        assert_eq!(factory(&s).param(gain_handle, "level"), Some(0.0));

        s.remove_edge(edge).unwrap();
        assert_eq!(factory(&s).param(gain_handle, "level"), Some(1.0));
    }

    #[test]
    fn test_reactive_cycle_terminates() {
        let mut s = session();
        let seq = s.add_node("sequencer").unwrap();
        let a = s.add_node("scale").unwrap();
        let b = s.add_node("scale").unwrap();

        s.add_edge(a, "out", b, "in").unwrap();
        s.add_edge(b, "out", a, "in").unwrap();
        s.add_edge(seq, "value", a, "in").unwrap();

        // The cascade hits the depth guard and returns instead of
        // spinning forever.
        s.set_property(seq, "steps", steps(&[0.5])).unwrap();
        assert_eq!(s.graph().connection_count(), 3);
    }

    #[test]
    fn test_clear_all_resets_everything() {
        let mut s = session();
        let seq = s.add_node("sequencer").unwrap();
        let gain = s.add_node("gain").unwrap();
        s.add_edge(seq, "value", gain, "level").unwrap();

        s.clear_all();
        assert_eq!(s.graph().node_count(), 0);
        assert_eq!(s.graph().connection_count(), 0);
        assert_eq!(factory(&s).instance_count(), 0);
        assert!(s.bridges().is_empty());
        assert!(!s.can_undo());
        assert!(!s.can_redo());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        let seq = s.add_node("sequencer").unwrap();
        s.set_property(osc, "frequency", Value::Float(880.0)).unwrap();
        s.set_property(seq, "steps", steps(&[0.4])).unwrap();
        s.add_edge(osc, "out", gain, "in").unwrap();
        s.add_edge(seq, "value", gain, "level").unwrap();

        let json = s.save_snapshot().unwrap();
        let mut loaded = session();
        loaded.load_snapshot(&json).unwrap();

        assert_eq!(loaded.graph().node_count(), 3);
        assert_eq!(loaded.graph().connection_count(), 2);
        assert_eq!(
            loaded.graph().node(osc).unwrap().property("frequency"),
            Some(Value::Float(880.0))
        );
        // Restored computed output flows through the re-created bridge.
        let gain_handle = loaded.backend_handle(gain).unwrap();
        assert_eq!(factory(&loaded).param(gain_handle, "level"), Some(0.4));
    }

    #[test]
    fn test_v1_snapshot_migrates_and_loads() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let json = format!(
            r#"{{
                "version": 1,
                "nodes": [
                    {{"id": "{a}", "type": "oscillator", "x": 1.0, "y": 2.0}},
                    {{"id": "{b}", "type": "gain"}}
                ],
                "links": [{{"source": "{a}", "target": "{b}"}}]
            }}"#
        );

        let mut s = session();
        s.load_snapshot(&json).unwrap();
        assert_eq!(s.graph().node_count(), 2);
        assert_eq!(s.graph().connection_count(), 1);
        assert_eq!(
            s.graph().connections()[0].kind,
            ConnectionKind::SignalWire
        );
    }

    #[test]
    fn test_decode_completion_after_removal_is_noop() {
        let mut s = session();
        let player = s.add_node("sample-player").unwrap();
        s.set_property(player, "path", Value::Text("kick.wav".to_string()))
            .unwrap();
        assert_eq!(s.pending_operations().len(), 1);

        s.remove_node(player).unwrap();
        s.complete_decode(
            player,
            Ok(AudioBuffer {
                path: "kick.wav".to_string(),
                sample_rate: 44_100,
                channels: 2,
                frames: 44_100,
            }),
        );
        assert!(s.computed_output(player, "loaded").is_none());
        assert!(s.pending_operations().is_empty());
    }

    #[test]
    fn test_decode_completion_loads_player() {
        let mut s = session();
        let player = s.add_node("sample-player").unwrap();
        s.set_property(player, "path", Value::Text("kick.wav".to_string()))
            .unwrap();

        s.complete_decode(
            player,
            Ok(AudioBuffer {
                path: "kick.wav".to_string(),
                sample_rate: 44_100,
                channels: 2,
                frames: 44_100,
            }),
        );
        assert_eq!(s.status(player).unwrap().load_state, LoadState::Loaded);
        assert_eq!(s.computed_output(player, "loaded"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_parallel_reactive_edges_survive_single_disconnect() {
        let mut s = session();
        let player = s.add_node("sample-player").unwrap();
        let display = s.add_node("display").unwrap();
        let position_edge = s.add_edge(player, "position", display, "in").unwrap();
        s.add_edge(player, "loaded", display, "in").unwrap();

        // Dropping one of two parallel edges must leave the other live.
        s.remove_edge(position_edge).unwrap();
        assert_eq!(s.graph().connection_count(), 1);

        s.set_property(player, "path", Value::Text("kick.wav".to_string()))
            .unwrap();
        s.complete_decode(
            player,
            Ok(AudioBuffer {
                path: "kick.wav".to_string(),
                sample_rate: 44_100,
                channels: 2,
                frames: 44_100,
            }),
        );
        assert_eq!(s.computed_output(display, "value"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_copy_paste_round_trip() {
        let mut s = session();
        let osc = s.add_node("oscillator").unwrap();
        let gain = s.add_node("gain").unwrap();
        s.add_edge(osc, "out", gain, "in").unwrap();

        s.copy_selection(&[osc, gain]).unwrap();
        assert!(s.clipboard_has_content());

        let pasted = s.paste().unwrap();
        assert_eq!(pasted.len(), 2);
        assert_eq!(s.graph().node_count(), 4);
        assert_eq!(s.graph().connection_count(), 2);
        // Pasted nodes get fresh ids.
        assert!(!pasted.contains(&osc));
        assert!(!pasted.contains(&gain));

        // The whole paste undoes as one command.
        s.undo().unwrap();
        assert_eq!(s.graph().node_count(), 2);
        assert_eq!(s.graph().connection_count(), 1);
    }

    #[test]
    fn test_paste_restores_computed_outputs() {
        let mut s = session();
        let player = s.add_node("sample-player").unwrap();
        let display = s.add_node("display").unwrap();
        s.add_edge(player, "loaded", display, "in").unwrap();
        s.set_property(player, "path", Value::Text("kick.wav".to_string()))
            .unwrap();
        s.complete_decode(
            player,
            Ok(AudioBuffer {
                path: "kick.wav".to_string(),
                sample_rate: 44_100,
                channels: 2,
                frames: 44_100,
            }),
        );
        assert_eq!(s.computed_output(display, "value"), Some(Value::Float(1.0)));

        // The display's output only ever comes from its input, so the
        // pasted copy showing the same value proves the copied state
        // came along rather than a fresh initialization.
        s.copy_selection(&[display]).unwrap();
        let pasted = s.paste().unwrap();
        assert_eq!(
            s.computed_output(pasted[0], "value"),
            Some(Value::Float(1.0))
        );
    }

    #[test]
    fn test_creation_failure_is_retried_on_next_change() {
        let mut factory_impl = InMemoryBackendFactory::new();
        factory_impl.fail_type("noise");
        let mut s = PatchSession::new(
            NodeTypeRegistry::with_builtins(),
            Box::new(factory_impl),
        );

        let noise = s.add_node("noise").unwrap();
        assert!(!s.status(noise).unwrap().backend_present);

        s.backend_mut()
            .as_any_mut()
            .downcast_mut::<InMemoryBackendFactory>()
            .unwrap()
            .heal_type("noise");

        // The next model change retries the failed creation.
        s.add_node("gain").unwrap();
        assert!(s.status(noise).unwrap().backend_present);
    }

    #[test]
    fn test_microphone_waits_for_device() {
        let mut s = session();
        let mic = s.add_node("microphone").unwrap();
        assert_eq!(s.status(mic).unwrap().load_state, LoadState::Loading);

        s.complete_device_acquisition(mic, Ok(()));
        assert_eq!(s.status(mic).unwrap().load_state, LoadState::Loaded);
    }

    #[test]
    fn test_invalid_edge_leaves_no_state() {
        let mut s = session();
        let scale = s.add_node("scale").unwrap();
        let gain = s.add_node("gain").unwrap();

        // Control output into a signal input is rejected.
        assert!(s.add_edge(scale, "out", gain, "in").is_err());
        assert_eq!(s.graph().connection_count(), 0);
        assert!(s.bridges().is_empty());
        // The failed attempt is not undoable.
        s.undo().unwrap(); // undoes add gain
        assert!(!s.graph().has_node(gain));
    }
}
