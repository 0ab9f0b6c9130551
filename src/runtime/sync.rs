//! Lifecycle synchronization between the model and native backends.
//!
//! The synchronizer owns the backend instances, exclusively: nothing else
//! holds a [`BackendHandle`]. Its job is to keep instances in 1:1
//! correspondence with attached native nodes without disturbing unrelated,
//! already-running instances. Instantiation is idempotent; wiring of a
//! node's connections is only (re)established for nodes created in the
//! current reconciliation pass, which the session drives.

use crate::core::error::{BackendError, BackendResult, NodeId};
use crate::core::types::Value;
use crate::graph::node::PatchNode;
use crate::registry::NodeTypeMetadata;
use crate::runtime::backend::{BackendFactory, BackendHandle};
use log::{debug, warn};
use std::collections::HashMap;

/// Whether a modulation source keeps the target parameter's base value.
///
/// Wiring a native output into a continuous parameter normally resets the
/// parameter's static base to zero so the signal alone drives it. Sources
/// built to wobble a parameter around its current setting keep the base.
fn preserves_baseline(source: &NodeTypeMetadata, param: &str) -> bool {
    source.baseline_modulator && matches!(param, "frequency" | "detune" | "time" | "q" | "level")
}

/// Owner of native backend instances, keyed by node id.
pub struct LifecycleSynchronizer {
    factory: Box<dyn BackendFactory>,
    instances: HashMap<NodeId, BackendHandle>,
}

impl LifecycleSynchronizer {
    /// Create a synchronizer around a backend factory.
    pub fn new(factory: Box<dyn BackendFactory>) -> Self {
        Self {
            factory,
            instances: HashMap::new(),
        }
    }

    /// Whether a node currently has a backend instance.
    pub fn has_instance(&self, node_id: NodeId) -> bool {
        self.instances.contains_key(&node_id)
    }

    /// The handle for a node's instance, if one exists.
    pub fn handle(&self, node_id: NodeId) -> Option<BackendHandle> {
        self.instances.get(&node_id).copied()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instantiate a backend for a node.
    ///
    /// Idempotent: re-invocation on an already-instantiated node returns
    /// the existing handle without touching the backend.
    pub fn instantiate(&mut self, node: &PatchNode) -> BackendResult<BackendHandle> {
        if let Some(&handle) = self.instances.get(&node.id) {
            return Ok(handle);
        }
        let handle = self
            .factory
            .create(node.id, &node.schema, &node.properties)?;
        debug!("node {} instantiated as {}", node.id, handle);
        self.instances.insert(node.id, handle);
        Ok(handle)
    }

    /// Tear down a node's instance: disconnect from the given peers, stop
    /// if stoppable, destroy, and forget the handle.
    ///
    /// Runs before the node leaves the model. A node without an instance
    /// is a no-op.
    pub fn teardown(&mut self, node_id: NodeId, stoppable: bool, peers: &[NodeId]) {
        let Some(handle) = self.instances.remove(&node_id) else {
            return;
        };
        for peer in peers {
            if let Some(&peer_handle) = self.instances.get(peer) {
                self.factory.disconnect(handle, peer_handle);
                self.factory.disconnect(peer_handle, handle);
            }
        }
        if stoppable {
            self.factory.stop(handle);
        }
        self.factory.destroy(handle);
        debug!("node {} backend torn down", node_id);
    }

    /// Apply a property change to a live instance.
    ///
    /// Returns `true` when the instance must be destroyed and recreated
    /// because the backend could not absorb the update in place. A node
    /// without an instance needs nothing.
    pub fn apply_property(&mut self, node: &PatchNode, name: &str, value: &Value) -> bool {
        let Some(&handle) = self.instances.get(&node.id) else {
            return false;
        };
        let updated = self
            .factory
            .update_property(handle, &node.schema, name, value);
        if !updated {
            debug!(
                "node {} rejected in-place update of '{}', scheduling recreate",
                node.id, name
            );
        }
        !updated
    }

    /// Destroy a node's instance and create a fresh one from its current
    /// properties. The caller captures and replays connections.
    pub fn recreate(&mut self, node: &PatchNode) -> BackendResult<BackendHandle> {
        if let Some(handle) = self.instances.remove(&node.id) {
            if node.schema.stoppable {
                self.factory.stop(handle);
            }
            self.factory.destroy(handle);
        }
        self.instantiate(node)
    }

    /// Wire a continuous signal between two instances.
    pub fn wire_signal(&mut self, from: NodeId, to: NodeId) -> BackendResult<()> {
        let (from_handle, to_handle) = self.pair(from, to)?;
        self.factory.connect_signal(from_handle, to_handle)
    }

    /// Wire an instance's output into a named parameter of another.
    ///
    /// Resets the parameter's static base to zero unless the source kind
    /// modulates around the existing baseline.
    pub fn wire_param(
        &mut self,
        from: &PatchNode,
        to: NodeId,
        param: &str,
    ) -> BackendResult<()> {
        let (from_handle, to_handle) = self.pair(from.id, to)?;
        self.factory.connect_param(from_handle, to_handle, param)?;
        if !preserves_baseline(&from.schema, param) {
            self.factory.set_param(to_handle, param, 0.0);
        }
        Ok(())
    }

    /// Remove all wiring between two instances.
    pub fn unwire(&mut self, from: NodeId, to: NodeId) {
        if let (Some(&from_handle), Some(&to_handle)) =
            (self.instances.get(&from), self.instances.get(&to))
        {
            self.factory.disconnect(from_handle, to_handle);
        }
    }

    /// Set a parameter on a node's instance.
    ///
    /// A missing instance is logged and skipped: the value will be carried
    /// by the model and applied when the instance is (re)created.
    pub fn set_param(&mut self, node_id: NodeId, param: &str, value: f64) {
        match self.instances.get(&node_id) {
            Some(&handle) => self.factory.set_param(handle, param, value),
            None => warn!(
                "set_param '{}' on node {} without a backend instance",
                param, node_id
            ),
        }
    }

    /// Read back a parameter from a node's instance.
    pub fn param(&self, node_id: NodeId, param: &str) -> Option<f64> {
        let handle = self.instances.get(&node_id)?;
        self.factory.param(*handle, param)
    }

    /// Whether a node's instance is currently running.
    pub fn is_running(&self, node_id: NodeId) -> bool {
        self.instances
            .get(&node_id)
            .map(|&h| self.factory.is_running(h))
            .unwrap_or(false)
    }

    /// Tear down every instance (clear-all).
    pub fn clear(&mut self, stoppable: impl Fn(NodeId) -> bool) {
        let ids: Vec<NodeId> = self.instances.keys().copied().collect();
        for node_id in ids {
            let is_stoppable = stoppable(node_id);
            self.teardown(node_id, is_stoppable, &[]);
        }
    }

    /// Access the factory (for status queries and tests).
    pub fn factory(&self) -> &dyn BackendFactory {
        self.factory.as_ref()
    }

    /// Mutable factory access.
    pub fn factory_mut(&mut self) -> &mut dyn BackendFactory {
        self.factory.as_mut()
    }

    fn pair(&self, from: NodeId, to: NodeId) -> BackendResult<(BackendHandle, BackendHandle)> {
        let from_handle = *self
            .instances
            .get(&from)
            .ok_or(BackendError::NoInstance(from))?;
        let to_handle = *self
            .instances
            .get(&to)
            .ok_or(BackendError::NoInstance(to))?;
        Ok((from_handle, to_handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeTypeRegistry;
    use crate::runtime::backend::InMemoryBackendFactory;

    fn setup() -> (NodeTypeRegistry, LifecycleSynchronizer) {
        (
            NodeTypeRegistry::with_builtins(),
            LifecycleSynchronizer::new(Box::new(InMemoryBackendFactory::new())),
        )
    }

    #[test]
    fn test_instantiate_is_idempotent() {
        let (registry, mut sync) = setup();
        let node = PatchNode::new(registry.metadata("gain").unwrap());

        let first = sync.instantiate(&node).unwrap();
        let second = sync.instantiate(&node).unwrap();
        assert_eq!(first, second);
        assert_eq!(sync.instance_count(), 1);
    }

    #[test]
    fn test_teardown_removes_instance() {
        let (registry, mut sync) = setup();
        let node = PatchNode::new(registry.metadata("oscillator").unwrap());

        sync.instantiate(&node).unwrap();
        sync.teardown(node.id, node.schema.stoppable, &[]);
        assert!(!sync.has_instance(node.id));
    }

    #[test]
    fn test_single_shot_property_needs_recreate() {
        let (registry, mut sync) = setup();
        let osc = PatchNode::new(registry.metadata("oscillator").unwrap());
        let gain = PatchNode::new(registry.metadata("gain").unwrap());

        sync.instantiate(&osc).unwrap();
        sync.instantiate(&gain).unwrap();

        assert!(sync.apply_property(&osc, "frequency", &Value::Float(880.0)));
        assert!(!sync.apply_property(&gain, "level", &Value::Float(0.5)));
    }

    #[test]
    fn test_recreate_issues_new_handle() {
        let (registry, mut sync) = setup();
        let node = PatchNode::new(registry.metadata("oscillator").unwrap());

        let first = sync.instantiate(&node).unwrap();
        let second = sync.recreate(&node).unwrap();
        assert_ne!(first, second);
        assert_eq!(sync.instance_count(), 1);
    }

    #[test]
    fn test_param_wire_resets_base_to_zero() {
        let (registry, mut sync) = setup();
        let osc = PatchNode::new(registry.metadata("oscillator").unwrap());
        let gain = PatchNode::new(registry.metadata("gain").unwrap());

        sync.instantiate(&osc).unwrap();
        sync.instantiate(&gain).unwrap();
        sync.wire_param(&osc, gain.id, "level").unwrap();

        assert_eq!(sync.param(gain.id, "level"), Some(0.0));
    }

    #[test]
    fn test_lfo_wire_preserves_base() {
        let (registry, mut sync) = setup();
        let lfo = PatchNode::new(registry.metadata("lfo").unwrap());
        let osc = PatchNode::new(registry.metadata("filter").unwrap());

        sync.instantiate(&lfo).unwrap();
        sync.instantiate(&osc).unwrap();
        sync.wire_param(&lfo, osc.id, "frequency").unwrap();

        // The filter's base frequency stays where the property put it.
        assert_eq!(sync.param(osc.id, "frequency"), Some(1_000.0));
    }

    #[test]
    fn test_creation_failure_leaves_no_instance() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut factory = InMemoryBackendFactory::new();
        factory.fail_type("noise");
        let mut sync = LifecycleSynchronizer::new(Box::new(factory));

        let node = PatchNode::new(registry.metadata("noise").unwrap());
        assert!(sync.instantiate(&node).is_err());
        assert!(!sync.has_instance(node.id));
    }
}
