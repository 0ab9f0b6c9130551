//! Computed node engine.
//!
//! Computed nodes are fully modeled in the engine: each one is a
//! [`ComputedBehavior`] plus a [`ComputedState`] (properties, outputs,
//! reactive subscriptions). Behaviors are pure-ish state machines that
//! answer every stimulus with an optional [`Delta`]; the engine applies
//! deltas to state and hands the resulting output changes back to the
//! session, which owns the propagation queue. Behaviors never see node
//! ids, backends, or each other.

pub mod builtin;

use crate::core::error::{GraphError, NaadaResult, NodeId};
use crate::core::types::Value;
use crate::graph::node::PatchNode;
use crate::runtime::resources::AudioBuffer;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

// ============================================================================
// Behavior contract
// ============================================================================

/// A request a behavior makes of the outside world.
///
/// Behaviors cannot perform I/O; they ask, the session enqueues a pending
/// operation, and the result comes back through [`ComputedBehavior::decode_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorRequest {
    /// Decode an audio file.
    Decode { path: String },
}

/// State changes produced by one stimulus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// Output values to publish, in order.
    pub outputs: Vec<(String, Value)>,
    /// Property values to write back (clamped display mirrors and the like).
    pub properties: Vec<(String, Value)>,
    /// Resource requests to enqueue.
    pub requests: Vec<BehaviorRequest>,
}

impl Delta {
    /// A delta publishing a single output.
    pub fn output(name: impl Into<String>, value: Value) -> Self {
        Self {
            outputs: vec![(name.into(), value)],
            ..Self::default()
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: Value) -> Self {
        self.outputs.push((name.into(), value));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), value));
        self
    }

    pub fn with_request(mut self, request: BehaviorRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.properties.is_empty() && self.requests.is_empty()
    }
}

/// The contract every computed node kind implements.
///
/// All methods run synchronously on the engine thread. Default
/// implementations make trigger, tick, and decode completion opt-in; a
/// behavior that ignores a stimulus returns `None`.
pub trait ComputedBehavior {
    /// Called once when the node attaches, with its starting properties.
    fn initialize(&mut self, properties: &HashMap<String, Value>) -> Option<Delta>;

    /// An input port received a value from upstream.
    fn handle_input(&mut self, port: &str, value: &Value) -> Option<Delta>;

    /// A property changed through the command surface.
    fn on_property_change(&mut self, name: &str, value: &Value) -> Option<Delta>;

    /// A rising edge arrived on a trigger input.
    fn trigger(&mut self, _input: &str) -> Option<Delta> {
        None
    }

    /// Cooperative time slice for periodic sources. `elapsed` is seconds
    /// since the previous tick.
    fn tick(&mut self, _elapsed: f64) -> Option<Delta> {
        None
    }

    /// A previously requested decode finished.
    fn decode_complete(&mut self, _result: Result<&AudioBuffer, &str>) -> Option<Delta> {
        None
    }

    /// Called once when the node detaches.
    fn cleanup(&mut self) {}
}

/// Constructor for a behavior, registered per type id.
pub type BehaviorFactory = fn() -> Box<dyn ComputedBehavior>;

// ============================================================================
// Per-node state
// ============================================================================

/// A reactive subscription: one computed node listening to another's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Which output of the source is watched.
    pub output: String,
    /// The listening node.
    pub target: NodeId,
    /// The input port the value is delivered to.
    pub target_input: String,
}

/// Everything the engine tracks for one live computed node.
#[derive(Debug, Clone, Default)]
pub struct ComputedState {
    /// Current property values, kept in step with the model.
    pub properties: HashMap<String, Value>,
    /// Last published value per output port.
    pub outputs: HashMap<String, Value>,
    /// Who listens to this node's outputs.
    pub subscriptions: Vec<Subscription>,
}

// ============================================================================
// Engine
// ============================================================================

/// One applied delta, as the session sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Output changes to propagate, in publish order.
    pub outputs: Vec<(String, Value)>,
    /// Resource requests to enqueue.
    pub requests: Vec<BehaviorRequest>,
}

/// Owner of all computed behaviors and their state.
///
/// Keyed by node id; at most one behavior + state per node. Insertion
/// order is preserved so ticks visit nodes deterministically.
pub struct ComputedEngine {
    factories: HashMap<String, BehaviorFactory>,
    behaviors: IndexMap<NodeId, Box<dyn ComputedBehavior>>,
    states: IndexMap<NodeId, ComputedState>,
}

impl ComputedEngine {
    /// An engine with no behaviors registered.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            behaviors: IndexMap::new(),
            states: IndexMap::new(),
        }
    }

    /// An engine with the builtin behavior set.
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        builtin::register_all(&mut engine);
        engine
    }

    /// Register (or replace) the behavior factory for a type id.
    pub fn register_behavior(&mut self, type_id: impl Into<String>, factory: BehaviorFactory) {
        self.factories.insert(type_id.into(), factory);
    }

    /// Whether a behavior is registered for the type id.
    pub fn supports(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }

    /// Whether the node has live state.
    pub fn has_state(&self, node_id: NodeId) -> bool {
        self.states.contains_key(&node_id)
    }

    /// Attach a behavior for a node and run its initialization.
    ///
    /// Idempotent: an already-attached node returns an empty result.
    pub fn instantiate(&mut self, node: &PatchNode) -> NaadaResult<Applied> {
        if self.behaviors.contains_key(&node.id) {
            return Ok(Applied::default());
        }
        let factory = self
            .factories
            .get(node.type_id.as_str())
            .ok_or_else(|| GraphError::UnknownNodeType(node.type_id.clone()))?;
        let mut behavior = factory();
        let delta = behavior.initialize(&node.properties);
        self.behaviors.insert(node.id, behavior);
        self.states.insert(
            node.id,
            ComputedState {
                properties: node.properties.clone(),
                ..ComputedState::default()
            },
        );
        debug!("computed node {} ({}) attached", node.id, node.type_id);
        Ok(self.apply(node.id, delta))
    }

    /// Detach a node: run cleanup, drop its state, and unsubscribe it
    /// from every other node.
    pub fn destroy(&mut self, node_id: NodeId) {
        if let Some(mut behavior) = self.behaviors.shift_remove(&node_id) {
            behavior.cleanup();
        }
        self.states.shift_remove(&node_id);
        for state in self.states.values_mut() {
            state.subscriptions.retain(|s| s.target != node_id);
        }
    }

    /// Add a reactive subscription from `source`'s output to `target`'s input.
    pub fn subscribe(
        &mut self,
        source: NodeId,
        output: impl Into<String>,
        target: NodeId,
        target_input: impl Into<String>,
    ) {
        if let Some(state) = self.states.get_mut(&source) {
            state.subscriptions.push(Subscription {
                output: output.into(),
                target,
                target_input: target_input.into(),
            });
        }
    }

    /// Remove the subscription matching a disconnected edge. The source
    /// output participates in the match: two outputs of one node can feed
    /// the same target input, and only the disconnected one may go.
    pub fn unsubscribe(&mut self, source: NodeId, output: &str, target: NodeId, target_input: &str) {
        if let Some(state) = self.states.get_mut(&source) {
            state.subscriptions.retain(|s| {
                !(s.output == output && s.target == target && s.target_input == target_input)
            });
        }
    }

    /// Subscribers of one output, in subscription order.
    pub fn subscribers(&self, source: NodeId, output: &str) -> Vec<(NodeId, String)> {
        self.states
            .get(&source)
            .map(|state| {
                state
                    .subscriptions
                    .iter()
                    .filter(|s| s.output == output)
                    .map(|s| (s.target, s.target_input.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deliver an upstream value to a node's input.
    pub fn handle_input(&mut self, node_id: NodeId, port: &str, value: &Value) -> Applied {
        let Some(behavior) = self.behaviors.get_mut(&node_id) else {
            debug!("input for detached computed node {}, dropped", node_id);
            return Applied::default();
        };
        let delta = behavior.handle_input(port, value);
        self.apply(node_id, delta)
    }

    /// Deliver a property change.
    pub fn on_property_change(&mut self, node_id: NodeId, name: &str, value: &Value) -> Applied {
        let Some(behavior) = self.behaviors.get_mut(&node_id) else {
            return Applied::default();
        };
        if let Some(state) = self.states.get_mut(&node_id) {
            state.properties.insert(name.to_string(), value.clone());
        }
        let delta = behavior.on_property_change(name, value);
        self.apply(node_id, delta)
    }

    /// Deliver a rising trigger edge.
    pub fn trigger(&mut self, node_id: NodeId, input: &str) -> Applied {
        let Some(behavior) = self.behaviors.get_mut(&node_id) else {
            return Applied::default();
        };
        let delta = behavior.trigger(input);
        self.apply(node_id, delta)
    }

    /// Advance every periodic behavior by `elapsed` seconds.
    ///
    /// Returns per-node applied deltas in attachment order.
    pub fn tick(&mut self, elapsed: f64) -> Vec<(NodeId, Applied)> {
        let ids: Vec<NodeId> = self.behaviors.keys().copied().collect();
        let mut results = Vec::new();
        for node_id in ids {
            let delta = match self.behaviors.get_mut(&node_id) {
                Some(behavior) => behavior.tick(elapsed),
                None => None,
            };
            let applied = self.apply(node_id, delta);
            if !applied.outputs.is_empty() || !applied.requests.is_empty() {
                results.push((node_id, applied));
            }
        }
        results
    }

    /// Deliver a decode result.
    pub fn decode_complete(
        &mut self,
        node_id: NodeId,
        result: Result<&AudioBuffer, &str>,
    ) -> Applied {
        let Some(behavior) = self.behaviors.get_mut(&node_id) else {
            return Applied::default();
        };
        let delta = behavior.decode_complete(result);
        self.apply(node_id, delta)
    }

    /// Last published value of an output.
    pub fn output(&self, node_id: NodeId, output: &str) -> Option<&Value> {
        self.states.get(&node_id)?.outputs.get(output)
    }

    /// Full state of a node, for status and persistence.
    pub fn state(&self, node_id: NodeId) -> Option<&ComputedState> {
        self.states.get(&node_id)
    }

    /// Restore persisted state after a snapshot load. The behavior must
    /// already be attached; outputs are published without notification
    /// (the session re-pushes bridges afterwards).
    pub fn restore_state(
        &mut self,
        node_id: NodeId,
        properties: HashMap<String, Value>,
        outputs: HashMap<String, Value>,
    ) {
        if let Some(state) = self.states.get_mut(&node_id) {
            state.properties = properties;
            state.outputs = outputs;
        }
    }

    /// Number of attached computed nodes.
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Detach everything without per-node ceremony.
    pub fn clear(&mut self) {
        for (_, mut behavior) in self.behaviors.drain(..) {
            behavior.cleanup();
        }
        self.states.clear();
    }

    /// Write a delta into the node's state and collect the fallout.
    fn apply(&mut self, node_id: NodeId, delta: Option<Delta>) -> Applied {
        let Some(delta) = delta else {
            return Applied::default();
        };
        let mut applied = Applied {
            requests: delta.requests,
            ..Applied::default()
        };
        if let Some(state) = self.states.get_mut(&node_id) {
            for (name, value) in delta.outputs {
                state.outputs.insert(name.clone(), value.clone());
                applied.outputs.push((name, value));
            }
            for (name, value) in delta.properties {
                state.properties.insert(name, value);
            }
        }
        applied
    }
}

impl Default for ComputedEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeTypeRegistry;

    fn computed_node(type_id: &str) -> PatchNode {
        let registry = NodeTypeRegistry::with_builtins();
        PatchNode::new(registry.metadata(type_id).unwrap())
    }

    #[test]
    fn test_instantiate_is_idempotent() {
        let mut engine = ComputedEngine::with_builtins();
        let node = computed_node("scale");

        engine.instantiate(&node).unwrap();
        assert!(engine.has_state(node.id));
        assert_eq!(engine.len(), 1);

        let again = engine.instantiate(&node).unwrap();
        assert!(again.outputs.is_empty());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut engine = ComputedEngine::with_builtins();
        let registry = NodeTypeRegistry::with_builtins();
        // Native types have no behavior factory.
        let node = PatchNode::new(registry.metadata("oscillator").unwrap());
        assert!(engine.instantiate(&node).is_err());
    }

    #[test]
    fn test_input_updates_output_state() {
        let mut engine = ComputedEngine::with_builtins();
        let node = computed_node("scale");
        engine.instantiate(&node).unwrap();

        // Default mapping is [0,1] -> [0,100].
        let applied = engine.handle_input(node.id, "in", &Value::Float(0.5));
        assert_eq!(applied.outputs.len(), 1);
        assert_eq!(engine.output(node.id, "out"), Some(&Value::Float(50.0)));
    }

    #[test]
    fn test_destroy_drops_state_and_subscriptions() {
        let mut engine = ComputedEngine::with_builtins();
        let source = computed_node("random");
        let listener = computed_node("display");
        engine.instantiate(&source).unwrap();
        engine.instantiate(&listener).unwrap();
        engine.subscribe(source.id, "value", listener.id, "in");

        engine.destroy(listener.id);
        assert!(engine.subscribers(source.id, "value").is_empty());
        assert!(!engine.has_state(listener.id));
    }

    #[test]
    fn test_unsubscribe_matches_source_output() {
        let mut engine = ComputedEngine::with_builtins();
        let player = computed_node("sample-player");
        let listener = computed_node("display");
        engine.instantiate(&player).unwrap();
        engine.instantiate(&listener).unwrap();
        engine.subscribe(player.id, "position", listener.id, "in");
        engine.subscribe(player.id, "loaded", listener.id, "in");

        engine.unsubscribe(player.id, "position", listener.id, "in");
        assert!(engine.subscribers(player.id, "position").is_empty());
        assert_eq!(
            engine.subscribers(player.id, "loaded"),
            vec![(listener.id, "in".to_string())]
        );
    }

    #[test]
    fn test_input_to_detached_node_is_noop() {
        let mut engine = ComputedEngine::with_builtins();
        let applied = engine.handle_input(NodeId::new(), "in", &Value::Float(1.0));
        assert!(applied.outputs.is_empty());
    }
}
