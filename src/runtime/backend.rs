//! The backend factory boundary.
//!
//! Native nodes are processed by an opaque external collaborator. The
//! engine only ever talks to it through [`BackendFactory`]: create an
//! instance, try a property update, wire instances together, push
//! parameter values, stop and destroy. Everything behind the trait is
//! invisible to the persisted model.
//!
//! [`InMemoryBackendFactory`] is the reference implementation: it simulates
//! instances and records every call, which is what the demo binary runs
//! against and what the test suite asserts lifecycle contracts with.

use crate::core::error::{BackendError, BackendResult, NodeId};
use crate::core::types::Value;
use crate::registry::NodeTypeMetadata;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Opaque token identifying a live backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendHandle(pub u64);

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Factory for opaque native processing instances.
///
/// Instantiation may fail; a failed create leaves the node without a
/// backend and the synchronizer retries on the next model change. A
/// `false` return from [`update_property`] signals that the instance
/// cannot absorb the change in place and must be destroyed and recreated.
///
/// [`update_property`]: BackendFactory::update_property
pub trait BackendFactory {
    /// Create an instance for a node.
    fn create(
        &mut self,
        node_id: NodeId,
        metadata: &NodeTypeMetadata,
        properties: &HashMap<String, Value>,
    ) -> BackendResult<BackendHandle>;

    /// Try to apply a property change to a live instance.
    ///
    /// Returns `false` when the instance cannot be updated in place.
    fn update_property(
        &mut self,
        handle: BackendHandle,
        metadata: &NodeTypeMetadata,
        name: &str,
        value: &Value,
    ) -> bool;

    /// Wire one instance's continuous output into another's signal input.
    fn connect_signal(&mut self, from: BackendHandle, to: BackendHandle) -> BackendResult<()>;

    /// Wire one instance's output into a named continuous parameter.
    fn connect_param(
        &mut self,
        from: BackendHandle,
        to: BackendHandle,
        param: &str,
    ) -> BackendResult<()>;

    /// Remove all wiring between two instances.
    fn disconnect(&mut self, from: BackendHandle, to: BackendHandle);

    /// Set the static value of a named continuous parameter.
    fn set_param(&mut self, handle: BackendHandle, param: &str, value: f64);

    /// Read back a parameter value, if the instance exposes it.
    fn param(&self, handle: BackendHandle, param: &str) -> Option<f64>;

    /// Stop a stoppable instance.
    fn stop(&mut self, handle: BackendHandle);

    /// Destroy an instance, releasing its resources.
    fn destroy(&mut self, handle: BackendHandle);

    /// Whether the instance is currently producing output.
    fn is_running(&self, handle: BackendHandle) -> bool;

    /// Downcast access for diagnostics and lifecycle assertions.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One recorded factory call, for lifecycle assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryCall {
    Create { node_id: NodeId, type_id: String },
    UpdateProperty { handle: BackendHandle, name: String },
    ConnectSignal { from: BackendHandle, to: BackendHandle },
    ConnectParam { from: BackendHandle, to: BackendHandle, param: String },
    Disconnect { from: BackendHandle, to: BackendHandle },
    SetParam { handle: BackendHandle, param: String, value: f64 },
    Stop { handle: BackendHandle },
    Destroy { handle: BackendHandle },
}

/// A simulated native instance.
#[derive(Debug, Clone)]
struct SimInstance {
    node_id: NodeId,
    type_id: String,
    single_shot: bool,
    running: bool,
    params: HashMap<String, f64>,
    /// Outgoing wiring: (target, Some(param) for parameter wiring).
    wires: Vec<(BackendHandle, Option<String>)>,
}

/// In-memory reference backend.
///
/// Simulates instance lifecycles faithfully enough to exercise the
/// synchronizer: single-shot instances reject in-place property updates,
/// parameter wiring and static values are tracked, and every call is
/// appended to an inspectable log. Types listed via [`fail_type`] refuse
/// creation, which is how creation-retry behavior is tested.
///
/// [`fail_type`]: InMemoryBackendFactory::fail_type
#[derive(Default)]
pub struct InMemoryBackendFactory {
    next_handle: u64,
    instances: HashMap<BackendHandle, SimInstance>,
    calls: Vec<FactoryCall>,
    failing_types: HashSet<String>,
}

impl InMemoryBackendFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make creation fail for a type id (until [`heal_type`] is called).
    ///
    /// [`heal_type`]: InMemoryBackendFactory::heal_type
    pub fn fail_type(&mut self, type_id: impl Into<String>) {
        self.failing_types.insert(type_id.into());
    }

    /// Allow creation for a previously failing type id.
    pub fn heal_type(&mut self, type_id: &str) {
        self.failing_types.remove(type_id);
    }

    /// The full ordered call log.
    pub fn calls(&self) -> &[FactoryCall] {
        &self.calls
    }

    /// Number of create calls issued so far.
    pub fn create_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, FactoryCall::Create { .. }))
            .count()
    }

    /// Number of stop/disconnect/destroy calls touching the given handle.
    pub fn teardown_calls_for(&self, handle: BackendHandle) -> usize {
        self.calls
            .iter()
            .filter(|c| match c {
                FactoryCall::Stop { handle: h } | FactoryCall::Destroy { handle: h } => *h == handle,
                FactoryCall::Disconnect { from, to } => *from == handle || *to == handle,
                _ => false,
            })
            .count()
    }

    /// Whether an instance is still alive.
    pub fn is_alive(&self, handle: BackendHandle) -> bool {
        self.instances.contains_key(&handle)
    }

    /// Outgoing wires of an instance, for wiring assertions.
    pub fn wires(&self, handle: BackendHandle) -> Vec<(BackendHandle, Option<String>)> {
        self.instances
            .get(&handle)
            .map(|i| i.wires.clone())
            .unwrap_or_default()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl BackendFactory for InMemoryBackendFactory {
    fn create(
        &mut self,
        node_id: NodeId,
        metadata: &NodeTypeMetadata,
        properties: &HashMap<String, Value>,
    ) -> BackendResult<BackendHandle> {
        if self.failing_types.contains(&metadata.id) {
            return Err(BackendError::CreationFailed {
                node_id,
                type_id: metadata.id.clone(),
                reason: "simulated creation failure".to_string(),
            });
        }

        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);

        let params = properties
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.clone(), v)))
            .collect();

        self.instances.insert(
            handle,
            SimInstance {
                node_id,
                type_id: metadata.id.clone(),
                single_shot: metadata.single_shot,
                running: true,
                params,
                wires: Vec::new(),
            },
        );
        self.calls.push(FactoryCall::Create {
            node_id,
            type_id: metadata.id.clone(),
        });
        Ok(handle)
    }

    fn update_property(
        &mut self,
        handle: BackendHandle,
        _metadata: &NodeTypeMetadata,
        name: &str,
        value: &Value,
    ) -> bool {
        self.calls.push(FactoryCall::UpdateProperty {
            handle,
            name: name.to_string(),
        });
        let Some(instance) = self.instances.get_mut(&handle) else {
            return false;
        };
        // Single-shot sources cannot absorb changes after start.
        if instance.single_shot {
            return false;
        }
        if let Some(v) = value.as_f64() {
            instance.params.insert(name.to_string(), v);
        }
        true
    }

    fn connect_signal(&mut self, from: BackendHandle, to: BackendHandle) -> BackendResult<()> {
        self.calls.push(FactoryCall::ConnectSignal { from, to });
        if !self.instances.contains_key(&from) || !self.instances.contains_key(&to) {
            return Err(BackendError::Other(format!(
                "connect_signal on dead handle {} -> {}",
                from, to
            )));
        }
        if let Some(instance) = self.instances.get_mut(&from) {
            instance.wires.push((to, None));
        }
        Ok(())
    }

    fn connect_param(
        &mut self,
        from: BackendHandle,
        to: BackendHandle,
        param: &str,
    ) -> BackendResult<()> {
        self.calls.push(FactoryCall::ConnectParam {
            from,
            to,
            param: param.to_string(),
        });
        if !self.instances.contains_key(&to) {
            return Err(BackendError::Other(format!(
                "connect_param on dead handle {}",
                to
            )));
        }
        if let Some(instance) = self.instances.get_mut(&from) {
            instance.wires.push((to, Some(param.to_string())));
            Ok(())
        } else {
            Err(BackendError::Other(format!(
                "connect_param on dead handle {}",
                from
            )))
        }
    }

    fn disconnect(&mut self, from: BackendHandle, to: BackendHandle) {
        self.calls.push(FactoryCall::Disconnect { from, to });
        if let Some(instance) = self.instances.get_mut(&from) {
            instance.wires.retain(|(target, _)| *target != to);
        }
    }

    fn set_param(&mut self, handle: BackendHandle, param: &str, value: f64) {
        self.calls.push(FactoryCall::SetParam {
            handle,
            param: param.to_string(),
            value,
        });
        if let Some(instance) = self.instances.get_mut(&handle) {
            instance.params.insert(param.to_string(), value);
        }
    }

    fn param(&self, handle: BackendHandle, param: &str) -> Option<f64> {
        self.instances
            .get(&handle)
            .and_then(|i| i.params.get(param).copied())
    }

    fn stop(&mut self, handle: BackendHandle) {
        self.calls.push(FactoryCall::Stop { handle });
        if let Some(instance) = self.instances.get_mut(&handle) {
            instance.running = false;
        }
    }

    fn destroy(&mut self, handle: BackendHandle) {
        self.calls.push(FactoryCall::Destroy { handle });
        self.instances.remove(&handle);
    }

    fn is_running(&self, handle: BackendHandle) -> bool {
        self.instances
            .get(&handle)
            .map(|i| i.running)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeTypeRegistry;

    #[test]
    fn test_create_and_destroy() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut factory = InMemoryBackendFactory::new();
        let metadata = registry.metadata("gain").unwrap();

        let handle = factory
            .create(NodeId::new(), metadata, &metadata.default_properties())
            .unwrap();
        assert!(factory.is_alive(handle));
        assert!(factory.is_running(handle));
        assert_eq!(factory.param(handle, "level"), Some(1.0));

        factory.destroy(handle);
        assert!(!factory.is_alive(handle));
    }

    #[test]
    fn test_single_shot_rejects_update() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut factory = InMemoryBackendFactory::new();
        let osc = registry.metadata("oscillator").unwrap();
        let gain = registry.metadata("gain").unwrap();

        let osc_handle = factory
            .create(NodeId::new(), osc, &osc.default_properties())
            .unwrap();
        let gain_handle = factory
            .create(NodeId::new(), gain, &gain.default_properties())
            .unwrap();

        assert!(!factory.update_property(osc_handle, osc, "frequency", &Value::Float(880.0)));
        assert!(factory.update_property(gain_handle, gain, "level", &Value::Float(0.5)));
        assert_eq!(factory.param(gain_handle, "level"), Some(0.5));
    }

    #[test]
    fn test_failure_injection() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut factory = InMemoryBackendFactory::new();
        let metadata = registry.metadata("noise").unwrap();

        factory.fail_type("noise");
        assert!(factory
            .create(NodeId::new(), metadata, &metadata.default_properties())
            .is_err());

        factory.heal_type("noise");
        assert!(factory
            .create(NodeId::new(), metadata, &metadata.default_properties())
            .is_ok());
    }

    #[test]
    fn test_wiring_log() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut factory = InMemoryBackendFactory::new();
        let osc = registry.metadata("oscillator").unwrap();
        let gain = registry.metadata("gain").unwrap();

        let a = factory
            .create(NodeId::new(), osc, &osc.default_properties())
            .unwrap();
        let b = factory
            .create(NodeId::new(), gain, &gain.default_properties())
            .unwrap();

        factory.connect_signal(a, b).unwrap();
        assert_eq!(factory.wires(a), vec![(b, None)]);

        factory.disconnect(a, b);
        assert!(factory.wires(a).is_empty());
        assert_eq!(factory.teardown_calls_for(a), 1);
    }
}
