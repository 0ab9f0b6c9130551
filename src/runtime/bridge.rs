//! Bridges between computed outputs and native parameters.
//!
//! A bridge is a volatile runtime object that carries a computed node's
//! output value into a native node's continuous parameter, or stands in as
//! the handshake for a trigger connection. Bridges are owned exclusively
//! by the [`BridgeManager`], keyed by (source, target, port), and never
//! outlive the connection that created them.
//!
//! The manager does not touch backends itself: pushing a value yields
//! [`BridgeEffect`]s that the session dispatches, which keeps backend
//! handles out of the bridge registry and lets instances be recreated
//! without invalidating bridges.

use crate::core::error::NodeId;
use crate::core::types::Value;
use crate::registry::NodeDomain;
use log::debug;

/// Identity of a bridge: one per (source, target, target port).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BridgeKey {
    /// Source node (the side producing values).
    pub source: NodeId,
    /// Target node (the side consuming them).
    pub target: NodeId,
    /// Target port or parameter name, when the connection names one.
    pub port: Option<String>,
}

/// What a bridge carries.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeKind {
    /// Continuously-updated scalar feeding a named target parameter.
    Continuous { param: String },
    /// Constant-zero handshake; rising pushes dispatch a discrete action.
    Trigger { input: String },
}

/// A live bridge.
#[derive(Debug, Clone)]
pub struct Bridge {
    /// Registry key.
    pub key: BridgeKey,
    /// Continuous or trigger.
    pub kind: BridgeKind,
    /// Which source output feeds this bridge.
    pub source_output: String,
    /// Domain of the target node, fixed at creation.
    pub target_domain: NodeDomain,
    /// Last value pushed through the continuous stream.
    pub last_value: f64,
}

/// An action the session must take after a push.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEffect {
    /// Set a native instance's continuous parameter.
    SetParam {
        target: NodeId,
        param: String,
        value: f64,
    },
    /// Rising edge into a single-shot native source: destroy and recreate.
    RestartSource { target: NodeId },
    /// Rising edge into a computed node: forward to its trigger path.
    ForwardTrigger {
        target: NodeId,
        input: String,
        value: Value,
    },
}

/// Owner of all live bridges.
#[derive(Debug, Default)]
pub struct BridgeManager {
    bridges: Vec<Bridge>,
}

impl BridgeManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a continuous bridge and return the effect applying its
    /// initial value (the source's current output).
    pub fn create_continuous(
        &mut self,
        source: NodeId,
        source_output: impl Into<String>,
        target: NodeId,
        param: impl Into<String>,
        initial: f64,
    ) -> BridgeEffect {
        let param = param.into();
        let bridge = Bridge {
            key: BridgeKey {
                source,
                target,
                port: Some(param.clone()),
            },
            kind: BridgeKind::Continuous {
                param: param.clone(),
            },
            source_output: source_output.into(),
            target_domain: NodeDomain::Native,
            last_value: initial,
        };
        debug!("bridge {} -> {}.{} created", source, target, param);
        self.bridges.push(bridge);
        BridgeEffect::SetParam {
            target,
            param,
            value: initial,
        }
    }

    /// Create a trigger bridge. Its stream value stays at zero; it exists
    /// as the connection handshake.
    pub fn create_trigger(
        &mut self,
        source: NodeId,
        source_output: impl Into<String>,
        target: NodeId,
        input: impl Into<String>,
        target_domain: NodeDomain,
    ) {
        let input = input.into();
        self.bridges.push(Bridge {
            key: BridgeKey {
                source,
                target,
                port: Some(input.clone()),
            },
            kind: BridgeKind::Trigger { input },
            source_output: source_output.into(),
            target_domain,
            last_value: 0.0,
        });
    }

    /// Push a changed source output into every bridge fed by it.
    ///
    /// Continuous bridges update their stream and emit a parameter write.
    /// Trigger bridges keep their zero stream; a value > 0 is a rising
    /// edge and dispatches by target domain.
    pub fn push_from_source(
        &mut self,
        source: NodeId,
        output: &str,
        value: &Value,
    ) -> Vec<BridgeEffect> {
        let mut effects = Vec::new();
        for bridge in self
            .bridges
            .iter_mut()
            .filter(|b| b.key.source == source && b.source_output == output)
        {
            match &bridge.kind {
                BridgeKind::Continuous { param } => {
                    if let Some(v) = value.as_f64() {
                        bridge.last_value = v;
                        effects.push(BridgeEffect::SetParam {
                            target: bridge.key.target,
                            param: param.clone(),
                            value: v,
                        });
                    }
                }
                BridgeKind::Trigger { input } => {
                    if value.is_rising() {
                        match bridge.target_domain {
                            NodeDomain::Native => effects.push(BridgeEffect::RestartSource {
                                target: bridge.key.target,
                            }),
                            NodeDomain::Computed => effects.push(BridgeEffect::ForwardTrigger {
                                target: bridge.key.target,
                                input: input.clone(),
                                value: value.clone(),
                            }),
                        }
                    }
                }
            }
        }
        effects
    }

    /// Re-emit the current value of a continuous bridge, if it exists.
    ///
    /// Used for the one deferred re-push after creation that covers the
    /// race between connection setup and output availability.
    pub fn repush(&self, source: NodeId, target: NodeId, port: &str) -> Option<BridgeEffect> {
        self.bridges
            .iter()
            .find(|b| {
                b.key.source == source && b.key.target == target && b.key.port.as_deref() == Some(port)
            })
            .and_then(|b| match &b.kind {
                BridgeKind::Continuous { param } => Some(BridgeEffect::SetParam {
                    target,
                    param: param.clone(),
                    value: b.last_value,
                }),
                BridgeKind::Trigger { .. } => None,
            })
    }

    /// Remove the bridge for a specific connection.
    pub fn remove(&mut self, source: NodeId, target: NodeId, port: &str) -> Option<Bridge> {
        let pos = self.bridges.iter().position(|b| {
            b.key.source == source && b.key.target == target && b.key.port.as_deref() == Some(port)
        })?;
        Some(self.bridges.remove(pos))
    }

    /// Remove every bridge mentioning a node, on node removal.
    pub fn remove_for_node(&mut self, node_id: NodeId) -> usize {
        let before = self.bridges.len();
        self.bridges
            .retain(|b| b.key.source != node_id && b.key.target != node_id);
        before - self.bridges.len()
    }

    /// All live bridges.
    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Number of live bridges.
    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    /// Whether no bridges exist.
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    /// Clear all bridges.
    pub fn clear(&mut self) {
        self.bridges.clear();
    }
}
