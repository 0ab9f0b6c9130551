//! Edges and logical connections.
//!
//! An [`Edge`] is the user-authored wiring fact: source port to target
//! port. A [`LogicalConnection`] is the edge plus its runtime
//! classification, derived from port types and node domains. The
//! classification decides how the synchronizer wires the backend: direct
//! instance wiring, parameter modulation, a bridge, a reactive
//! subscription, or a trigger handshake. Logical connections are persisted
//! alongside edges so wiring can be replayed after a backend instance is
//! recreated.

use crate::core::error::{EdgeId, NodeId};
use crate::core::types::PortType;
use crate::registry::NodeDomain;
use serde::{Deserialize, Serialize};

/// An endpoint of an edge (node + port).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The node ID.
    pub node_id: NodeId,
    /// The port name on that node.
    pub port: String,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(node_id: NodeId, port: impl Into<String>) -> Self {
        Self {
            node_id,
            port: port.into(),
        }
    }
}

/// A directed edge between two ports in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// Source endpoint (output port).
    pub from: Endpoint,
    /// Target endpoint (input port).
    pub to: Endpoint,
}

impl Edge {
    /// Create a new edge.
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: EdgeId::new(),
            from,
            to,
        }
    }

    /// Create with a specific ID.
    pub fn with_id(mut self, id: EdgeId) -> Self {
        self.id = id;
        self
    }

    /// Whether this edge touches the given node.
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.from.node_id == node_id || self.to.node_id == node_id
    }
}

/// How an edge is realized at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// native→native, continuous port: direct backend-to-backend wiring
    SignalWire,
    /// native→native, control port: output wired into a named parameter
    ParamWire,
    /// computed↔native, control port: a bridge carries the scalar stream
    Bridged,
    /// computed↔computed: synchronous reactive subscription
    Reactive,
    /// any→trigger port: zero-stream bridge dispatching on rising edges
    Trigger,
}

/// An edge plus its runtime classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalConnection {
    /// The underlying edge.
    pub edge: Edge,
    /// How the synchronizer wires it.
    pub kind: ConnectionKind,
}

impl LogicalConnection {
    /// Classify an edge from the endpoint domains and the target port type.
    ///
    /// The source port type does not influence the wiring shape: a signal
    /// feeding a control input is still parameter modulation, and the
    /// compatibility relation has already rejected control→signal.
    pub fn classify(
        edge: Edge,
        from_domain: NodeDomain,
        to_domain: NodeDomain,
        to_port_type: PortType,
    ) -> Self {
        let kind = if to_port_type == PortType::Trigger {
            ConnectionKind::Trigger
        } else {
            match (from_domain, to_domain) {
                (NodeDomain::Native, NodeDomain::Native) => {
                    if to_port_type == PortType::Signal {
                        ConnectionKind::SignalWire
                    } else {
                        ConnectionKind::ParamWire
                    }
                }
                (NodeDomain::Computed, NodeDomain::Computed) => ConnectionKind::Reactive,
                _ => ConnectionKind::Bridged,
            }
        };
        Self { edge, kind }
    }

    /// Whether this connection is carried by a bridge object.
    pub fn is_bridged(&self) -> bool {
        matches!(self.kind, ConnectionKind::Bridged | ConnectionKind::Trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> Edge {
        Edge::new(
            Endpoint::new(NodeId::new(), "out"),
            Endpoint::new(NodeId::new(), "in"),
        )
    }

    #[test]
    fn test_classify_signal_wire() {
        let conn = LogicalConnection::classify(
            edge(),
            NodeDomain::Native,
            NodeDomain::Native,
            PortType::Signal,
        );
        assert_eq!(conn.kind, ConnectionKind::SignalWire);
    }

    #[test]
    fn test_classify_param_wire() {
        let conn = LogicalConnection::classify(
            edge(),
            NodeDomain::Native,
            NodeDomain::Native,
            PortType::Control,
        );
        assert_eq!(conn.kind, ConnectionKind::ParamWire);
    }

    #[test]
    fn test_classify_bridge_both_directions() {
        let a = LogicalConnection::classify(
            edge(),
            NodeDomain::Computed,
            NodeDomain::Native,
            PortType::Control,
        );
        let b = LogicalConnection::classify(
            edge(),
            NodeDomain::Native,
            NodeDomain::Computed,
            PortType::Control,
        );
        assert_eq!(a.kind, ConnectionKind::Bridged);
        assert_eq!(b.kind, ConnectionKind::Bridged);
        assert!(a.is_bridged());
    }

    #[test]
    fn test_classify_reactive() {
        let conn = LogicalConnection::classify(
            edge(),
            NodeDomain::Computed,
            NodeDomain::Computed,
            PortType::Control,
        );
        assert_eq!(conn.kind, ConnectionKind::Reactive);
        assert!(!conn.is_bridged());
    }

    #[test]
    fn test_trigger_beats_domain() {
        // A trigger input is a trigger connection no matter the domains.
        let conn = LogicalConnection::classify(
            edge(),
            NodeDomain::Native,
            NodeDomain::Native,
            PortType::Trigger,
        );
        assert_eq!(conn.kind, ConnectionKind::Trigger);
    }

    #[test]
    fn test_edge_touches() {
        let e = edge();
        assert!(e.touches(e.from.node_id));
        assert!(e.touches(e.to.node_id));
        assert!(!e.touches(NodeId::new()));
    }
}
