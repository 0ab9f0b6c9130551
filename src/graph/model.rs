//! The patch graph model.
//!
//! `PatchGraph` is the persisted entity store: nodes, edges, and the
//! logical connections derived from them. It validates every requested
//! mutation up front so an invalid command leaves no partial state, but it
//! knows nothing about backend instances, bridges, or history — those
//! react to this model from the outside.

use crate::core::error::{EdgeId, GraphError, GraphResult, NodeId, ValidationError};
use crate::graph::connection::{Edge, Endpoint, LogicalConnection};
use crate::graph::node::PatchNode;
use indexmap::IndexMap;

/// The central graph data structure.
///
/// Uses IndexMap to maintain insertion order for consistent iteration.
#[derive(Debug, Clone, Default)]
pub struct PatchGraph {
    /// All nodes in the graph, indexed by ID.
    nodes: IndexMap<NodeId, PatchNode>,
    /// All connections, each wrapping its edge.
    connections: Vec<LogicalConnection>,
}

impl PatchGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Node Management
    // ========================================================================

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: PatchNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node, cascading to every edge that touches it.
    ///
    /// Returns the node and the removed connections so the caller can
    /// record inverse patches and tear down runtime objects.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<(PatchNode, Vec<LogicalConnection>)> {
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(GraphError::NodeNotFound(id))?;

        let mut removed = Vec::new();
        self.connections.retain(|conn| {
            if conn.edge.touches(id) {
                removed.push(conn.clone());
                false
            } else {
                true
            }
        });

        Ok((node, removed))
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> GraphResult<&PatchNode> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut PatchNode> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Check if a node exists.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &PatchNode> {
        self.nodes.values()
    }

    /// Get all node IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Edge Management
    // ========================================================================

    /// Create an edge between two ports.
    ///
    /// Validation runs before any mutation: both endpoints must exist, both
    /// ports must be declared in the node schemas, and the port types must
    /// satisfy the compatibility relation. The returned connection carries
    /// the runtime classification derived from the endpoint domains.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: impl Into<String>,
        to_node: NodeId,
        to_port: impl Into<String>,
    ) -> Result<LogicalConnection, crate::core::error::NaadaError> {
        let from_port = from_port.into();
        let to_port = to_port.into();

        let from = self.node(from_node)?;
        let to = self.node(to_node)?;

        let from_def =
            from.schema
                .get_output(&from_port)
                .ok_or_else(|| ValidationError::PortNotFound {
                    node_id: from_node,
                    port: from_port.clone(),
                })?;
        let to_def =
            to.schema
                .get_input(&to_port)
                .ok_or_else(|| ValidationError::PortNotFound {
                    node_id: to_node,
                    port: to_port.clone(),
                })?;

        if !from_def.port_type.compatible_with(&to_def.port_type) {
            return Err(ValidationError::IncompatiblePorts {
                from_type: from_def.port_type,
                to_type: to_def.port_type,
            }
            .into());
        }

        if self
            .find_edge(from_node, &from_port, to_node, &to_port)
            .is_some()
        {
            return Err(ValidationError::DuplicateEdge.into());
        }

        let edge = Edge::new(
            Endpoint::new(from_node, from_port),
            Endpoint::new(to_node, to_port),
        );
        let connection =
            LogicalConnection::classify(edge, from.domain(), to.domain(), to_def.port_type);

        self.connections.push(connection.clone());
        Ok(connection)
    }

    /// Insert a pre-built connection (snapshot load, redo replay).
    ///
    /// Skips validation; the connection was validated when first created.
    pub fn insert_connection(&mut self, connection: LogicalConnection) {
        self.connections.push(connection);
    }

    /// Remove an edge by ID.
    pub fn disconnect(&mut self, id: EdgeId) -> GraphResult<LogicalConnection> {
        let pos = self
            .connections
            .iter()
            .position(|c| c.edge.id == id)
            .ok_or(GraphError::EdgeNotFound(id))?;
        Ok(self.connections.remove(pos))
    }

    /// Find an edge by its endpoints.
    pub fn find_edge(
        &self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Option<&LogicalConnection> {
        self.connections.iter().find(|c| {
            c.edge.from.node_id == from_node
                && c.edge.from.port == from_port
                && c.edge.to.node_id == to_node
                && c.edge.to.port == to_port
        })
    }

    /// Get a connection by edge ID.
    pub fn connection(&self, id: EdgeId) -> GraphResult<&LogicalConnection> {
        self.connections
            .iter()
            .find(|c| c.edge.id == id)
            .ok_or(GraphError::EdgeNotFound(id))
    }

    /// Get all connections.
    pub fn connections(&self) -> &[LogicalConnection] {
        &self.connections
    }

    /// Get all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.connections.iter().map(|c| &c.edge)
    }

    /// Get all connections leaving a node.
    pub fn connections_from(&self, node_id: NodeId) -> impl Iterator<Item = &LogicalConnection> {
        self.connections
            .iter()
            .filter(move |c| c.edge.from.node_id == node_id)
    }

    /// Get all connections entering a node.
    pub fn connections_to(&self, node_id: NodeId) -> impl Iterator<Item = &LogicalConnection> {
        self.connections
            .iter()
            .filter(move |c| c.edge.to.node_id == node_id)
    }

    /// Get every connection that touches a node, incoming and outgoing.
    pub fn connections_of(&self, node_id: NodeId) -> Vec<LogicalConnection> {
        self.connections
            .iter()
            .filter(|c| c.edge.touches(node_id))
            .cloned()
            .collect()
    }

    /// Get the number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clear all nodes and connections.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NaadaError;
    use crate::core::types::Value;
    use crate::graph::connection::ConnectionKind;
    use crate::registry::NodeTypeRegistry;

    fn make(registry: &NodeTypeRegistry, type_id: &str) -> PatchNode {
        PatchNode::new(registry.metadata(type_id).unwrap())
    }

    #[test]
    fn test_add_remove_node() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let id = graph.add_node(make(&registry, "gain"));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.has_node(id));

        graph.remove_node(id).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert!(!graph.has_node(id));
    }

    #[test]
    fn test_connect_and_classify() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let osc = graph.add_node(make(&registry, "oscillator"));
        let gain = graph.add_node(make(&registry, "gain"));

        let conn = graph.connect(osc, "out", gain, "in").unwrap();
        assert_eq!(conn.kind, ConnectionKind::SignalWire);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_control_into_signal_rejected() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let scale = graph.add_node(make(&registry, "scale"));
        let gain = graph.add_node(make(&registry, "gain"));

        let result = graph.connect(scale, "out", gain, "in");
        assert!(matches!(
            result,
            Err(NaadaError::Validation(
                ValidationError::IncompatiblePorts { .. }
            ))
        ));
        // Rejected before mutation: no partial state.
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_unknown_port_rejected() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let osc = graph.add_node(make(&registry, "oscillator"));
        let gain = graph.add_node(make(&registry, "gain"));

        let result = graph.connect(osc, "nope", gain, "in");
        assert!(matches!(
            result,
            Err(NaadaError::Validation(ValidationError::PortNotFound { .. }))
        ));
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let osc = graph.add_node(make(&registry, "oscillator"));
        let gain = graph.add_node(make(&registry, "gain"));

        graph.connect(osc, "out", gain, "in").unwrap();
        let result = graph.connect(osc, "out", gain, "in");
        assert!(matches!(
            result,
            Err(NaadaError::Validation(ValidationError::DuplicateEdge))
        ));
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let osc = graph.add_node(make(&registry, "oscillator"));
        let gain = graph.add_node(make(&registry, "gain"));
        let dest = graph.add_node(make(&registry, "destination"));

        graph.connect(osc, "out", gain, "in").unwrap();
        graph.connect(gain, "out", dest, "in").unwrap();

        let (_, removed) = graph.remove_node(gain).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.has_node(osc));
        assert!(graph.has_node(dest));
    }

    #[test]
    fn test_property_updates() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let osc = graph.add_node(make(&registry, "oscillator"));
        graph
            .node_mut(osc)
            .unwrap()
            .set_property("frequency", Value::Float(880.0));
        assert_eq!(
            graph.node(osc).unwrap().property("frequency"),
            Some(Value::Float(880.0))
        );
    }

    #[test]
    fn test_feedback_wiring_allowed() {
        // Audio graphs legitimately feed back; the model does not reject
        // cycles. The propagation pipeline bounds them at runtime.
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();

        let a = graph.add_node(make(&registry, "gain"));
        let b = graph.add_node(make(&registry, "delay"));

        graph.connect(a, "out", b, "in").unwrap();
        assert!(graph.connect(b, "out", a, "in").is_ok());
    }
}
