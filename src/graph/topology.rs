//! Topological analysis of the patch graph.
//!
//! The model allows feedback wiring, so analysis is diagnostic rather than
//! gatekeeping: the inspector reports reachability, upstream/downstream
//! closures, and feedback loops. The session logs a warning when a new
//! edge closes a loop, and the propagation pipeline bounds the damage with
//! a depth guard.

use crate::core::error::NodeId;
use crate::graph::model::PatchGraph;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Analyzer over a borrowed graph.
pub struct TopologyInspector<'a> {
    graph: &'a PatchGraph,
    digraph: DiGraph<NodeId, ()>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl<'a> TopologyInspector<'a> {
    /// Build an inspector for the given graph.
    pub fn new(graph: &'a PatchGraph) -> Self {
        let mut digraph = DiGraph::new();
        let mut indices = HashMap::new();

        for id in graph.node_ids() {
            indices.insert(id, digraph.add_node(id));
        }
        for conn in graph.connections() {
            let from = indices[&conn.edge.from.node_id];
            let to = indices[&conn.edge.to.node_id];
            digraph.add_edge(from, to, ());
        }

        Self {
            graph,
            digraph,
            indices,
        }
    }

    /// Check whether `target` is reachable from `start` following edges.
    pub fn is_reachable(&self, start: NodeId, target: NodeId) -> bool {
        match (self.indices.get(&start), self.indices.get(&target)) {
            (Some(&s), Some(&t)) => has_path_connecting(&self.digraph, s, t, None),
            _ => false,
        }
    }

    /// Find all feedback loops: strongly connected components with more
    /// than one node, plus single nodes with a self edge.
    pub fn feedback_loops(&self) -> Vec<Vec<NodeId>> {
        tarjan_scc(&self.digraph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .map(|&ix| self.digraph.contains_edge(ix, ix))
                        .unwrap_or(false)
            })
            .map(|scc| scc.into_iter().map(|ix| self.digraph[ix]).collect())
            .collect()
    }

    /// Whether the graph contains any feedback loop.
    pub fn has_feedback(&self) -> bool {
        !self.feedback_loops().is_empty()
    }

    /// All nodes downstream of the given node.
    pub fn downstream(&self, node_id: NodeId) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&other| other != node_id && self.is_reachable(node_id, other))
            .collect()
    }

    /// All nodes upstream of the given node.
    pub fn upstream(&self, node_id: NodeId) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&other| other != node_id && self.is_reachable(other, node_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::PatchNode;
    use crate::registry::NodeTypeRegistry;

    fn chain() -> (PatchGraph, NodeId, NodeId, NodeId) {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();
        let a = graph.add_node(PatchNode::new(registry.metadata("oscillator").unwrap()));
        let b = graph.add_node(PatchNode::new(registry.metadata("gain").unwrap()));
        let c = graph.add_node(PatchNode::new(registry.metadata("destination").unwrap()));
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "out", c, "in").unwrap();
        (graph, a, b, c)
    }

    #[test]
    fn test_reachability() {
        let (graph, a, _, c) = chain();
        let inspector = TopologyInspector::new(&graph);
        assert!(inspector.is_reachable(a, c));
        assert!(!inspector.is_reachable(c, a));
    }

    #[test]
    fn test_upstream_downstream() {
        let (graph, a, b, c) = chain();
        let inspector = TopologyInspector::new(&graph);

        let down = inspector.downstream(a);
        assert_eq!(down.len(), 2);
        assert!(down.contains(&b) && down.contains(&c));

        let up = inspector.upstream(c);
        assert_eq!(up.len(), 2);
        assert!(up.contains(&a) && up.contains(&b));
    }

    #[test]
    fn test_feedback_detection() {
        let registry = NodeTypeRegistry::with_builtins();
        let mut graph = PatchGraph::new();
        let a = graph.add_node(PatchNode::new(registry.metadata("gain").unwrap()));
        let b = graph.add_node(PatchNode::new(registry.metadata("delay").unwrap()));
        graph.connect(a, "out", b, "in").unwrap();

        let inspector = TopologyInspector::new(&graph);
        assert!(!inspector.has_feedback());
        drop(inspector);

        graph.connect(b, "out", a, "in").unwrap();
        let inspector = TopologyInspector::new(&graph);
        assert!(inspector.has_feedback());
        let loops = inspector.feedback_loops();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 2);
    }
}
