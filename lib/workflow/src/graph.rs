//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed acyclic graphs where nodes are trigger/action
//! steps and edges are identified source→target connections. The graph is
//! the immutable structural view the engine reads while advancing an
//! execution: outgoing-edge resolution for branching, predecessor lookup
//! for readiness, and trigger-node location.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use switchyard_core::EdgeId;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    #[serde(with = "graph_serde")]
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    #[serde(skip)]
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph and returns its id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        node_id
    }

    /// Removes a node from the graph, along with its edges.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let index = self.node_index_map.remove(&node_id)?;
        let node = self.graph.remove_node(index);
        // Removal invalidates indices, so the map must be rebuilt.
        self.rebuild_index_map();
        node
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns a mutable reference to a node by its ID.
    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight_mut(*index)
    }

    /// Connects two nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is not in the graph.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        let source_index = *self
            .node_index_map
            .get(&edge.source)
            .ok_or(GraphError::NodeNotFound { node_id: edge.source })?;

        let target_index = *self
            .node_index_map
            .get(&edge.target)
            .ok_or(GraphError::NodeNotFound { node_id: edge.target })?;

        let edge_id = edge.id;
        self.graph.add_edge(source_index, target_index, edge);
        Ok(edge_id)
    }

    /// Disconnects an edge by id.
    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let index = self
            .graph
            .edge_references()
            .find(|e| e.weight().id == edge_id)
            .map(|e| e.id())?;
        self.graph.remove_edge(index)
    }

    /// Returns all nodes in the graph, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all edges in the graph.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the edge with the given id, if present.
    #[must_use]
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.graph.edge_weights().find(|e| e.id == edge_id)
    }

    /// Returns the edges leaving a node.
    ///
    /// Multiple outgoing edges are branches (decide nodes) or fan-out
    /// (standard nodes).
    #[must_use]
    pub fn outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .map(|e| e.weight())
            .collect()
    }

    /// Returns the edges entering a node.
    #[must_use]
    pub fn incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, Direction::Incoming)
            .map(|e| e.weight())
            .collect()
    }

    /// Returns the workflow's single trigger node.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one trigger node exists.
    pub fn trigger_node(&self) -> Result<&Node, GraphError> {
        let mut triggers = self.nodes().filter(|n| n.is_trigger());
        let first = triggers.next().ok_or(GraphError::TriggerCount { found: 0 })?;
        if triggers.next().is_some() {
            let found = self.nodes().filter(|n| n.is_trigger()).count();
            return Err(GraphError::TriggerCount { found });
        }
        Ok(first)
    }

    /// Validates the workflow graph.
    ///
    /// Checks:
    /// - Exactly one trigger node
    /// - No cycles
    ///
    /// # Errors
    ///
    /// Returns an error describing the validation failure.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.trigger_node()?;

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(GraphError::CycleDetected);
        }

        Ok(())
    }

    /// Rebuilds the node index map after deserialization or node removal.
    pub fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom serde for petgraph DiGraph.
///
/// Edges carry their endpoints, so the serialized form is just the two
/// flat lists; connectivity is rebuilt from edge endpoints on load.
mod graph_serde {
    use super::*;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeStruct;

    pub fn serialize<S>(graph: &DiGraph<Node, Edge>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<_> = graph.node_weights().cloned().collect();
        let edges: Vec<_> = graph.edge_weights().cloned().collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DiGraph<Node, Edge>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = DiGraph<Node, Edge>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a workflow graph with nodes and edges")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut nodes: Option<Vec<Node>> = None;
                let mut edges: Option<Vec<Edge>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nodes" => nodes = Some(map.next_value()?),
                        "edges" => edges = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }

                let nodes = nodes.unwrap_or_default();
                let edges = edges.unwrap_or_default();

                let mut graph = DiGraph::new();
                let mut id_to_index = HashMap::new();

                for node in nodes {
                    let id = node.id;
                    let index = graph.add_node(node);
                    id_to_index.insert(id, index);
                }

                for edge in edges {
                    let (Some(&source_idx), Some(&target_idx)) =
                        (id_to_index.get(&edge.source), id_to_index.get(&edge.target))
                    else {
                        continue;
                    };
                    graph.add_edge(source_idx, target_idx, edge);
                }

                Ok(graph)
            }
        }

        deserializer.deserialize_struct("Graph", &["nodes", "edges"], GraphVisitor)
    }
}
