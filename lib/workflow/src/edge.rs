//! Edge types for workflow graphs.
//!
//! Edges are directed, identified connections between nodes. The id is
//! stable across workflow edits; decide branches reference edges by id from
//! persisted node config, so ids must survive label and layout changes.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use switchyard_core::EdgeId;

/// A directed edge between two nodes in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Stable identifier for this edge.
    pub id: EdgeId,
    /// The node this edge leaves.
    pub source: NodeId,
    /// The node this edge enters.
    pub target: NodeId,
}

impl Edge {
    /// Creates a new edge with a fresh id.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
        }
    }

    /// Creates an edge with a specific id.
    #[must_use]
    pub fn with_id(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self { id, source, target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_connects_nodes() {
        let source = NodeId::new();
        let target = NodeId::new();
        let edge = Edge::new(source, target);

        assert_eq!(edge.source, source);
        assert_eq!(edge.target, target);
    }

    #[test]
    fn edge_ids_are_unique() {
        let source = NodeId::new();
        let target = NodeId::new();
        let a = Edge::new(source, target);
        let b = Edge::new(source, target);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn edge_serde_roundtrip() {
        let edge = Edge::new(NodeId::new(), NodeId::new());
        let json = serde_json::to_string(&edge).expect("serialize");
        let parsed: Edge = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(edge, parsed);
    }
}
