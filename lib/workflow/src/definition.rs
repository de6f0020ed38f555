//! Workflow definition types.
//!
//! A workflow is a named automation owned by a project:
//! - Metadata (name, description, enabled, timestamps)
//! - A run strategy (how executions are initiated)
//! - A directed graph of nodes with exactly one trigger
//!
//! Definitions are immutable during a single execution: the engine copies
//! node state into the execution at start, so concurrent edits produce a new
//! version without disturbing in-flight runs.

use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::{ProjectId, WorkflowId};

/// How executions of a workflow are initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStrategy {
    /// User-initiated runs only.
    Manual,
    /// Runs created at computed future times.
    Schedule,
    /// Runs created by inbound webhook deliveries.
    Webhook,
    /// Runs created by polling an external service for new records.
    Poll,
}

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    pub description: Option<String>,
    /// Whether this workflow is enabled.
    pub enabled: bool,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The project that owns this workflow.
    pub project_id: ProjectId,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// How executions are initiated.
    pub strategy: RunStrategy,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
}

impl Workflow {
    /// Creates a new workflow with the given name and strategy.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>, strategy: RunStrategy) -> Self {
        Self {
            id: WorkflowId::new(),
            project_id,
            metadata: WorkflowMetadata::new(name),
            strategy,
            graph: WorkflowGraph::new(),
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns whether the workflow is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.metadata.enabled
    }

    /// Enables the workflow.
    pub fn enable(&mut self) {
        self.metadata.enabled = true;
        self.touch();
    }

    /// Disables the workflow.
    pub fn disable(&mut self) {
        self.metadata.enabled = false;
        self.touch();
    }

    /// Validates the workflow graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has no single trigger or contains
    /// cycles.
    pub fn validate(&self) -> Result<(), crate::error::GraphError> {
        self.graph.validate()
    }

    /// Marks the workflow as updated.
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{AppBinding, Node, NodeKind};
    use serde_json::json;

    fn poll_workflow() -> Workflow {
        let mut workflow = Workflow::new(ProjectId::new(), "Inbox digest", RunStrategy::Poll);
        let trigger = Node::new(
            "New message",
            NodeKind::Trigger,
            AppBinding::new("mail", "new_message"),
            json!({}),
        );
        let action = Node::new(
            "Notify",
            NodeKind::Action,
            AppBinding::new("chat", "post"),
            json!({"channel": "#inbox"}),
        );
        let (t, a) = (trigger.id, action.id);
        workflow.graph.add_node(trigger);
        workflow.graph.add_node(action);
        workflow.graph.add_edge(Edge::new(t, a)).unwrap();
        workflow
    }

    #[test]
    fn workflow_creation() {
        let workflow = poll_workflow();
        assert_eq!(workflow.name(), "Inbox digest");
        assert!(workflow.is_enabled());
        assert_eq!(workflow.strategy, RunStrategy::Poll);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn workflow_enable_disable() {
        let mut workflow = poll_workflow();

        workflow.disable();
        assert!(!workflow.is_enabled());

        workflow.enable();
        assert!(workflow.is_enabled());
    }

    #[test]
    fn workflow_serde_roundtrip() {
        let workflow = poll_workflow();
        let json = serde_json::to_string(&workflow).expect("serialize");
        let mut parsed: Workflow = serde_json::from_str(&json).expect("deserialize");
        parsed.graph.rebuild_index_map();

        assert_eq!(workflow.id, parsed.id);
        assert_eq!(workflow.name(), parsed.name());
        assert_eq!(parsed.graph.node_count(), 2);
    }
}
