//! Execution state for workflow runs.
//!
//! An execution is one run of a workflow. It carries its own copy of the
//! workflow's nodes (config value, live status, output) so that definition
//! edits never disturb in-flight or historical runs, plus the overall run
//! status and pause bookkeeping.
//!
//! Status writes are monotonic: once an execution or node reaches a
//! terminal status, later writes cannot regress it. Observers polling
//! snapshots therefore always see forward progress.

use crate::definition::Workflow;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use switchyard_core::{EdgeId, ExecutionId, ProjectId, WorkflowId};

/// The overall status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Waiting for a computed future timestamp (or manual override).
    Scheduled,
    /// Actively advancing through the graph.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure; `status_message` carries the reason.
    Failed,
    /// Waiting for a human action before it can continue.
    NeedsInput,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Returns true if this is a suspended, resumable status.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Scheduled | Self::NeedsInput)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NeedsInput => "needs_input",
        };
        f.write_str(s)
    }
}

/// The status of a single node within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    /// Not reached yet (or on an unselected branch, never reached).
    Pending,
    /// Currently executing, or holding an interrupting output while the
    /// execution waits for its resume time.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Waiting for a human action.
    NeedsInput,
}

impl NodeRunStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Per-execution state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRun {
    /// The node this state belongs to.
    pub node_id: NodeId,
    /// Node name, copied for display without the definition.
    pub name: String,
    /// The node's config value, frozen at execution start.
    ///
    /// Decide nodes carry their reconciled path options in here, so
    /// historical executions resolve branches against what existed when
    /// they ran, not the live graph.
    pub value: JsonValue,
    /// Current status.
    pub status: NodeRunStatus,
    /// Last produced output, if any.
    pub output: Option<JsonValue>,
    /// For decide nodes: the edges selected when the node completed.
    pub selected_edges: Vec<EdgeId>,
}

impl NodeRun {
    /// Creates pending state for a node.
    #[must_use]
    pub fn new(node_id: NodeId, name: impl Into<String>, value: JsonValue) -> Self {
        Self {
            node_id,
            name: name.into(),
            value,
            status: NodeRunStatus::Pending,
            output: None,
            selected_edges: Vec::new(),
        }
    }

    /// Moves the node to a new status, refusing to regress from terminal.
    ///
    /// Returns whether the write was applied.
    pub fn advance_to(&mut self, status: NodeRunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Marks the node successful with the given output.
    pub fn succeed(&mut self, output: JsonValue) {
        if self.advance_to(NodeRunStatus::Success) {
            self.output = Some(output);
        }
    }

    /// Marks the node failed.
    pub fn fail(&mut self) {
        self.advance_to(NodeRunStatus::Failed);
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier for this execution.
    pub id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The project that owns the workflow.
    pub project_id: ProjectId,
    /// Current status.
    pub status: ExecutionStatus,
    /// Human-readable reason for the current status (set on failure).
    pub status_message: Option<String>,
    /// Per-execution copy of the workflow's nodes.
    pub nodes: Vec<NodeRun>,
    /// The data this execution was started with, if any.
    pub input: Option<JsonValue>,
    /// The final emitted value, if the designated output action produced
    /// one.
    pub output: Option<JsonValue>,
    /// Non-null while the execution is paused until a wall-clock time.
    pub continue_execution_at: Option<DateTime<Utc>>,
    /// The node the execution is suspended on, if any.
    pub waiting_on: Option<NodeId>,
    /// When the execution was created.
    pub created_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Creates an execution from a workflow definition, copying node state.
    #[must_use]
    pub fn from_workflow(
        workflow: &Workflow,
        input: Option<JsonValue>,
        status: ExecutionStatus,
    ) -> Self {
        let nodes = workflow
            .graph
            .nodes()
            .map(|n| NodeRun::new(n.id, n.name.clone(), n.value.clone()))
            .collect();

        Self {
            id: ExecutionId::new(),
            workflow_id: workflow.id,
            project_id: workflow.project_id,
            status,
            status_message: None,
            nodes,
            input,
            output: None,
            continue_execution_at: None,
            waiting_on: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Returns the state of a node, if it exists in this execution.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&NodeRun> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Returns the mutable state of a node.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut NodeRun> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    /// Moves the execution to a new status, refusing to regress from
    /// terminal.
    ///
    /// Returns whether the write was applied.
    pub fn transition(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Finalizes the execution as successful.
    pub fn succeed(&mut self, output: Option<JsonValue>) {
        if self.transition(ExecutionStatus::Success) {
            self.output = output;
            self.continue_execution_at = None;
            self.waiting_on = None;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Finalizes the execution as failed.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.transition(ExecutionStatus::Failed) {
            self.status_message = Some(message.into());
            self.continue_execution_at = None;
            self.waiting_on = None;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Suspends the execution until a wall-clock time.
    pub fn suspend_until(&mut self, node_id: NodeId, at: DateTime<Utc>) {
        if self.transition(ExecutionStatus::Scheduled) {
            self.continue_execution_at = Some(at);
            self.waiting_on = Some(node_id);
        }
    }

    /// Suspends the execution until a human resumes it.
    pub fn suspend_for_input(&mut self, node_id: NodeId) {
        if self.transition(ExecutionStatus::NeedsInput) {
            self.waiting_on = Some(node_id);
        }
    }

    /// Returns true if the execution reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::RunStrategy;
    use crate::node::{AppBinding, Node, NodeKind};
    use serde_json::json;

    fn workflow() -> Workflow {
        let mut workflow = Workflow::new(ProjectId::new(), "Test", RunStrategy::Manual);
        workflow.graph.add_node(Node::new(
            "Start",
            NodeKind::Trigger,
            AppBinding::new("core", "manual"),
            json!({}),
        ));
        workflow
    }

    #[test]
    fn from_workflow_copies_nodes() {
        let workflow = workflow();
        let execution =
            Execution::from_workflow(&workflow, Some(json!({"k": 1})), ExecutionStatus::Running);

        assert_eq!(execution.nodes.len(), 1);
        assert_eq!(execution.nodes[0].status, NodeRunStatus::Pending);
        assert_eq!(execution.workflow_id, workflow.id);
        assert_eq!(execution.input, Some(json!({"k": 1})));
    }

    #[test]
    fn terminal_status_does_not_regress() {
        let workflow = workflow();
        let mut execution = Execution::from_workflow(&workflow, None, ExecutionStatus::Running);

        execution.fail("boom");
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.finished_at.is_some());

        // A late success write must be ignored.
        execution.succeed(Some(json!({"late": true})));
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.output.is_none());
    }

    #[test]
    fn node_terminal_status_does_not_regress() {
        let mut run = NodeRun::new(NodeId::new(), "A", json!({}));
        run.succeed(json!(1));
        assert_eq!(run.status, NodeRunStatus::Success);

        run.fail();
        assert_eq!(run.status, NodeRunStatus::Success);
        assert_eq!(run.output, Some(json!(1)));
    }

    #[test]
    fn suspend_until_sets_pause_bookkeeping() {
        let workflow = workflow();
        let mut execution = Execution::from_workflow(&workflow, None, ExecutionStatus::Running);
        let node_id = execution.nodes[0].node_id;
        let at = Utc::now() + chrono::Duration::hours(1);

        execution.suspend_until(node_id, at);
        assert_eq!(execution.status, ExecutionStatus::Scheduled);
        assert_eq!(execution.continue_execution_at, Some(at));
        assert_eq!(execution.waiting_on, Some(node_id));
    }

    #[test]
    fn succeed_clears_pause_bookkeeping() {
        let workflow = workflow();
        let mut execution = Execution::from_workflow(&workflow, None, ExecutionStatus::Running);
        let node_id = execution.nodes[0].node_id;
        execution.suspend_until(node_id, Utc::now());

        execution.transition(ExecutionStatus::Running);
        execution.succeed(None);
        assert!(execution.continue_execution_at.is_none());
        assert!(execution.waiting_on.is_none());
    }

    #[test]
    fn execution_serde_roundtrip() {
        let workflow = workflow();
        let execution = Execution::from_workflow(&workflow, None, ExecutionStatus::Running);
        let json = serde_json::to_string(&execution).expect("serialize");
        let parsed: Execution = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(execution, parsed);
    }
}
