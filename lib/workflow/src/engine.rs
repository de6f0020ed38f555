//! The workflow execution state machine.
//!
//! One engine advances executions through their workflow graphs:
//!
//! 1. Validate the workflow and every node's config (failures surface
//!    before the execution ever reaches RUNNING)
//! 2. Copy node state into a fresh execution, freezing decide-path options
//! 3. Advance the frontier: run each reachable node whose live
//!    predecessors completed, following only selected edges out of decide
//!    nodes
//! 4. Interpret each action's disposition: completed, scheduled (pause
//!    until a computed time), or needs-input (pause for a human)
//! 5. Persist the whole snapshot after every node transition
//!
//! Unselected branches stay PENDING and are never marked RUNNING. A node
//! failure fails the execution and stops the frontier; it never crashes the
//! engine.

use crate::config::EngineConfig;
use crate::decide;
use crate::definition::Workflow;
use crate::error::EngineError;
use crate::execution::{Execution, ExecutionStatus, NodeRunStatus};
use crate::node::{Node, NodeId};
use crate::resume::{self, ResumePlan};
use crate::store::{ExecutionStore, StoreError};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use switchyard_core::{ExecutionId, WorkflowId};
use switchyard_integration::{ActionContext, ActionKind, AppRegistry, InterruptResponse};
use tracing::{debug, info, warn};

/// An externally produced result for a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeResult {
    /// The node completed with this output.
    Success(JsonValue),
    /// The node failed with this message.
    Failure(String),
}

/// A request to run a workflow on demand.
#[derive(Debug, Clone)]
pub struct ManualRunRequest {
    /// The workflow to run.
    pub workflow_id: WorkflowId,
    /// Data handed to the trigger node.
    pub input: Option<JsonValue>,
    /// When true, the run happens inline; otherwise it is filed as an
    /// immediately-due scheduled execution for the resume sweep.
    pub skip_queue: bool,
}

/// The observable status of an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStatusView {
    /// Current status.
    pub status: ExecutionStatus,
    /// Failure reason, when failed.
    pub status_message: Option<String>,
    /// Final output, when successful.
    pub output: Option<JsonValue>,
}

/// The workflow execution state machine.
pub struct Engine<S: ExecutionStore> {
    store: Arc<S>,
    registry: Arc<AppRegistry>,
    config: EngineConfig,
}

impl<S: ExecutionStore> Engine<S> {
    /// Creates an engine over the given store and app registry.
    pub fn new(store: Arc<S>, registry: Arc<AppRegistry>, config: EngineConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts a new execution and advances it as far as it can go.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow or a node config is invalid, or
    /// when persistence fails. Action failures do NOT error: they produce a
    /// FAILED execution.
    pub async fn start(
        &self,
        workflow: &Workflow,
        input: Option<JsonValue>,
    ) -> Result<Execution, EngineError> {
        self.validate_workflow(workflow)?;

        let mut execution = Execution::from_workflow(workflow, input, ExecutionStatus::Running);
        self.freeze_decide_options(workflow, &mut execution);
        self.store.insert_execution(&execution).await?;
        info!(execution = %execution.id, workflow = %workflow.id, "execution started");

        self.advance_with(workflow, execution).await
    }

    /// Creates an execution that waits until `at` before running.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow is invalid or persistence fails.
    pub async fn schedule(
        &self,
        workflow: &Workflow,
        input: Option<JsonValue>,
        at: DateTime<Utc>,
    ) -> Result<Execution, EngineError> {
        self.validate_workflow(workflow)?;

        let mut execution = Execution::from_workflow(workflow, input, ExecutionStatus::Scheduled);
        self.freeze_decide_options(workflow, &mut execution);
        execution.continue_execution_at = Some(at);
        self.store.insert_execution(&execution).await?;
        info!(execution = %execution.id, workflow = %workflow.id, at = %at, "execution scheduled");

        Ok(execution)
    }

    /// Advances a running execution as far as it can go.
    ///
    /// Suspended and terminal executions are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow cannot be loaded or persistence
    /// fails.
    pub async fn advance(&self, execution: Execution) -> Result<Execution, EngineError> {
        let workflow = self.load_workflow(execution.workflow_id).await?;
        self.advance_with(&workflow, execution).await
    }

    /// Applies an externally produced node result and continues the run.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow cannot be loaded or persistence
    /// fails.
    pub async fn apply_node_result(
        &self,
        mut execution: Execution,
        node_id: NodeId,
        result: NodeResult,
    ) -> Result<Execution, EngineError> {
        match result {
            NodeResult::Failure(message) => {
                if let Some(run) = execution.node_mut(node_id) {
                    run.fail();
                }
                execution.fail(message);
                self.store.update_execution(&execution).await?;
                Ok(execution)
            }
            NodeResult::Success(output) => {
                let workflow = self.load_workflow(execution.workflow_id).await?;
                let kind = workflow
                    .graph
                    .get_node(node_id)
                    .map_or(ActionKind::Standard, |n| self.action_kind(n));

                if let Err(reason) = self.complete_node(&mut execution, node_id, kind, output) {
                    if let Some(run) = execution.node_mut(node_id) {
                        run.fail();
                    }
                    execution.fail(reason);
                    self.store.update_execution(&execution).await?;
                    return Ok(execution);
                }

                execution.transition(ExecutionStatus::Running);
                execution.waiting_on = None;
                execution.continue_execution_at = None;
                self.store.update_execution(&execution).await?;
                self.advance_with(&workflow, execution).await
            }
        }
    }

    /// Runs a workflow on demand.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow is missing, disabled, or invalid.
    pub async fn manually_execute_workflow(
        &self,
        request: ManualRunRequest,
    ) -> Result<Execution, EngineError> {
        let workflow = self.load_workflow(request.workflow_id).await?;
        if !workflow.is_enabled() {
            return Err(EngineError::WorkflowDisabled {
                workflow_id: workflow.id,
            });
        }

        if request.skip_queue {
            self.start(&workflow, request.input).await
        } else {
            self.schedule(&workflow, request.input, Utc::now()).await
        }
    }

    /// Returns the observable status of an execution.
    ///
    /// # Errors
    ///
    /// Returns an error when the execution does not exist.
    pub async fn get_execution_status(
        &self,
        execution_id: ExecutionId,
    ) -> Result<ExecutionStatusView, EngineError> {
        let execution = self.load_execution(execution_id).await?;
        Ok(ExecutionStatusView {
            status: execution.status,
            status_message: execution.status_message,
            output: execution.output,
        })
    }

    /// Manually resumes a suspended execution.
    ///
    /// The interrupted node is marked SUCCESS with its existing output, the
    /// pause bookkeeping is cleared, and the run continues. The computed
    /// resume time is bypassed entirely.
    ///
    /// # Errors
    ///
    /// Returns an error when the execution is not suspended or `node_id` is
    /// not the node it is waiting on.
    pub async fn resume_execution(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<Execution, EngineError> {
        let execution = self.load_execution(execution_id).await?;

        if !execution.status.is_suspended() {
            return Err(EngineError::InvalidResume {
                execution_id,
                reason: format!("execution is {}", execution.status),
            });
        }
        if execution.waiting_on != Some(node_id) {
            return Err(EngineError::InvalidResume {
                execution_id,
                reason: format!("execution is not waiting on node {node_id}"),
            });
        }

        self.resume_waiting_node(execution, node_id).await
    }

    /// Resumes a SCHEDULED execution whose continue-at time has arrived.
    ///
    /// Node-waiting executions complete the interrupted node and continue;
    /// future-dated starts (no waiting node) begin from the trigger.
    ///
    /// # Errors
    ///
    /// Returns an error when the execution is not SCHEDULED.
    pub async fn resume_scheduled(&self, mut execution: Execution) -> Result<Execution, EngineError> {
        if execution.status != ExecutionStatus::Scheduled {
            return Err(EngineError::InvalidResume {
                execution_id: execution.id,
                reason: format!("execution is {}", execution.status),
            });
        }

        match execution.waiting_on {
            Some(node_id) => self.resume_waiting_node(execution, node_id).await,
            None => {
                execution.continue_execution_at = None;
                execution.transition(ExecutionStatus::Running);
                self.store.update_execution(&execution).await?;
                info!(execution = %execution.id, "scheduled execution started");
                let workflow = self.load_workflow(execution.workflow_id).await?;
                self.advance_with(&workflow, execution).await
            }
        }
    }

    async fn resume_waiting_node(
        &self,
        mut execution: Execution,
        node_id: NodeId,
    ) -> Result<Execution, EngineError> {
        if let Some(run) = execution.node_mut(node_id) {
            let existing = run.output.clone().unwrap_or(JsonValue::Null);
            run.succeed(existing);
        }
        execution.continue_execution_at = None;
        execution.waiting_on = None;
        execution.transition(ExecutionStatus::Running);
        self.store.update_execution(&execution).await?;
        info!(execution = %execution.id, node = %node_id, "execution resumed");

        let workflow = self.load_workflow(execution.workflow_id).await?;
        self.advance_with(&workflow, execution).await
    }

    /// Validates the graph and every action node's config.
    fn validate_workflow(&self, workflow: &Workflow) -> Result<(), EngineError> {
        workflow
            .graph
            .validate()
            .map_err(|e| EngineError::InvalidGraph {
                reason: e.to_string(),
            })?;

        for node in workflow.graph.nodes().filter(|n| !n.is_trigger()) {
            let action = self
                .registry
                .action(&node.binding.app_id, &node.binding.name)
                .map_err(|_| EngineError::UnknownBinding {
                    node_id: node.id,
                    binding: node.binding.to_string(),
                })?;
            action
                .validate(&node.value)
                .map_err(|e| EngineError::Validation {
                    node_id: node.id,
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }

    /// Freezes reconciled decide-path options into the execution's node
    /// copies, so historical runs resolve against the paths that existed
    /// when they started.
    fn freeze_decide_options(&self, workflow: &Workflow, execution: &mut Execution) {
        for node in workflow.graph.nodes() {
            if self.action_kind(node) != ActionKind::Decide {
                continue;
            }
            let saved = decide::options_from_value(&node.value);
            let live = workflow.graph.outgoing_edges(node.id);
            let reconciled = decide::reconcile(&saved, &live, |id| {
                workflow.graph.get_node(id).map(|n| n.name.clone())
            });
            if let Some(run) = execution.node_mut(node.id) {
                decide::write_options(&mut run.value, &reconciled);
            }
        }
    }

    async fn advance_with(
        &self,
        workflow: &Workflow,
        mut execution: Execution,
    ) -> Result<Execution, EngineError> {
        if execution.status != ExecutionStatus::Running {
            return Ok(execution);
        }

        loop {
            let Some(node_id) = self.next_ready_node(workflow, &execution) else {
                let output = self.collect_output(workflow, &execution);
                execution.succeed(output);
                self.store.update_execution(&execution).await?;
                info!(execution = %execution.id, "execution succeeded");
                return Ok(execution);
            };

            execution = self.run_node(workflow, execution, node_id).await?;
            if execution.status != ExecutionStatus::Running {
                return Ok(execution);
            }
        }
    }

    /// Nodes reachable from the trigger via selected edges.
    ///
    /// Completed standard nodes activate all successors; completed decide
    /// nodes activate only the edges they selected. Unreached branches
    /// never enter the set.
    fn reachable_nodes(&self, workflow: &Workflow, execution: &Execution) -> HashSet<NodeId> {
        let mut reachable = HashSet::new();
        let Ok(trigger) = workflow.graph.trigger_node() else {
            return reachable;
        };

        let mut queue = VecDeque::from([trigger.id]);
        while let Some(node_id) = queue.pop_front() {
            if !reachable.insert(node_id) {
                continue;
            }
            let Some(run) = execution.node(node_id) else {
                continue;
            };
            if run.status != NodeRunStatus::Success {
                continue;
            }

            let is_decide = workflow
                .graph
                .get_node(node_id)
                .is_some_and(|n| self.action_kind(n) == ActionKind::Decide);

            for edge in workflow.graph.outgoing_edges(node_id) {
                if !is_decide || run.selected_edges.contains(&edge.id) {
                    queue.push_back(edge.target);
                }
            }
        }

        reachable
    }

    /// The next pending node whose live predecessors have all completed.
    fn next_ready_node(&self, workflow: &Workflow, execution: &Execution) -> Option<NodeId> {
        let reachable = self.reachable_nodes(workflow, execution);

        workflow
            .graph
            .nodes()
            .filter(|node| reachable.contains(&node.id))
            .find(|node| {
                let pending = execution
                    .node(node.id)
                    .is_some_and(|run| run.status == NodeRunStatus::Pending);
                pending
                    && workflow
                        .graph
                        .incoming_edges(node.id)
                        .iter()
                        .filter(|edge| reachable.contains(&edge.source))
                        .all(|edge| {
                            execution
                                .node(edge.source)
                                .is_some_and(|run| run.status == NodeRunStatus::Success)
                        })
            })
            .map(|node| node.id)
    }

    /// The emitted value of the designated output action, if any succeeded.
    fn collect_output(&self, workflow: &Workflow, execution: &Execution) -> Option<JsonValue> {
        workflow
            .graph
            .nodes()
            .filter(|node| self.action_kind(node) == ActionKind::Output)
            .filter_map(|node| execution.node(node.id))
            .filter(|run| run.status == NodeRunStatus::Success)
            .last()
            .and_then(|run| run.output.clone())
    }

    fn action_kind(&self, node: &Node) -> ActionKind {
        if node.is_trigger() {
            return ActionKind::Standard;
        }
        self.registry
            .action(&node.binding.app_id, &node.binding.name)
            .map_or(ActionKind::Standard, |action| action.kind())
    }

    async fn run_node(
        &self,
        workflow: &Workflow,
        mut execution: Execution,
        node_id: NodeId,
    ) -> Result<Execution, EngineError> {
        let node = workflow
            .graph
            .get_node(node_id)
            .ok_or_else(|| EngineError::InvalidGraph {
                reason: format!("execution references unknown node {node_id}"),
            })?;

        // The trigger node completes with the execution's input as its
        // event payload; it has no action to run.
        if node.is_trigger() {
            let payload = execution.input.clone().unwrap_or(JsonValue::Null);
            if let Some(run) = execution.node_mut(node_id) {
                run.succeed(payload);
            }
            self.store.update_execution(&execution).await?;
            return Ok(execution);
        }

        let action = self
            .registry
            .action(&node.binding.app_id, &node.binding.name)
            .map_err(|_| EngineError::UnknownBinding {
                node_id,
                binding: node.binding.to_string(),
            })?;

        if let Some(run) = execution.node_mut(node_id) {
            run.advance_to(NodeRunStatus::Running);
        }
        self.store.update_execution(&execution).await?;
        debug!(execution = %execution.id, node = %node_id, binding = %node.binding, "node running");

        let ctx = self.action_context(&execution, node_id);
        let raw = match action.run(&ctx).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(execution = %execution.id, node = %node_id, error = %err, "node failed");
                if let Some(run) = execution.node_mut(node_id) {
                    run.fail();
                }
                execution.fail(err.to_string());
                self.store.update_execution(&execution).await?;
                return Ok(execution);
            }
        };

        match action.handle_interrupting_response(raw) {
            InterruptResponse::Completed { output } => {
                if let Err(reason) = self.complete_node(&mut execution, node_id, action.kind(), output)
                {
                    if let Some(run) = execution.node_mut(node_id) {
                        run.fail();
                    }
                    execution.fail(reason);
                }
                self.store.update_execution(&execution).await?;
            }
            InterruptResponse::Scheduled { output } => {
                execution = self.pause_until_plan(execution, node_id, action.kind(), output)?;
                self.store.update_execution(&execution).await?;
            }
            InterruptResponse::NeedsInput { output } => {
                if let Some(run) = execution.node_mut(node_id) {
                    run.output = Some(output);
                    run.advance_to(NodeRunStatus::NeedsInput);
                }
                execution.suspend_for_input(node_id);
                info!(execution = %execution.id, node = %node_id, "execution waiting for input");
                self.store.update_execution(&execution).await?;
            }
        }

        Ok(execution)
    }

    /// Computes the node's resume plan and either completes it now or
    /// suspends the execution until the target time.
    fn pause_until_plan(
        &self,
        mut execution: Execution,
        node_id: NodeId,
        kind: ActionKind,
        output: JsonValue,
    ) -> Result<Execution, EngineError> {
        let value = execution
            .node(node_id)
            .map(|run| run.value.clone())
            .unwrap_or(JsonValue::Null);

        let plan: ResumePlan = match serde_json::from_value(value) {
            Ok(plan) => plan,
            Err(e) => {
                if let Some(run) = execution.node_mut(node_id) {
                    run.fail();
                }
                execution.fail(format!("invalid resume plan on node {node_id}: {e}"));
                return Ok(execution);
            }
        };

        let decision = match resume::compute(&plan, Utc::now()) {
            Ok(decision) => decision,
            Err(e) => {
                if let Some(run) = execution.node_mut(node_id) {
                    run.fail();
                }
                execution.fail(format!("invalid resume plan on node {node_id}: {e}"));
                return Ok(execution);
            }
        };

        if decision.immediately_run {
            if !decision.within_grace {
                debug!(
                    execution = %execution.id,
                    node = %node_id,
                    scheduled_at = %decision.scheduled_at,
                    "resume target past the policy window, continuing anyway"
                );
            }
            if let Err(reason) = self.complete_node(&mut execution, node_id, kind, output) {
                if let Some(run) = execution.node_mut(node_id) {
                    run.fail();
                }
                execution.fail(reason);
            }
            return Ok(execution);
        }

        if let Some(run) = execution.node_mut(node_id) {
            run.output = Some(output);
        }
        execution.suspend_until(node_id, decision.scheduled_at);
        info!(
            execution = %execution.id,
            node = %node_id,
            until = %decision.scheduled_at,
            "execution paused"
        );
        Ok(execution)
    }

    /// Marks a node successful; decide nodes also record the selected
    /// edges from their decision output.
    fn complete_node(
        &self,
        execution: &mut Execution,
        node_id: NodeId,
        kind: ActionKind,
        output: JsonValue,
    ) -> Result<(), String> {
        if kind == ActionKind::Decide {
            let options = execution
                .node(node_id)
                .map(|run| decide::options_from_value(&run.value))
                .unwrap_or_default();
            let selected = decide::selected_edges(&options, &output);
            if selected.is_empty() {
                return Err(format!(
                    "decision on node {node_id} did not match any configured path"
                ));
            }
            if let Some(run) = execution.node_mut(node_id) {
                run.selected_edges = selected;
            }
        }

        if let Some(run) = execution.node_mut(node_id) {
            run.succeed(output);
        }
        Ok(())
    }

    fn action_context(&self, execution: &Execution, node_id: NodeId) -> ActionContext {
        let value = execution
            .node(node_id)
            .map(|run| run.value.clone())
            .unwrap_or(JsonValue::Null);

        let mut upstream = HashMap::new();
        for run in &execution.nodes {
            if run.status == NodeRunStatus::Success
                && let Some(output) = &run.output
            {
                upstream.insert(run.node_id.to_string(), output.clone());
            }
        }

        ActionContext {
            workflow_id: execution.workflow_id,
            execution_id: execution.id,
            value,
            upstream,
            input: execution.input.clone(),
        }
    }

    async fn load_workflow(&self, workflow_id: WorkflowId) -> Result<Workflow, EngineError> {
        match self.store.find_workflow(workflow_id).await {
            Ok(workflow) => Ok(workflow),
            Err(StoreError::WorkflowNotFound { workflow_id }) => {
                Err(EngineError::WorkflowNotFound { workflow_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_execution(&self, execution_id: ExecutionId) -> Result<Execution, EngineError> {
        match self.store.find_execution(execution_id).await {
            Ok(execution) => Ok(execution),
            Err(StoreError::ExecutionNotFound { execution_id }) => {
                Err(EngineError::ExecutionNotFound { execution_id })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::RunStrategy;
    use crate::edge::Edge;
    use crate::node::{AppBinding, NodeKind};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use switchyard_core::ProjectId;
    use switchyard_integration::{Action, ActionError};

    struct EchoAction;

    #[async_trait]
    impl Action for EchoAction {
        async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(ctx.value.clone())
        }

        async fn mock_run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(ctx.value.clone())
        }
    }

    struct FailAction;

    #[async_trait]
    impl Action for FailAction {
        async fn run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Err(ActionError::failed("simulated outage"))
        }

        async fn mock_run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!(null))
        }
    }

    struct StrictAction;

    #[async_trait]
    impl Action for StrictAction {
        fn validate(&self, value: &JsonValue) -> Result<(), ActionError> {
            if value.get("to").and_then(JsonValue::as_str).is_none() {
                return Err(ActionError::missing("to"));
            }
            Ok(())
        }

        async fn run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"sent": true}))
        }

        async fn mock_run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"sent": false}))
        }
    }

    struct DecideAction;

    #[async_trait]
    impl Action for DecideAction {
        fn kind(&self) -> ActionKind {
            ActionKind::Decide
        }

        async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(ctx.value.get("decision").cloned().unwrap_or(json!(null)))
        }

        async fn mock_run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            self.run(ctx).await
        }
    }

    struct EmitAction;

    #[async_trait]
    impl Action for EmitAction {
        fn kind(&self) -> ActionKind {
            ActionKind::Output
        }

        async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(ctx.value.get("payload").cloned().unwrap_or(json!(null)))
        }

        async fn mock_run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            self.run(ctx).await
        }
    }

    struct WaitUntilAction;

    #[async_trait]
    impl Action for WaitUntilAction {
        async fn run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"waiting": true}))
        }

        async fn mock_run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"waiting": true}))
        }

        fn handle_interrupting_response(&self, raw: JsonValue) -> InterruptResponse {
            InterruptResponse::Scheduled { output: raw }
        }
    }

    struct ApprovalAction;

    #[async_trait]
    impl Action for ApprovalAction {
        async fn run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"requested": true}))
        }

        async fn mock_run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"requested": true}))
        }

        fn handle_interrupting_response(&self, raw: JsonValue) -> InterruptResponse {
            InterruptResponse::NeedsInput { output: raw }
        }
    }

    fn test_registry() -> Arc<AppRegistry> {
        let mut registry = AppRegistry::new();
        registry.register_action("test", "echo", Arc::new(EchoAction));
        registry.register_action("test", "fail", Arc::new(FailAction));
        registry.register_action("test", "strict", Arc::new(StrictAction));
        registry.register_action("test", "decide", Arc::new(DecideAction));
        registry.register_action("test", "emit", Arc::new(EmitAction));
        registry.register_action("test", "wait_until", Arc::new(WaitUntilAction));
        registry.register_action("test", "approval", Arc::new(ApprovalAction));
        Arc::new(registry)
    }

    fn test_engine() -> (Arc<MemoryStore>, Engine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(store.clone(), test_registry(), EngineConfig::default());
        (store, engine)
    }

    fn trigger_node() -> Node {
        Node::new(
            "Start",
            NodeKind::Trigger,
            AppBinding::new("core", "manual"),
            json!({}),
        )
    }

    fn action_node(name: &str, action: &str, value: JsonValue) -> Node {
        Node::new(name, NodeKind::Action, AppBinding::new("test", action), value)
    }

    /// trigger -> echo -> emit
    fn linear_workflow() -> Workflow {
        let mut workflow = Workflow::new(ProjectId::new(), "Linear", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Annotate", "echo", json!({"note": "hello"}));
        let b = action_node("Emit", "emit", json!({"payload": {"done": true}}));
        let (id_t, id_a, id_b) = (t.id, a.id, b.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_node(b);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        workflow.graph.add_edge(Edge::new(id_a, id_b)).unwrap();
        workflow
    }

    /// trigger -> decide -> {Approve, Reject}
    fn decide_workflow(decision: JsonValue) -> (Workflow, NodeId, NodeId, NodeId) {
        let mut workflow = Workflow::new(ProjectId::new(), "Branching", RunStrategy::Manual);
        let t = trigger_node();
        let d = action_node("Route", "decide", json!({"decision": decision}));
        let a = action_node("Approve", "echo", json!({"approved": true}));
        let b = action_node("Reject", "echo", json!({"approved": false}));
        let (id_t, id_d, id_a, id_b) = (t.id, d.id, a.id, b.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(d);
        workflow.graph.add_node(a);
        workflow.graph.add_node(b);
        workflow.graph.add_edge(Edge::new(id_t, id_d)).unwrap();
        workflow.graph.add_edge(Edge::new(id_d, id_a)).unwrap();
        workflow.graph.add_edge(Edge::new(id_d, id_b)).unwrap();
        (workflow, id_d, id_a, id_b)
    }

    #[tokio::test]
    async fn linear_workflow_runs_to_success() {
        let (store, engine) = test_engine();
        let workflow = linear_workflow();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine
            .start(&workflow, Some(json!({"event": 1})))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.output, Some(json!({"done": true})));
        assert!(execution
            .nodes
            .iter()
            .all(|n| n.status == NodeRunStatus::Success));

        // The stored snapshot matches what was returned.
        let stored = store.find_execution(execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn trigger_output_is_the_execution_input() {
        let (store, engine) = test_engine();
        let workflow = linear_workflow();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine
            .start(&workflow, Some(json!({"record": "r1"})))
            .await
            .unwrap();

        let trigger_run = execution
            .nodes
            .iter()
            .find(|n| n.name == "Start")
            .unwrap();
        assert_eq!(trigger_run.output, Some(json!({"record": "r1"})));
    }

    #[tokio::test]
    async fn selected_branch_runs_and_other_stays_pending() {
        let (store, engine) = test_engine();
        let (workflow, _id_d, id_a, id_b) = decide_workflow(json!("Approve"));
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(
            execution.node(id_a).unwrap().status,
            NodeRunStatus::Success
        );
        // The unselected branch was never reached, let alone running.
        assert_eq!(
            execution.node(id_b).unwrap().status,
            NodeRunStatus::Pending
        );
    }

    #[tokio::test]
    async fn unmatched_decision_fails_the_execution() {
        let (store, engine) = test_engine();
        let (workflow, id_d, id_a, id_b) = decide_workflow(json!("Escalate"));
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution
            .status_message
            .as_deref()
            .unwrap()
            .contains("did not match"));
        assert_eq!(execution.node(id_d).unwrap().status, NodeRunStatus::Failed);
        assert_eq!(execution.node(id_a).unwrap().status, NodeRunStatus::Pending);
        assert_eq!(execution.node(id_b).unwrap().status, NodeRunStatus::Pending);
    }

    #[tokio::test]
    async fn validation_failure_prevents_any_run() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "Strict", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Send", "strict", json!({}));
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let err = engine.start(&workflow, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { node_id, .. } if node_id == id_a));
        // Nothing was persisted: the execution never reached RUNNING.
        assert_eq!(store.execution_count(), 0);
    }

    #[tokio::test]
    async fn unknown_binding_is_rejected() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "Unknown", RunStrategy::Manual);
        let t = trigger_node();
        let a = Node::new(
            "Mystery",
            NodeKind::Action,
            AppBinding::new("nope", "missing"),
            json!({}),
        );
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let err = engine.start(&workflow, None).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownBinding { .. }));
    }

    #[tokio::test]
    async fn action_failure_fails_execution_and_stops_frontier() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "Failing", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Break", "fail", json!({}));
        let b = action_node("Never", "echo", json!({}));
        let (id_t, id_a, id_b) = (t.id, a.id, b.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_node(b);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        workflow.graph.add_edge(Edge::new(id_a, id_b)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution
            .status_message
            .as_deref()
            .unwrap()
            .contains("simulated outage"));
        assert_eq!(execution.node(id_a).unwrap().status, NodeRunStatus::Failed);
        assert_eq!(execution.node(id_b).unwrap().status, NodeRunStatus::Pending);
    }

    #[tokio::test]
    async fn needs_input_suspends_then_manual_resume_completes() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "Approval", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Ask", "approval", json!({}));
        let b = action_node("Emit", "emit", json!({"payload": "approved"}));
        let (id_t, id_a, id_b) = (t.id, a.id, b.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_node(b);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        workflow.graph.add_edge(Edge::new(id_a, id_b)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::NeedsInput);
        assert_eq!(execution.waiting_on, Some(id_a));
        assert_eq!(
            execution.node(id_a).unwrap().status,
            NodeRunStatus::NeedsInput
        );

        let resumed = engine.resume_execution(execution.id, id_a).await.unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Success);
        // The interrupted node kept its pre-suspension output.
        assert_eq!(
            resumed.node(id_a).unwrap().output,
            Some(json!({"requested": true}))
        );
        assert_eq!(resumed.node(id_b).unwrap().status, NodeRunStatus::Success);
        assert_eq!(resumed.output, Some(json!("approved")));
    }

    #[tokio::test]
    async fn resume_rejects_wrong_node() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "Approval", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Ask", "approval", json!({}));
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        let err = engine
            .resume_execution(execution.id, id_t)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResume { .. }));
    }

    #[tokio::test]
    async fn future_resume_plan_suspends_until_target() {
        let (store, engine) = test_engine();
        let target = Utc::now() + chrono::Duration::hours(1);
        let mut workflow = Workflow::new(ProjectId::new(), "Delayed", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node(
            "Wait",
            "wait_until",
            json!({"reference_date": target.to_rfc3339()}),
        );
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Scheduled);
        assert_eq!(execution.waiting_on, Some(id_a));
        let at = execution.continue_execution_at.unwrap();
        assert!((at - target).num_seconds().abs() < 2);

        // A due resume completes the waiting node and finishes the run.
        let resumed = engine.resume_scheduled(execution).await.unwrap();
        assert_eq!(resumed.status, ExecutionStatus::Success);
        assert_eq!(resumed.node(id_a).unwrap().status, NodeRunStatus::Success);
    }

    #[tokio::test]
    async fn past_resume_plan_continues_inline() {
        let (store, engine) = test_engine();
        let target = Utc::now() - chrono::Duration::minutes(10);
        let mut workflow = Workflow::new(ProjectId::new(), "Elapsed", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node(
            "Wait",
            "wait_until",
            json!({
                "reference_date": target.to_rfc3339(),
                "past_date_policy": "continue-if-15-minutes"
            }),
        );
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.node(id_a).unwrap().status, NodeRunStatus::Success);
    }

    #[tokio::test]
    async fn manual_execution_respects_skip_queue() {
        let (store, engine) = test_engine();
        let workflow = linear_workflow();
        store.put_workflow(&workflow).await.unwrap();

        let inline = engine
            .manually_execute_workflow(ManualRunRequest {
                workflow_id: workflow.id,
                input: None,
                skip_queue: true,
            })
            .await
            .unwrap();
        assert_eq!(inline.status, ExecutionStatus::Success);

        let queued = engine
            .manually_execute_workflow(ManualRunRequest {
                workflow_id: workflow.id,
                input: None,
                skip_queue: false,
            })
            .await
            .unwrap();
        assert_eq!(queued.status, ExecutionStatus::Scheduled);
        assert!(queued.continue_execution_at.is_some());
    }

    #[tokio::test]
    async fn disabled_workflow_cannot_run() {
        let (store, engine) = test_engine();
        let mut workflow = linear_workflow();
        workflow.disable();
        store.put_workflow(&workflow).await.unwrap();

        let err = engine
            .manually_execute_workflow(ManualRunRequest {
                workflow_id: workflow.id,
                input: None,
                skip_queue: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::WorkflowDisabled { .. }));
    }

    #[tokio::test]
    async fn status_view_reports_output_and_message() {
        let (store, engine) = test_engine();
        let workflow = linear_workflow();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        let view = engine.get_execution_status(execution.id).await.unwrap();
        assert_eq!(view.status, ExecutionStatus::Success);
        assert_eq!(view.output, Some(json!({"done": true})));
        assert!(view.status_message.is_none());

        let missing = engine.get_execution_status(ExecutionId::new()).await;
        assert!(matches!(missing, Err(EngineError::ExecutionNotFound { .. })));
    }

    #[tokio::test]
    async fn apply_node_result_completes_waiting_node() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "External", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Ask", "approval", json!({}));
        let b = action_node("After", "echo", json!({"after": true}));
        let (id_t, id_a, id_b) = (t.id, a.id, b.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_node(b);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        workflow.graph.add_edge(Edge::new(id_a, id_b)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::NeedsInput);

        let done = engine
            .apply_node_result(execution, id_a, NodeResult::Success(json!({"granted": true})))
            .await
            .unwrap();
        assert_eq!(done.status, ExecutionStatus::Success);
        assert_eq!(
            done.node(id_a).unwrap().output,
            Some(json!({"granted": true}))
        );
        assert_eq!(done.node(id_b).unwrap().status, NodeRunStatus::Success);
    }

    #[tokio::test]
    async fn apply_node_failure_fails_execution() {
        let (store, engine) = test_engine();
        let mut workflow = Workflow::new(ProjectId::new(), "External", RunStrategy::Manual);
        let t = trigger_node();
        let a = action_node("Ask", "approval", json!({}));
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        store.put_workflow(&workflow).await.unwrap();

        let execution = engine.start(&workflow, None).await.unwrap();
        let failed = engine
            .apply_node_result(execution, id_a, NodeResult::Failure("denied".to_string()))
            .await
            .unwrap();
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.status_message.as_deref(), Some("denied"));
    }
}
