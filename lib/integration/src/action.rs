//! Action trait and invocation context.
//!
//! Actions are the executable steps of a workflow. The engine hands each
//! action its resolved node config plus the outputs of completed upstream
//! nodes, and interprets the result through a three-way disposition:
//! completed, scheduled (pause until a computed time), or needs-input
//! (pause until a human resumes the execution).

use crate::error::ActionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use switchyard_core::{ExecutionId, WorkflowId};

/// The capability kind of an action.
///
/// The engine keys branching and output collection on this tag rather than
/// on vendor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A regular step: runs and produces an output.
    #[default]
    Standard,
    /// A branching step: its output selects which outgoing edges to follow.
    Decide,
    /// A terminal step whose output becomes the execution's output.
    Output,
}

/// Everything an action can see when it runs.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The execution this run belongs to.
    pub execution_id: ExecutionId,
    /// The node's resolved configuration value.
    pub value: JsonValue,
    /// Outputs of completed upstream nodes, keyed by node id display form.
    pub upstream: HashMap<String, JsonValue>,
    /// The data the execution was started with, if any.
    pub input: Option<JsonValue>,
}

impl ActionContext {
    /// Creates a context with no upstream outputs and no input.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, execution_id: ExecutionId, value: JsonValue) -> Self {
        Self {
            workflow_id,
            execution_id,
            value,
            upstream: HashMap::new(),
            input: None,
        }
    }

    /// Returns a string field from the node config, if present.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(JsonValue::as_str)
    }
}

/// How the engine should proceed after an action produced a raw output.
///
/// Pause/resume-capable actions map their raw output onto this tag via
/// [`Action::handle_interrupting_response`]; everything else completes.
#[derive(Debug, Clone, PartialEq)]
pub enum InterruptResponse {
    /// The step finished; its output is final.
    Completed {
        /// The output to record on the node.
        output: JsonValue,
    },
    /// The step requests a pause until a computed wall-clock time.
    ///
    /// The node's config carries the resume plan (reference date, offset,
    /// past-date policy); the engine computes the actual timestamp.
    Scheduled {
        /// Raw output to keep on the node while the execution waits.
        output: JsonValue,
    },
    /// The step requests a pause until a human resumes the execution.
    NeedsInput {
        /// Raw output to keep on the node while the execution waits.
        output: JsonValue,
    },
}

/// Trait implemented by every app action.
#[async_trait]
pub trait Action: Send + Sync {
    /// Returns the capability kind of this action.
    fn kind(&self) -> ActionKind {
        ActionKind::Standard
    }

    /// Validates the node's configuration value before any execution starts.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::MissingConfig`] (or another validation error)
    /// when required configuration is absent or malformed.
    fn validate(&self, _value: &JsonValue) -> Result<(), ActionError> {
        Ok(())
    }

    /// Executes the action.
    ///
    /// # Errors
    ///
    /// Returns an error when the action fails; the engine records it as the
    /// execution's failure message.
    async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError>;

    /// Produces a representative sample output without side effects.
    ///
    /// # Errors
    ///
    /// Returns an error when no sample can be produced.
    async fn mock_run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError>;

    /// Maps a raw output onto a disposition for pause/resume-capable actions.
    ///
    /// The default treats every output as completed.
    fn handle_interrupting_response(&self, raw: JsonValue) -> InterruptResponse {
        InterruptResponse::Completed { output: raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Action for Echo {
        async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(ctx.value.clone())
        }

        async fn mock_run(&self, _ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            Ok(json!({"mock": true}))
        }
    }

    #[tokio::test]
    async fn default_kind_is_standard() {
        let action = Echo;
        assert_eq!(action.kind(), ActionKind::Standard);
    }

    #[tokio::test]
    async fn default_interrupt_handling_completes() {
        let action = Echo;
        let response = action.handle_interrupting_response(json!({"ok": 1}));
        assert_eq!(
            response,
            InterruptResponse::Completed {
                output: json!({"ok": 1})
            }
        );
    }

    #[tokio::test]
    async fn run_sees_node_value() {
        let action = Echo;
        let ctx = ActionContext::new(
            WorkflowId::new(),
            ExecutionId::new(),
            json!({"message": "hi"}),
        );
        let output = action.run(&ctx).await.expect("run");
        assert_eq!(output["message"], "hi");
        assert_eq!(ctx.config_str("message"), Some("hi"));
    }
}
