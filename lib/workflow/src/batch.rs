//! Loop execution over delimited item lists.
//!
//! A loop step parses a delimited string into items and drives one child
//! invocation per item. Items are processed independently: a per-item
//! failure is captured into the summary's error list and never aborts the
//! remaining items. The accounting invariant
//! `successful + failed == total` holds for every summary.

use crate::invoke::{InvokeOrigin, SubWorkflowInvoker};
use crate::store::ExecutionStore;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::WorkflowId;
use tracing::{debug, warn};

/// Splits a delimited string into trimmed, non-empty items.
#[must_use]
pub fn parse_items(raw: &str, delimiter: &str) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Processes one item of a loop.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Processes an item, returning its result value.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message; the loop records it and
    /// continues.
    async fn process(&self, index: usize, item: &str) -> Result<JsonValue, String>;
}

/// A recorded per-item failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position of the item in the parsed list.
    pub item_index: usize,
    /// The item itself.
    pub item: String,
    /// Why it failed.
    pub error: String,
}

/// The aggregate outcome of a loop run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Number of parsed items.
    pub total_items: usize,
    /// Items whose child invocation succeeded.
    pub successful_executions: usize,
    /// Items whose child invocation failed.
    pub failed_executions: usize,
    /// Result values of the successful items, in item order.
    pub results: Vec<JsonValue>,
    /// Failures, in item order.
    pub errors: Vec<ItemFailure>,
}

/// Drives an [`ItemProcessor`] once per item, aggregating the outcome.
pub struct LoopRunner;

impl LoopRunner {
    /// Runs the processor over every item.
    ///
    /// An empty item list short-circuits to a zero summary without
    /// touching the processor.
    pub async fn run(items: &[String], processor: &dyn ItemProcessor) -> BatchSummary {
        let mut summary = BatchSummary {
            total_items: items.len(),
            ..BatchSummary::default()
        };

        for (index, item) in items.iter().enumerate() {
            match processor.process(index, item).await {
                Ok(result) => {
                    debug!(index, item = %item, "loop item succeeded");
                    summary.successful_executions += 1;
                    summary.results.push(result);
                }
                Err(error) => {
                    warn!(index, item = %item, error = %error, "loop item failed");
                    summary.failed_executions += 1;
                    summary.errors.push(ItemFailure {
                        item_index: index,
                        item: item.clone(),
                        error,
                    });
                }
            }
        }

        summary
    }
}

/// Item processor that invokes a sub-workflow per item.
///
/// The current item is merged into the child's input payload under
/// `item_key` before each invocation.
pub struct SubWorkflowProcessor<S: ExecutionStore> {
    invoker: Arc<SubWorkflowInvoker<S>>,
    workflow_id: WorkflowId,
    origin: InvokeOrigin,
    base_input: JsonValue,
    item_key: String,
    max_polls: u32,
    interval: Duration,
}

impl<S: ExecutionStore> SubWorkflowProcessor<S> {
    /// Creates a processor targeting `workflow_id` on behalf of `origin`.
    pub fn new(
        invoker: Arc<SubWorkflowInvoker<S>>,
        workflow_id: WorkflowId,
        origin: InvokeOrigin,
        base_input: JsonValue,
        item_key: impl Into<String>,
        max_polls: u32,
        interval: Duration,
    ) -> Self {
        Self {
            invoker,
            workflow_id,
            origin,
            base_input,
            item_key: item_key.into(),
            max_polls,
            interval,
        }
    }

    fn input_for(&self, item: &str) -> JsonValue {
        let mut input = match &self.base_input {
            JsonValue::Object(map) => JsonValue::Object(map.clone()),
            _ => serde_json::json!({}),
        };
        if let Some(map) = input.as_object_mut() {
            map.insert(self.item_key.clone(), JsonValue::String(item.to_string()));
        }
        input
    }
}

#[async_trait]
impl<S: ExecutionStore> ItemProcessor for SubWorkflowProcessor<S> {
    async fn process(&self, _index: usize, item: &str) -> Result<JsonValue, String> {
        let input = self.input_for(item);
        let execution = self
            .invoker
            .invoke(self.workflow_id, Some(input), &self.origin, true)
            .await
            .map_err(|e| e.to_string())?;

        let completion = self
            .invoker
            .await_completion(execution.id, &self.origin, self.max_polls, self.interval)
            .await
            .map_err(|e| e.to_string())?;

        Ok(completion.output.unwrap_or(JsonValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::definition::{RunStrategy, Workflow};
    use crate::edge::Edge;
    use crate::engine::Engine;
    use crate::node::{AppBinding, Node, NodeKind};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_core::ProjectId;
    use switchyard_integration::{Action, ActionContext, ActionError, ActionKind, AppRegistry};

    #[test]
    fn parse_items_trims_and_drops_empties() {
        let items = parse_items("a, b , ,c,,", ",");
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_items_with_newline_delimiter() {
        let items = parse_items("one\ntwo\n\nthree", "\n");
        assert_eq!(items, vec!["one", "two", "three"]);
    }

    #[test]
    fn parse_items_empty_input() {
        assert!(parse_items("", ",").is_empty());
        assert!(parse_items("  ,  ,  ", ",").is_empty());
    }

    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ItemProcessor for Flaky {
        async fn process(&self, _index: usize, item: &str) -> Result<JsonValue, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if item.contains("bad") {
                Err(format!("cannot process {item}"))
            } else {
                Ok(json!({ "item": item }))
            }
        }
    }

    #[tokio::test]
    async fn loop_accounting_holds_with_partial_failures() {
        let processor = Flaky {
            calls: AtomicUsize::new(0),
        };
        let items = parse_items("a, bad-1, b, bad-2", ",");

        let summary = LoopRunner::run(&items, &processor).await;

        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.successful_executions, 2);
        assert_eq!(summary.failed_executions, 2);
        assert_eq!(
            summary.successful_executions + summary.failed_executions,
            summary.total_items
        );
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[0].item_index, 1);
        assert_eq!(summary.errors[0].item, "bad-1");
        assert_eq!(processor.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_items_short_circuit() {
        let processor = Flaky {
            calls: AtomicUsize::new(0),
        };
        let summary = LoopRunner::run(&[], &processor).await;

        assert_eq!(summary, BatchSummary::default());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    }

    struct ReflectInput;

    #[async_trait]
    impl Action for ReflectInput {
        fn kind(&self) -> ActionKind {
            ActionKind::Output
        }

        async fn run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            let item = ctx
                .input
                .as_ref()
                .and_then(|input| input.get("item"))
                .and_then(JsonValue::as_str)
                .unwrap_or_default();
            if item == "reject-me" {
                return Err(ActionError::failed("item rejected"));
            }
            Ok(ctx.input.clone().unwrap_or(JsonValue::Null))
        }

        async fn mock_run(&self, ctx: &ActionContext) -> Result<JsonValue, ActionError> {
            self.run(ctx).await
        }
    }

    fn child_workflow(project_id: ProjectId) -> Workflow {
        let mut workflow = Workflow::new(project_id, "Per item", RunStrategy::Manual);
        let t = Node::new(
            "Start",
            NodeKind::Trigger,
            AppBinding::new("core", "manual"),
            json!({}),
        );
        let a = Node::new(
            "Reflect",
            NodeKind::Action,
            AppBinding::new("test", "reflect"),
            json!({}),
        );
        let (id_t, id_a) = (t.id, a.id);
        workflow.graph.add_node(t);
        workflow.graph.add_node(a);
        workflow.graph.add_edge(Edge::new(id_t, id_a)).unwrap();
        workflow
    }

    #[tokio::test]
    async fn sub_workflow_processor_merges_items_and_downgrades_failures() {
        let project_id = ProjectId::new();
        let store = Arc::new(MemoryStore::new());
        let mut registry = AppRegistry::new();
        registry.register_action("test", "reflect", Arc::new(ReflectInput));
        let engine = Arc::new(Engine::new(
            store.clone(),
            Arc::new(registry),
            EngineConfig::default(),
        ));
        let workflow = child_workflow(project_id);
        store.put_workflow(&workflow).await.unwrap();

        let invoker = Arc::new(SubWorkflowInvoker::new(engine, store));
        let processor = SubWorkflowProcessor::new(
            invoker,
            workflow.id,
            InvokeOrigin {
                workflow_id: WorkflowId::new(),
                project_id,
                via_agent: false,
            },
            json!({"batch": "digest"}),
            "item",
            5,
            Duration::from_millis(1),
        );

        let items = parse_items("a, reject-me, b", ",");
        let summary = LoopRunner::run(&items, &processor).await;

        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.successful_executions, 2);
        assert_eq!(summary.failed_executions, 1);
        // The item is merged into the child input at the configured key.
        assert_eq!(summary.results[0], json!({"batch": "digest", "item": "a"}));
        assert_eq!(summary.results[1], json!({"batch": "digest", "item": "b"}));
        assert_eq!(summary.errors[0].item, "reject-me");
        assert!(summary.errors[0].error.contains("item rejected"));
    }
}
