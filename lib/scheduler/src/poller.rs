//! Per-trigger poll cycles and the resume sweep.
//!
//! One poll cycle: run the workflow's polling trigger, filter the batch
//! against the stored watermark, start one execution per new record, and
//! advance the watermark. Concurrent cycles for the same trigger serialize
//! on a keyed async lock; without it, two cycles could both read the old
//! watermark and both deliver the same record.
//!
//! The resume sweep wakes SCHEDULED executions whose continue-at time has
//! passed: node-waiting executions complete their interrupted node and
//! continue, future-dated starts begin from the trigger.

use crate::error::PollError;
use crate::watermark;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use switchyard_core::{ExecutionId, WorkflowId};
use switchyard_integration::{AppRegistry, PollContext};
use switchyard_workflow::{Engine, ExecutionStore, NodeId, Workflow};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// The outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Records fetched from the trigger.
    pub fetched: usize,
    /// Records that survived the watermark filter.
    pub delivered: usize,
    /// New records whose execution could not be started.
    pub failed_starts: usize,
    /// Executions started, in record order.
    pub executions: Vec<ExecutionId>,
}

/// Polls workflow triggers and sweeps due executions.
pub struct TriggerPoller<S: ExecutionStore> {
    engine: Arc<Engine<S>>,
    store: Arc<S>,
    registry: Arc<AppRegistry>,
    locks: StdMutex<HashMap<(WorkflowId, NodeId), Arc<AsyncMutex<()>>>>,
}

impl<S: ExecutionStore> TriggerPoller<S> {
    /// Creates a poller over the given engine, store, and registry.
    pub fn new(engine: Arc<Engine<S>>, store: Arc<S>, registry: Arc<AppRegistry>) -> Self {
        Self {
            engine,
            store,
            registry,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Runs one poll cycle for a workflow's trigger.
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow has no single trigger, the
    /// trigger binding is unknown, the fetch fails, or persistence fails.
    /// Fetch failures leave the watermark untouched.
    pub async fn poll(&self, workflow: &Workflow) -> Result<PollOutcome, PollError> {
        let trigger_node = workflow
            .graph
            .trigger_node()
            .map_err(|e| PollError::InvalidWorkflow {
                workflow_id: workflow.id,
                reason: e.to_string(),
            })?
            .clone();

        // Serialize cycles per (workflow, trigger node): two concurrent
        // polls reading the same watermark would deliver the same records
        // twice.
        let lock = self.lock_for(workflow.id, trigger_node.id);
        let _guard = lock.lock().await;

        let trigger = self
            .registry
            .trigger(&trigger_node.binding.app_id, &trigger_node.binding.name)?;
        let ctx = PollContext::new(workflow.id, trigger_node.value.clone());
        let records = trigger.run(&ctx).await?;
        let fetched = records.len();

        let current = self
            .store
            .trigger_watermark(workflow.id, trigger_node.id)
            .await?;
        let outcome = watermark::filter(records, current, |record| {
            trigger.extract_timestamp(record)
        });

        // The watermark advances as soon as the new-record set is known;
        // the next cycle must not rediscover these records even if a start
        // below fails.
        if let Some(mark) = outcome.watermark
            && Some(mark) != current
        {
            self.store
                .set_trigger_watermark(workflow.id, trigger_node.id, mark)
                .await?;
        }

        let delivered = outcome.new_records.len();
        let mut executions = Vec::new();
        let mut failed_starts = 0;
        for record in outcome.new_records {
            match self.engine.start(workflow, Some(record)).await {
                Ok(execution) => executions.push(execution.id),
                Err(e) => {
                    warn!(workflow = %workflow.id, error = %e, "failed to start execution for polled record");
                    failed_starts += 1;
                }
            }
        }

        info!(
            workflow = %workflow.id,
            fetched,
            delivered,
            "poll cycle finished"
        );

        Ok(PollOutcome {
            fetched,
            delivered,
            failed_starts,
            executions,
        })
    }

    /// Runs the trigger's mock fetch without touching watermarks or
    /// starting executions (the editor's "test trigger").
    ///
    /// # Errors
    ///
    /// Returns an error when the workflow has no single trigger or the
    /// binding is unknown.
    pub async fn preview(&self, workflow: &Workflow) -> Result<Vec<JsonValue>, PollError> {
        let trigger_node = workflow
            .graph
            .trigger_node()
            .map_err(|e| PollError::InvalidWorkflow {
                workflow_id: workflow.id,
                reason: e.to_string(),
            })?;

        let trigger = self
            .registry
            .trigger(&trigger_node.binding.app_id, &trigger_node.binding.name)?;
        Ok(trigger.mock_run().await?)
    }

    /// Resumes every SCHEDULED execution whose continue-at time has
    /// passed. Individual resume failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the due-execution scan fails.
    pub async fn resume_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, PollError> {
        let due = self.store.due_executions(now).await?;
        let mut resumed = Vec::new();

        for execution in due {
            let execution_id = execution.id;
            match self.engine.resume_scheduled(execution).await {
                Ok(_) => resumed.push(execution_id),
                Err(e) => {
                    warn!(execution = %execution_id, error = %e, "failed to resume due execution");
                }
            }
        }

        Ok(resumed)
    }

    fn lock_for(&self, workflow_id: WorkflowId, node_id: NodeId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry((workflow_id, node_id)).or_default().clone()
    }
}
