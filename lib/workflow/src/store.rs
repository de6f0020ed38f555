//! Abstract persistence for workflows, executions, and trigger watermarks.
//!
//! The engine persists whole execution snapshots after every node
//! transition; observers (status polling, the UI, sub-workflow callers)
//! read those snapshots. The exact persistence schema is a collaborator
//! concern behind [`ExecutionStore`].
//!
//! [`MemoryStore`] is the single-process implementation used by tests and
//! embedded setups; `nats::NatsExecutionStore` is the JetStream-backed one.

use crate::definition::Workflow;
use crate::execution::{Execution, ExecutionStatus};
use crate::node::NodeId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use switchyard_core::{ExecutionId, WorkflowId};

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Workflow not found.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Execution not found.
    ExecutionNotFound { execution_id: ExecutionId },
    /// An execution with this id already exists.
    ExecutionExists { execution_id: ExecutionId },
    /// A record could not be serialized or deserialized.
    Serialization { message: String },
    /// The backing store failed.
    Backend { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::ExecutionNotFound { execution_id } => {
                write!(f, "execution not found: {execution_id}")
            }
            Self::ExecutionExists { execution_id } => {
                write!(f, "execution already exists: {execution_id}")
            }
            Self::Serialization { message } => write!(f, "serialization failed: {message}"),
            Self::Backend { message } => write!(f, "store backend failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Abstract store the engine and scheduler collaborate through.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Loads a workflow definition.
    async fn find_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError>;

    /// Saves (or replaces) a workflow definition.
    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// Loads an execution snapshot.
    async fn find_execution(&self, id: ExecutionId) -> Result<Execution, StoreError>;

    /// Persists a new execution.
    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Replaces an execution snapshot.
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Returns SCHEDULED executions whose continue-at time has passed.
    async fn due_executions(&self, now: DateTime<Utc>) -> Result<Vec<Execution>, StoreError>;

    /// Reads the watermark for a polling trigger, if one was ever written.
    async fn trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Writes the watermark for a polling trigger.
    async fn set_trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
        watermark: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
    executions: Mutex<HashMap<ExecutionId, Execution>>,
    watermarks: Mutex<HashMap<(WorkflowId, NodeId), DateTime<Utc>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn find_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError> {
        self.workflows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound { workflow_id: id })
    }

    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn find_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        self.executions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::ExecutionNotFound { execution_id: id })
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut executions = self.executions.lock().unwrap();
        if executions.contains_key(&execution.id) {
            return Err(StoreError::ExecutionExists {
                execution_id: execution.id,
            });
        }
        executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.executions
            .lock()
            .unwrap()
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn due_executions(&self, now: DateTime<Utc>) -> Result<Vec<Execution>, StoreError> {
        let executions = self.executions.lock().unwrap();
        Ok(executions
            .values()
            .filter(|e| {
                e.status == ExecutionStatus::Scheduled
                    && e.continue_execution_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect())
    }

    async fn trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .watermarks
            .lock()
            .unwrap()
            .get(&(workflow_id, node_id))
            .copied())
    }

    async fn set_trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
        watermark: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.watermarks
            .lock()
            .unwrap()
            .insert((workflow_id, node_id), watermark);
        Ok(())
    }
}
