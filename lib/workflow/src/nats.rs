//! NATS JetStream-backed execution store.
//!
//! The production [`ExecutionStore`] implementation keeps three key-value
//! buckets: workflow definitions, execution snapshots, and trigger
//! watermarks. Every record is wrapped in a versioned [`Envelope`] so the
//! stored format can evolve across rolling deployments.

use crate::definition::Workflow;
use crate::envelope::Envelope;
use crate::execution::{Execution, ExecutionStatus};
use crate::node::NodeId;
use crate::store::{ExecutionStore, StoreError};
use async_nats::jetstream::kv;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use switchyard_core::{ExecutionId, WorkflowId};

/// Default bucket for workflow definitions.
const DEFINITIONS_BUCKET: &str = "workflow-definitions";

/// Default bucket for execution snapshots.
const EXECUTIONS_BUCKET: &str = "workflow-executions";

/// Default bucket for trigger watermarks.
const WATERMARKS_BUCKET: &str = "trigger-watermarks";

/// Configuration for the NATS-backed store.
#[derive(Debug, Clone)]
pub struct NatsStoreConfig {
    /// NATS server URL.
    pub url: String,
    /// Bucket for workflow definitions (defaults to workflow-definitions).
    pub definitions_bucket: Option<String>,
    /// Bucket for execution snapshots (defaults to workflow-executions).
    pub executions_bucket: Option<String>,
    /// Bucket for trigger watermarks (defaults to trigger-watermarks).
    pub watermarks_bucket: Option<String>,
}

impl NatsStoreConfig {
    /// Creates a config with the given NATS URL and default bucket names.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            definitions_bucket: None,
            executions_bucket: None,
            watermarks_bucket: None,
        }
    }

    fn definitions(&self) -> &str {
        self.definitions_bucket.as_deref().unwrap_or(DEFINITIONS_BUCKET)
    }

    fn executions(&self) -> &str {
        self.executions_bucket.as_deref().unwrap_or(EXECUTIONS_BUCKET)
    }

    fn watermarks(&self) -> &str {
        self.watermarks_bucket.as_deref().unwrap_or(WATERMARKS_BUCKET)
    }
}

/// JetStream key-value implementation of [`ExecutionStore`].
pub struct NatsExecutionStore {
    definitions: kv::Store,
    executions: kv::Store,
    watermarks: kv::Store,
}

impl NatsExecutionStore {
    /// Connects to NATS and ensures the three buckets exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection or bucket setup fails.
    pub async fn connect(config: NatsStoreConfig) -> Result<Self, StoreError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("failed to connect to NATS: {e}"),
            })?;
        let jetstream = async_nats::jetstream::new(client);

        let definitions = Self::ensure_bucket(&jetstream, config.definitions()).await?;
        let executions = Self::ensure_bucket(&jetstream, config.executions()).await?;
        let watermarks = Self::ensure_bucket(&jetstream, config.watermarks()).await?;

        Ok(Self {
            definitions,
            executions,
            watermarks,
        })
    }

    async fn ensure_bucket(
        jetstream: &async_nats::jetstream::Context,
        bucket: &str,
    ) -> Result<kv::Store, StoreError> {
        jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("failed to create bucket {bucket}: {e}"),
            })
    }

    /// Key for a trigger watermark entry.
    fn watermark_key(workflow_id: WorkflowId, node_id: NodeId) -> String {
        format!("{workflow_id}.{node_id}")
    }

    async fn read<T: for<'de> serde::Deserialize<'de>>(
        store: &kv::Store,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let Some(bytes) = store.get(key).await.map_err(|e| StoreError::Backend {
            message: e.to_string(),
        })?
        else {
            return Ok(None);
        };

        let envelope: Envelope<T> =
            Envelope::from_json_bytes(&bytes).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        Ok(Some(envelope.into_payload()))
    }

    async fn write<T: serde::Serialize>(
        store: &kv::Store,
        key: &str,
        payload: &T,
    ) -> Result<(), StoreError> {
        let bytes = Envelope::new(payload)
            .to_json_bytes()
            .map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        store
            .put(key, bytes.into())
            .await
            .map_err(|e| StoreError::Backend {
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for NatsExecutionStore {
    async fn find_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError> {
        let mut workflow: Workflow = Self::read(&self.definitions, &id.to_string())
            .await?
            .ok_or(StoreError::WorkflowNotFound { workflow_id: id })?;
        workflow.graph.rebuild_index_map();
        Ok(workflow)
    }

    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        Self::write(&self.definitions, &workflow.id.to_string(), workflow).await
    }

    async fn find_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        Self::read(&self.executions, &id.to_string())
            .await?
            .ok_or(StoreError::ExecutionNotFound { execution_id: id })
    }

    async fn insert_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let bytes = Envelope::new(execution)
            .to_json_bytes()
            .map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        self.executions
            .create(execution.id.to_string(), bytes.into())
            .await
            .map_err(|e| {
                if e.to_string().contains("already exists") {
                    StoreError::ExecutionExists {
                        execution_id: execution.id,
                    }
                } else {
                    StoreError::Backend {
                        message: e.to_string(),
                    }
                }
            })?;
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        Self::write(&self.executions, &execution.id.to_string(), execution).await
    }

    async fn due_executions(&self, now: DateTime<Utc>) -> Result<Vec<Execution>, StoreError> {
        // Full scan; the executions bucket holds live runs only.
        let mut keys = self
            .executions
            .keys()
            .await
            .map_err(|e| StoreError::Backend {
                message: e.to_string(),
            })?
            .boxed();

        let mut due = Vec::new();
        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| StoreError::Backend {
                message: e.to_string(),
            })?;
            let Some(execution) = Self::read::<Execution>(&self.executions, &key).await? else {
                continue;
            };
            if execution.status == ExecutionStatus::Scheduled
                && execution.continue_execution_at.is_some_and(|at| at <= now)
            {
                due.push(execution);
            }
        }
        Ok(due)
    }

    async fn trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Self::read(&self.watermarks, &Self::watermark_key(workflow_id, node_id)).await
    }

    async fn set_trigger_watermark(
        &self,
        workflow_id: WorkflowId,
        node_id: NodeId,
        watermark: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Self::write(
            &self.watermarks,
            &Self::watermark_key(workflow_id, node_id),
            &watermark,
        )
        .await
    }
}
