//! Polling trigger trait.
//!
//! Polling triggers fetch candidate event records from an external service.
//! The engine deduplicates them against a per-trigger watermark, using the
//! timestamp each trigger knows how to extract from its own record shape.

use crate::error::ActionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use switchyard_core::WorkflowId;

/// Context handed to a polling trigger for one poll cycle.
#[derive(Debug, Clone)]
pub struct PollContext {
    /// The workflow whose trigger is being polled.
    pub workflow_id: WorkflowId,
    /// The trigger node's resolved configuration value.
    pub value: JsonValue,
}

impl PollContext {
    /// Creates a poll context.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, value: JsonValue) -> Self {
        Self { workflow_id, value }
    }
}

/// Trait implemented by every app polling trigger.
#[async_trait]
pub trait PollingTrigger: Send + Sync {
    /// Fetches the current batch of candidate records.
    ///
    /// # Errors
    ///
    /// Returns an error when the upstream fetch fails; the poll cycle is
    /// abandoned and the watermark stays untouched.
    async fn run(&self, ctx: &PollContext) -> Result<Vec<JsonValue>, ActionError>;

    /// Produces representative sample records without touching the service.
    ///
    /// # Errors
    ///
    /// Returns an error when no sample can be produced.
    async fn mock_run(&self) -> Result<Vec<JsonValue>, ActionError>;

    /// Extracts the event timestamp used for watermark deduplication.
    ///
    /// Returning `None` marks the record as impossible to deduplicate; such
    /// records are always delivered.
    fn extract_timestamp(&self, record: &JsonValue) -> Option<DateTime<Utc>>;
}
