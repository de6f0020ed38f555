//! Synchronous sub-workflow invocation.
//!
//! A parent workflow (or an agent) starts a child execution and waits for
//! it to finish. Waiting is an explicit bounded poll loop over the child's
//! stored snapshot: no recursion, a hard iteration cap, and a sleep
//! boundary behind the [`Sleeper`] seam so timeout behavior is unit
//! testable without a runtime clock.
//!
//! Guard clauses, not recursion limits, prevent cycles: a workflow can
//! never invoke itself, and a child that suspends (NEEDS_INPUT or
//! SCHEDULED) is rejected because a synchronous caller cannot provide the
//! human action or external event it waits for.

use crate::engine::Engine;
use crate::error::{EngineError, InvokeError};
use crate::execution::{Execution, ExecutionStatus};
use crate::store::{ExecutionStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{ExecutionId, ProjectId, WorkflowId};
use tracing::debug;

/// Default number of status polls before giving up (30 × 2s = 60s).
pub const DEFAULT_MAX_POLLS: u32 = 30;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Sleep seam for the poll loop.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Who is asking for the invocation.
#[derive(Debug, Clone)]
pub struct InvokeOrigin {
    /// The requesting workflow.
    pub workflow_id: WorkflowId,
    /// The requesting workflow's project.
    pub project_id: ProjectId,
    /// True when the request came from an agent conversation; failures
    /// then carry a deep link to the child execution.
    pub via_agent: bool,
}

/// A successfully awaited child execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildCompletion {
    /// The child execution.
    pub execution_id: ExecutionId,
    /// The child's output, if it emitted one.
    pub output: Option<JsonValue>,
    /// Set when the child finished without an explicit output.
    pub note: Option<String>,
}

/// Starts child executions and polls them to completion.
pub struct SubWorkflowInvoker<S: ExecutionStore> {
    engine: Arc<Engine<S>>,
    store: Arc<S>,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: ExecutionStore> SubWorkflowInvoker<S> {
    /// Creates an invoker with the production sleeper.
    pub fn new(engine: Arc<Engine<S>>, store: Arc<S>) -> Self {
        Self::with_sleeper(engine, store, Arc::new(TokioSleeper))
    }

    /// Creates an invoker with a custom sleeper (tests).
    pub fn with_sleeper(engine: Arc<Engine<S>>, store: Arc<S>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            engine,
            store,
            sleeper,
        }
    }

    /// Starts a child execution on behalf of `origin`.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::SelfInvocation`] when the target is the requesting
    ///   workflow
    /// - [`InvokeError::NotFound`] when the target does not exist in the
    ///   caller's project
    /// - [`InvokeError::Engine`] when the engine rejects the start
    pub async fn invoke(
        &self,
        workflow_id: WorkflowId,
        input: Option<JsonValue>,
        origin: &InvokeOrigin,
        skip_queue: bool,
    ) -> Result<Execution, InvokeError> {
        if workflow_id == origin.workflow_id {
            return Err(InvokeError::SelfInvocation { workflow_id });
        }

        let workflow = match self.store.find_workflow(workflow_id).await {
            Ok(workflow) => workflow,
            Err(StoreError::WorkflowNotFound { workflow_id }) => {
                return Err(InvokeError::NotFound { workflow_id });
            }
            Err(e) => return Err(InvokeError::Engine(EngineError::from(e))),
        };

        // Cross-project targets are reported exactly like missing ones.
        if workflow.project_id != origin.project_id {
            return Err(InvokeError::NotFound { workflow_id });
        }

        let execution = if skip_queue {
            self.engine.start(&workflow, input).await?
        } else {
            self.engine.schedule(&workflow, input, Utc::now()).await?
        };
        Ok(execution)
    }

    /// Polls a child execution until it reaches a terminal status.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::ChildFailed`] when the child failed; the message is
    ///   its status message, with a deep link for agent callers
    /// - [`InvokeError::UnsupportedChildState`] when the child suspended
    /// - [`InvokeError::Timeout`] when `max_polls` checks were exhausted
    pub async fn await_completion(
        &self,
        execution_id: ExecutionId,
        origin: &InvokeOrigin,
        max_polls: u32,
        interval: Duration,
    ) -> Result<ChildCompletion, InvokeError> {
        for poll in 0..max_polls {
            let execution = match self.store.find_execution(execution_id).await {
                Ok(execution) => execution,
                Err(StoreError::ExecutionNotFound { execution_id }) => {
                    return Err(InvokeError::Engine(EngineError::ExecutionNotFound {
                        execution_id,
                    }));
                }
                Err(e) => return Err(InvokeError::Engine(EngineError::from(e))),
            };

            match execution.status {
                ExecutionStatus::Success => {
                    let note = execution
                        .output
                        .is_none()
                        .then(|| "child execution produced no explicit output".to_string());
                    return Ok(ChildCompletion {
                        execution_id,
                        output: execution.output,
                        note,
                    });
                }
                ExecutionStatus::Failed => {
                    let deep_link = origin
                        .via_agent
                        .then(|| self.engine.config().execution_link(execution_id))
                        .flatten();
                    return Err(InvokeError::ChildFailed {
                        execution_id,
                        message: execution
                            .status_message
                            .unwrap_or_else(|| "child execution failed".to_string()),
                        deep_link,
                    });
                }
                ExecutionStatus::NeedsInput | ExecutionStatus::Scheduled => {
                    return Err(InvokeError::UnsupportedChildState {
                        execution_id,
                        status: execution.status,
                    });
                }
                ExecutionStatus::Running => {
                    debug!(execution = %execution_id, poll, "child still running");
                    self.sleeper.sleep(interval).await;
                }
            }
        }

        Err(InvokeError::Timeout {
            execution_id,
            polls: max_polls,
        })
    }

    /// Starts a child inline and waits for it with the configured bounds.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::invoke`] and [`Self::await_completion`] errors.
    pub async fn invoke_and_wait(
        &self,
        workflow_id: WorkflowId,
        input: Option<JsonValue>,
        origin: &InvokeOrigin,
    ) -> Result<ChildCompletion, InvokeError> {
        let poll = &self.engine.config().poll;
        let execution = self.invoke(workflow_id, input, origin, true).await?;
        self.await_completion(execution.id, origin, poll.max_polls, poll.interval())
            .await
    }
}
