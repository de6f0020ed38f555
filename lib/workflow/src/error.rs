//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: Structural problems in the workflow graph
//! - `EngineError`: Execution lifecycle failures
//! - `InvokeError`: Synchronous sub-workflow invocation failures
//!
//! Action failures during a run are NOT errors at this layer: they fail the
//! execution (FAILED status plus message) and the engine returns the failed
//! snapshot normally.

use crate::execution::ExecutionStatus;
use crate::node::NodeId;
use crate::store::StoreError;
use std::fmt;
use switchyard_core::{ExecutionId, WorkflowId};

/// Errors from graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// The workflow does not have exactly one trigger node.
    TriggerCount { found: usize },
    /// Graph contains cycles.
    CycleDetected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::TriggerCount { found } => {
                write!(f, "workflow must have exactly one trigger node, found {found}")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from the execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Workflow not found.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Execution not found.
    ExecutionNotFound { execution_id: ExecutionId },
    /// The workflow is disabled and cannot be executed.
    WorkflowDisabled { workflow_id: WorkflowId },
    /// The workflow graph failed validation.
    InvalidGraph { reason: String },
    /// A node references a capability nothing is registered for.
    UnknownBinding { node_id: NodeId, binding: String },
    /// A node's configuration failed validation before the run started.
    Validation { node_id: NodeId, reason: String },
    /// A resume request targeted an execution or node that cannot resume.
    InvalidResume {
        execution_id: ExecutionId,
        reason: String,
    },
    /// Persistence failed.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::ExecutionNotFound { execution_id } => {
                write!(f, "execution not found: {execution_id}")
            }
            Self::WorkflowDisabled { workflow_id } => {
                write!(f, "workflow is disabled: {workflow_id}")
            }
            Self::InvalidGraph { reason } => {
                write!(f, "invalid workflow graph: {reason}")
            }
            Self::UnknownBinding { node_id, binding } => {
                write!(f, "node {node_id} references unknown capability {binding}")
            }
            Self::Validation { node_id, reason } => {
                write!(f, "node {node_id} config invalid: {reason}")
            }
            Self::InvalidResume {
                execution_id,
                reason,
            } => {
                write!(f, "cannot resume execution {execution_id}: {reason}")
            }
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Errors from synchronous sub-workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// A workflow attempted to invoke itself.
    SelfInvocation { workflow_id: WorkflowId },
    /// The target workflow does not exist in the caller's project.
    NotFound { workflow_id: WorkflowId },
    /// The child ended up in a state that needs a human or an external
    /// event, which a synchronous caller cannot provide.
    UnsupportedChildState {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
    /// The polling bound was exceeded while the child was still running.
    Timeout { execution_id: ExecutionId, polls: u32 },
    /// The child execution failed.
    ChildFailed {
        execution_id: ExecutionId,
        message: String,
        /// Link to the failing child execution, when a public base URL is
        /// configured.
        deep_link: Option<String>,
    },
    /// The engine rejected the invocation before a child was started.
    Engine(EngineError),
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfInvocation { workflow_id } => {
                write!(f, "workflow {workflow_id} cannot invoke itself")
            }
            Self::NotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::UnsupportedChildState {
                execution_id,
                status,
            } => {
                write!(
                    f,
                    "child execution {execution_id} is {status}, which a synchronous invocation cannot wait out"
                )
            }
            Self::Timeout {
                execution_id,
                polls,
            } => {
                write!(
                    f,
                    "child execution {execution_id} did not finish within {polls} polls"
                )
            }
            Self::ChildFailed {
                execution_id,
                message,
                deep_link,
            } => {
                write!(f, "child execution {execution_id} failed: {message}")?;
                if let Some(link) = deep_link {
                    write!(f, " (see {link})")?;
                }
                Ok(())
            }
            Self::Engine(e) => write!(f, "invocation rejected: {e}"),
        }
    }
}

impl std::error::Error for InvokeError {}

impl From<EngineError> for InvokeError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}
