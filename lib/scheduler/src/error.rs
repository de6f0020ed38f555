//! Error types for the scheduler crate.

use std::fmt;
use switchyard_core::WorkflowId;
use switchyard_integration::{ActionError, RegistryError};
use switchyard_workflow::StoreError;

/// Errors from poll cycles and resume sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The workflow cannot be polled (e.g. no single trigger node).
    InvalidWorkflow {
        workflow_id: WorkflowId,
        reason: String,
    },
    /// The trigger binding resolved to nothing.
    Registry(RegistryError),
    /// The trigger's fetch failed; the cycle is abandoned and the
    /// watermark stays untouched.
    Trigger(ActionError),
    /// Persistence failed.
    Store(StoreError),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWorkflow {
                workflow_id,
                reason,
            } => {
                write!(f, "workflow {workflow_id} cannot be polled: {reason}")
            }
            Self::Registry(e) => write!(f, "trigger lookup failed: {e}"),
            Self::Trigger(e) => write!(f, "trigger fetch failed: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for PollError {}

impl From<RegistryError> for PollError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<ActionError> for PollError {
    fn from(e: ActionError) -> Self {
        Self::Trigger(e)
    }
}

impl From<StoreError> for PollError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_workflow_display() {
        let err = PollError::InvalidWorkflow {
            workflow_id: WorkflowId::new(),
            reason: "workflow must have exactly one trigger node, found 0".to_string(),
        };
        assert!(err.to_string().contains("cannot be polled"));
    }

    #[test]
    fn trigger_error_display() {
        let err = PollError::Trigger(ActionError::failed("rate limited"));
        assert!(err.to_string().contains("rate limited"));
    }
}
