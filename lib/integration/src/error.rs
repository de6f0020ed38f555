//! Error types for the plugin contract.
//!
//! Errors are designed for layered context using rootcause:
//! - `ActionError`: Failures reported by app actions and triggers
//! - `RegistryError`: Unresolvable capability bindings

use std::fmt;

/// Errors reported by app actions and polling triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Required configuration is missing on the node.
    MissingConfig { field: String },
    /// Configuration is present but malformed.
    InvalidConfig { field: String, reason: String },
    /// The action's own execution failed.
    Failed { message: String },
    /// The upstream service rejected or dropped the call.
    Upstream { service: String, message: String },
}

impl ActionError {
    /// Creates a failure with the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Creates a missing-config error for the given field.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingConfig {
            field: field.into(),
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig { field } => {
                write!(f, "missing required config field '{field}'")
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid config field '{field}': {reason}")
            }
            Self::Failed { message } => write!(f, "action failed: {message}"),
            Self::Upstream { service, message } => {
                write!(f, "upstream service error ({service}): {message}")
            }
        }
    }
}

impl std::error::Error for ActionError {}

/// Errors from capability resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No action registered under the binding.
    UnknownAction { app_id: String, action_id: String },
    /// No polling trigger registered under the binding.
    UnknownTrigger { app_id: String, trigger_id: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction { app_id, action_id } => {
                write!(f, "no action registered for {app_id}/{action_id}")
            }
            Self::UnknownTrigger { app_id, trigger_id } => {
                write!(f, "no trigger registered for {app_id}/{trigger_id}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
