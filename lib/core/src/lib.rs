//! Core domain types and utilities for the switchyard platform.
//!
//! This crate provides the foundational identifier types and error handling
//! used throughout the switchyard workflow-automation engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{EdgeId, ExecutionId, ProjectId, TriggerId, WorkflowId};
