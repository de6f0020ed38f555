//! Trigger polling and resume scheduling for switchyard workflows.
//!
//! This crate provides:
//!
//! - **Watermark Filter**: Deduplication of polled records against a
//!   per-trigger high-water mark
//! - **Trigger Poller**: Serialized per-trigger poll cycles that turn new
//!   records into executions
//! - **Resume Sweep**: Waking SCHEDULED executions whose continue-at time
//!   has passed

pub mod error;
pub mod poller;
pub mod watermark;

pub use error::PollError;
pub use poller::{PollOutcome, TriggerPoller};
pub use watermark::{FilterOutcome, filter};
