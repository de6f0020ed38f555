//! App plugin contract for the switchyard platform.
//!
//! Every vendor integration ("app") ships actions and polling triggers that
//! implement the traits in this crate. The engine consumes them through a
//! registry and never branches on vendor identity:
//!
//! - **Action**: one executable step: run, mock-run, optional interrupting
//!   response handling for pause/resume-capable steps
//! - **PollingTrigger**: fetches candidate event records and extracts the
//!   timestamp used for watermark-based deduplication
//! - **AppRegistry**: `(app id, name)` lookup of registered capabilities

pub mod action;
pub mod error;
pub mod registry;
pub mod trigger;

pub use action::{Action, ActionContext, ActionKind, InterruptResponse};
pub use error::{ActionError, RegistryError};
pub use registry::AppRegistry;
pub use trigger::{PollContext, PollingTrigger};
