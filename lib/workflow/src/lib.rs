//! Workflow execution engine for the switchyard platform.
//!
//! This crate provides the core execution and orchestration machinery:
//!
//! - **Graph Model**: Directed graphs using petgraph with identified edges
//! - **Execution**: Per-run node snapshots with a monotonic status machine
//! - **Decide Paths**: Branch-option reconciliation and selection
//! - **Schedule Resumer**: Pause-until-time computation with past-date
//!   policies
//! - **Sub-workflow Invocation**: Bounded polling with cycle guards
//! - **Loop Runner**: Per-item child invocations with partial-failure
//!   aggregation
//! - **Stores**: Abstract persistence with in-memory and NATS KV adapters

pub mod batch;
pub mod config;
pub mod decide;
pub mod definition;
pub mod edge;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod graph;
pub mod invoke;
pub mod nats;
pub mod node;
pub mod resume;
pub mod store;

pub use batch::{BatchSummary, ItemFailure, ItemProcessor, LoopRunner, SubWorkflowProcessor};
pub use config::EngineConfig;
pub use decide::DecidePathOption;
pub use definition::{RunStrategy, Workflow, WorkflowMetadata};
pub use edge::Edge;
pub use engine::{Engine, ExecutionStatusView, ManualRunRequest, NodeResult};
pub use envelope::Envelope;
pub use error::{EngineError, GraphError, InvokeError};
pub use execution::{Execution, ExecutionStatus, NodeRun, NodeRunStatus};
pub use graph::WorkflowGraph;
pub use invoke::{ChildCompletion, InvokeOrigin, Sleeper, SubWorkflowInvoker, TokioSleeper};
pub use nats::{NatsExecutionStore, NatsStoreConfig};
pub use node::{AppBinding, Node, NodeId, NodeKind};
pub use resume::{OffsetType, OffsetUnit, PastDatePolicy, ResumeDecision, ResumePlan};
pub use store::{ExecutionStore, MemoryStore, StoreError};
