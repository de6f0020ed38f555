//! Workflow node types.
//!
//! Nodes are the steps of a workflow. Each node has:
//! - A unique ID within the workflow
//! - A kind (trigger or action)
//! - A binding to an app-provided capability
//! - A resolved configuration value (JSON)

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The workflow's entry point. Exactly one per workflow.
    Trigger,
    /// An executable step provided by an app.
    Action,
}

/// A reference to an app-provided capability.
///
/// For trigger nodes the name identifies a polling trigger; for action
/// nodes it identifies an action. The engine resolves bindings through the
/// app registry and never inspects the ids beyond lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBinding {
    /// The app that provides the capability (e.g. "mail").
    pub app_id: String,
    /// The capability name within the app (e.g. "send").
    pub name: String,
}

impl AppBinding {
    /// Creates a binding.
    #[must_use]
    pub fn new(app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for AppBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app_id, self.name)
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    /// Whether this node is the trigger or an action.
    pub kind: NodeKind,
    /// The app capability this node executes.
    pub binding: AppBinding,
    /// The node's resolved configuration value.
    pub value: JsonValue,
}

impl Node {
    /// Creates a new node.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        binding: AppBinding,
        value: JsonValue,
    ) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            binding,
            value,
        }
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(
        id: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        binding: AppBinding,
        value: JsonValue,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            binding,
            value,
        }
    }

    /// Returns true if this node is the workflow's trigger.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.kind == NodeKind::Trigger
    }
}
