//! Decide-path reconciliation and branch selection.
//!
//! A decide node's config persists one labeled option per outgoing edge.
//! Users rename labels freely; the graph's edges change underneath them as
//! branches are connected and disconnected. Reconciliation syncs the saved
//! options with the live edges while preserving user edits:
//!
//! - Options whose edge was disconnected are dropped
//! - Options whose edge survives keep their (possibly renamed) label
//! - New edges get an option labeled after the connected node, with the
//!   smallest `" (n)"` suffix that keeps labels unique
//!
//! At execution start the reconciled options are frozen into the
//! execution's node copy; historical runs resolve their branch selection
//! against the recorded options, never the live graph.

use crate::edge::Edge;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use switchyard_core::EdgeId;

/// The key under which path options live in a decide node's value.
pub const PATHS_KEY: &str = "paths";

/// A labeled branch option of a decide node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecidePathOption {
    /// User-editable branch label.
    pub label: String,
    /// The edge this branch follows.
    pub path_id: EdgeId,
}

impl DecidePathOption {
    /// Creates an option.
    #[must_use]
    pub fn new(label: impl Into<String>, path_id: EdgeId) -> Self {
        Self {
            label: label.into(),
            path_id,
        }
    }
}

/// Reconciles saved path options against the live outgoing edges.
///
/// `node_name_of` maps a target node id to its display name for labeling
/// newly connected branches.
#[must_use]
pub fn reconcile(
    saved: &[DecidePathOption],
    live_edges: &[&Edge],
    node_name_of: impl Fn(NodeId) -> Option<String>,
) -> Vec<DecidePathOption> {
    let mut options: Vec<DecidePathOption> = saved
        .iter()
        .filter(|option| live_edges.iter().any(|e| e.id == option.path_id))
        .cloned()
        .collect();

    for edge in live_edges {
        if options.iter().any(|o| o.path_id == edge.id) {
            continue;
        }
        let base = node_name_of(edge.target).unwrap_or_else(|| "Path".to_string());
        let label = unique_label(&base, &options);
        options.push(DecidePathOption::new(label, edge.id));
    }

    options
}

/// Returns `base` or `base (n)` with the smallest `n >= 2` that does not
/// collide with an existing label.
fn unique_label(base: &str, existing: &[DecidePathOption]) -> String {
    let taken = |candidate: &str| existing.iter().any(|o| o.label == candidate);

    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base} ({n})");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Maps a decide action's decision value to the selected edge ids.
///
/// The decision may be a bare string or an object carrying a `path` field;
/// it matches an option by label first, then by edge id display form.
#[must_use]
pub fn selected_edges(options: &[DecidePathOption], decision: &JsonValue) -> Vec<EdgeId> {
    let Some(choice) = decision
        .as_str()
        .or_else(|| decision.get("path").and_then(JsonValue::as_str))
    else {
        return Vec::new();
    };

    options
        .iter()
        .filter(|o| o.label == choice || o.path_id.to_string() == choice)
        .map(|o| o.path_id)
        .collect()
}

/// Reads the path options recorded in a decide node's value.
#[must_use]
pub fn options_from_value(value: &JsonValue) -> Vec<DecidePathOption> {
    value
        .get(PATHS_KEY)
        .and_then(|paths| serde_json::from_value(paths.clone()).ok())
        .unwrap_or_default()
}

/// Writes path options into a decide node's value, replacing any existing
/// entries.
pub fn write_options(value: &mut JsonValue, options: &[DecidePathOption]) {
    let serialized = serde_json::to_value(options).unwrap_or(JsonValue::Array(Vec::new()));
    match value {
        JsonValue::Object(map) => {
            map.insert(PATHS_KEY.to_string(), serialized);
        }
        other => {
            *other = serde_json::json!({ PATHS_KEY: serialized });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn edges_with_names(names: &[&str]) -> (Vec<Edge>, HashMap<NodeId, String>) {
        let source = NodeId::new();
        let mut edges = Vec::new();
        let mut labels = HashMap::new();
        for name in names {
            let target = NodeId::new();
            labels.insert(target, (*name).to_string());
            edges.push(Edge::new(source, target));
        }
        (edges, labels)
    }

    fn lookup(labels: &HashMap<NodeId, String>) -> impl Fn(NodeId) -> Option<String> + '_ {
        move |id| labels.get(&id).cloned()
    }

    #[test]
    fn fresh_edges_get_node_name_labels() {
        let (edges, labels) = edges_with_names(&["Approve", "Reject"]);
        let refs: Vec<&Edge> = edges.iter().collect();

        let options = reconcile(&[], &refs, lookup(&labels));

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "Approve");
        assert_eq!(options[1].label, "Reject");
        assert_eq!(options[0].path_id, edges[0].id);
    }

    #[test]
    fn renamed_label_survives_reconcile() {
        let (edges, labels) = edges_with_names(&["Approve", "Reject"]);
        let refs: Vec<&Edge> = edges.iter().collect();
        let mut options = reconcile(&[], &refs, lookup(&labels));

        options[0].label = "Fast track".to_string();
        let again = reconcile(&options, &refs, lookup(&labels));

        assert_eq!(again, options);
        assert_eq!(again[0].label, "Fast track");
    }

    #[test]
    fn disconnected_edge_drops_its_option() {
        let (edges, labels) = edges_with_names(&["Approve", "Reject"]);
        let refs: Vec<&Edge> = edges.iter().collect();
        let options = reconcile(&[], &refs, lookup(&labels));

        let only_first = vec![&edges[0]];
        let pruned = reconcile(&options, &only_first, lookup(&labels));

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].path_id, edges[0].id);
    }

    #[test]
    fn new_edge_appends_uniquely_labeled_option() {
        let (mut edges, mut labels) = edges_with_names(&["Notify"]);
        let refs: Vec<&Edge> = edges.iter().collect();
        let options = reconcile(&[], &refs, lookup(&labels));

        // Connect a second branch to a node with a colliding name.
        let target = NodeId::new();
        labels.insert(target, "Notify".to_string());
        edges.push(Edge::new(edges[0].source, target));
        let refs: Vec<&Edge> = edges.iter().collect();

        let grown = reconcile(&options, &refs, lookup(&labels));
        assert_eq!(grown.len(), 2);
        assert_eq!(grown[0].label, "Notify");
        assert_eq!(grown[1].label, "Notify (2)");
    }

    #[test]
    fn label_collision_picks_smallest_suffix() {
        let existing = vec![
            DecidePathOption::new("Notify", EdgeId::new()),
            DecidePathOption::new("Notify (2)", EdgeId::new()),
        ];
        assert_eq!(unique_label("Notify", &existing), "Notify (3)");
    }

    #[test]
    fn selection_matches_label_and_edge_id() {
        let edge_id = EdgeId::new();
        let options = vec![DecidePathOption::new("Approve", edge_id)];

        assert_eq!(selected_edges(&options, &json!("Approve")), vec![edge_id]);
        assert_eq!(
            selected_edges(&options, &json!({"path": edge_id.to_string()})),
            vec![edge_id]
        );
        assert!(selected_edges(&options, &json!("Unknown")).is_empty());
        assert!(selected_edges(&options, &json!(42)).is_empty());
    }

    #[test]
    fn options_roundtrip_through_node_value() {
        let options = vec![DecidePathOption::new("Approve", EdgeId::new())];
        let mut value = json!({"criteria": "urgency"});

        write_options(&mut value, &options);
        let read = options_from_value(&value);

        assert_eq!(read, options);
        assert_eq!(value["criteria"], "urgency");
    }

    #[test]
    fn missing_paths_reads_as_empty() {
        assert!(options_from_value(&json!({})).is_empty());
        assert!(options_from_value(&json!(null)).is_empty());
    }
}
