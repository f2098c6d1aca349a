//! Wire-level domain models: the incoming payload, edges, and the
//! execution record returned to the caller.
//!
//! [`nodes::Node`] (the per-vertex type) lives in the `nodes` crate — see
//! its module docs for why. Everything else graph-shaped lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Directed edge between two nodes, with an optional routing label.
///
/// `source_handle` takes precedence over the legacy `condition` field when
/// both are present; either carries the same routing label (`"true"` /
/// `"false"` for condition-node gating, an arbitrary `output_path` string
/// for switch-node gating).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Wire name is `sourceHandle` (camelCase), a legacy inconsistency with
    /// the rest of the payload's `snake_case` fields — preserved rather
    /// than normalized.
    #[serde(default, rename = "sourceHandle")]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

impl Edge {
    /// The routing label this edge carries, if any.
    pub fn label(&self) -> Option<&str> {
        self.source_handle.as_deref().or(self.condition.as_deref())
    }

    pub fn is_conditional(&self) -> bool {
        self.label().is_some()
    }
}

/// A node as it appears on the wire, before kind inference. `type` is
/// optional here even though [`Node::kind`] is not — spec.md §4.5 infers a
/// missing kind from `data`'s field shape, which can only happen once the
/// raw JSON has been looked at. See [`crate::engine::infer_kind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// The top-level JSON payload an execution is constructed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub nodes: Vec<RawNode>,
    pub edges: Vec<Edge>,
}

/// Result handed back to the caller after `execute()` completes (whether
/// or not it succeeded) — always has a well-formed `execution_id` and
/// `errors` list so callers can correlate failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub workflow_id: String,
    pub node_results: HashMap<String, Value>,
    pub errors: Vec<String>,
    pub final_output: Value,
}
