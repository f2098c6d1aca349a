//! The node data model plus the `ExecutableNode` / `ExecutionContext`
//! contract every node must fulfil.
//!
//! `ExecutionContext` is defined here — in the leaf `nodes` crate — rather
//! than in `engine`, because of the cyclic-state-access inversion called
//! for by the design: the engine owns the graph, state manager, and
//! evaluator, but executors need to reach back into them. The standard fix
//! is for the engine to *implement* this interface and hand executors the
//! trait object, never the concrete engine. That only works if this crate
//! does not depend on `engine` — so the capability surface, the node data
//! model, and the shared `Config` all live here instead.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::NodeError;

/// A single step in the workflow graph.
///
/// Also used, unchanged, as the inline "body" definition nested inside a
/// control-flow node's `data` (e.g. `for_each.body`, `retry.body`) — those
/// bodies are not part of the main topological order and are re-dispatched
/// directly through [`ExecutionContext::execute_body`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique identifier within the workflow (referenced by edges).
    pub id: String,
    /// Tag selecting the registered executor. Renamed from the wire
    /// field `type` to the Rust-idiomatic `kind`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific configuration. Interpreted only by the executor
    /// `kind` names.
    #[serde(default)]
    pub data: Value,
}

/// Capability handle exposed to executors: read inputs, read/write state,
/// read config, call the evaluator, and — for control-flow executors —
/// recurse into a nested body through the same counters and cancellation
/// token the main loop uses.
///
/// Implemented by the engine; executors only ever see `&dyn
/// ExecutionContext`, never the concrete engine type.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    fn workflow_id(&self) -> &str;
    fn execution_id(&self) -> &str;
    fn config(&self) -> &Config;

    /// All predecessor node results feeding `node_id`, in edge-declaration
    /// order. Empty for a source node (no incoming edges).
    fn inputs(&self, node_id: &str) -> Vec<Value>;

    /// Convenience over [`Self::inputs`]: the single predecessor's result,
    /// or `Value::Null` if there is none, or a JSON array if there are
    /// several.
    fn input(&self, node_id: &str) -> Value {
        let mut inputs = self.inputs(node_id);
        match inputs.len() {
            0 => Value::Null,
            1 => inputs.remove(0),
            _ => Value::Array(inputs),
        }
    }

    // ---- variables ----
    fn get_variable(&self, name: &str) -> Option<Value>;
    fn set_variable(&self, name: &str, value: Value) -> Result<(), NodeError>;
    fn list_variables(&self) -> HashMap<String, Value>;

    // ---- context namespaces (two separate maps, both read via `context.`) ----
    fn get_context_variable(&self, name: &str) -> Option<Value>;
    fn set_context_variable(&self, name: &str, value: Value);
    fn get_context_constant(&self, name: &str) -> Option<Value>;
    fn set_context_constant(&self, name: &str, value: Value);

    // ---- accumulator / counter (single scalar slots) ----
    fn get_accumulator(&self) -> Value;
    fn set_accumulator(&self, value: Value);
    fn get_counter(&self) -> f64;
    fn set_counter(&self, value: f64);
    fn increment_counter(&self, delta: f64) -> f64;

    // ---- TTL cache ----
    fn get_cache(&self, key: &str) -> Option<Value>;
    fn set_cache(&self, key: &str, value: Value, ttl: Duration);

    // ---- expression evaluator ----
    /// Evaluate `expr` as a boolean predicate against `item`.
    fn evaluate_bool(&self, expr: &str, item: &Value) -> Result<bool, NodeError>;
    /// Evaluate `expr` as a value expression against `item`.
    fn evaluate_value(&self, expr: &str, item: &Value) -> Result<Value, NodeError>;
    /// Interpolate `{{ variable.NAME }}` / `{{ const.NAME }}` placeholders
    /// in `template`, leaving unresolved placeholders untouched.
    fn interpolate(&self, template: &str) -> String;

    // ---- resource counters ----
    /// Increments `node_execution_count`; errs if it now exceeds
    /// `Config::max_node_executions`.
    fn increment_node_execution(&self) -> Result<u64, NodeError>;
    /// Increments `http_call_count`; errs if it now exceeds
    /// `Config::max_http_calls_per_exec`.
    fn increment_http_call(&self) -> Result<u64, NodeError>;

    /// True once the workflow-level (or an enclosing nested) timeout has
    /// fired. Executors performing long blocking work should check this
    /// between steps.
    fn is_cancelled(&self) -> bool;

    /// Re-dispatch `body` through the registry under the same
    /// `ExecutionContext` — the mechanism by which `for_each`, `while`,
    /// `retry`, `try_catch`, `timeout`, and `parallel` drive sub-iterations
    /// while sharing counters and cancellation with the outer engine.
    async fn execute_body(&self, body: &Node) -> Result<Value, NodeError>;
}

/// The core node trait. All built-in executors and any third-party
/// extensions must implement this.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// The `kind` tag this executor handles.
    fn kind(&self) -> &'static str;

    /// Reject a structurally invalid `node.data` before execution begins.
    /// The default accepts anything; override to fail fast.
    fn validate(&self, node: &Node) -> Result<(), NodeError> {
        let _ = node;
        Ok(())
    }

    /// Execute the node and produce its result.
    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError>;
}
