//! Shared helpers for reading `node.data` fields and coercing JSON values.

use serde_json::Value;

use crate::traits::{ExecutionContext, Node};
use crate::NodeError;

pub fn field<'a>(data: &'a Value, name: &str) -> Option<&'a Value> {
    data.get(name)
}

pub fn str_field(node_id: &str, data: &Value, name: &str) -> Result<String, NodeError> {
    field(data, name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| NodeError::fatal(node_id, format!("missing or non-string field '{name}'")))
}

pub fn opt_str_field(data: &Value, name: &str) -> Option<String> {
    field(data, name).and_then(|v| v.as_str()).map(|s| s.to_string())
}

pub fn f64_field(node_id: &str, data: &Value, name: &str) -> Result<f64, NodeError> {
    field(data, name)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| NodeError::fatal(node_id, format!("missing or non-numeric field '{name}'")))
}

pub fn opt_f64_field(data: &Value, name: &str) -> Option<f64> {
    field(data, name).and_then(|v| v.as_f64())
}

pub fn opt_u64_field(data: &Value, name: &str) -> Option<u64> {
    field(data, name).and_then(|v| v.as_u64())
}

pub fn as_number(node_id: &str, v: &Value) -> Result<f64, NodeError> {
    v.as_f64().ok_or_else(|| NodeError::fatal(node_id, format!("expected a number, got {v}")))
}

pub fn as_array<'a>(node_id: &str, v: &'a Value) -> Result<&'a Vec<Value>, NodeError> {
    v.as_array().ok_or_else(|| NodeError::fatal(node_id, format!("expected an array, got {v}")))
}

/// Resolves an array input for a node: `data.<field>` as an evaluator
/// expression if present, otherwise the node's plain predecessor input.
pub fn resolve_array(
    ctx: &dyn ExecutionContext,
    node: &Node,
    field: &str,
) -> Result<Vec<Value>, NodeError> {
    let value = match opt_str_field(&node.data, field) {
        Some(expr) => ctx.evaluate_value(&expr, &Value::Null)?,
        None => ctx.input(&node.id),
    };
    as_array(&node.id, &value).cloned()
}

/// Truthiness used by `compact` and boolean-ish coercions: `null`, `false`,
/// `0`, and an empty string/array are falsy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
