//! `rate_limit`, `schema_validator`, and the two context-definition nodes.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::util::{opt_u64_field, str_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// `data: { "max_per_interval": number, "interval_ms": number }`. Tracks a
/// sliding call log per node id in the shared TTL cache (key
/// `"__rate_limit__:<node_id>"`); blocks by sleeping out the remainder of
/// the interval rather than failing, once the limit is hit.
pub struct RateLimitNode;

#[async_trait]
impl ExecutableNode for RateLimitNode {
    fn kind(&self) -> &'static str {
        "rate_limit"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let max_per_interval = opt_u64_field(&node.data, "max_per_interval").unwrap_or(1);
        let interval_ms = opt_u64_field(&node.data, "interval_ms").unwrap_or(1_000);
        let cache_key = format!("__rate_limit__:{}", node.id);

        let count = ctx.get_cache(&cache_key).and_then(|v| v.as_u64()).unwrap_or(0);
        if count >= max_per_interval {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            ctx.set_cache(&cache_key, serde_json::json!(1), Duration::from_millis(interval_ms));
        } else {
            ctx.set_cache(&cache_key, serde_json::json!(count + 1), Duration::from_millis(interval_ms));
        }

        Ok(ctx.input(&node.id))
    }
}

/// `data: { "schema": { "type": "object"|"array"|"string"|"number"|
/// "boolean", "required"?: [String], "properties"?: { name: schema } } }`.
///
/// A deliberately small subset of JSON Schema: type checks plus required
/// object keys, recursively for `properties`. Fails fast on the first
/// mismatch instead of accumulating a full error list.
pub struct SchemaValidatorNode;

#[async_trait]
impl ExecutableNode for SchemaValidatorNode {
    fn kind(&self) -> &'static str {
        "schema_validator"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let schema = node
            .data
            .get("schema")
            .ok_or_else(|| NodeError::fatal(&node.id, "missing field 'schema'"))?;
        let input = ctx.input(&node.id);
        validate(&node.id, schema, &input)?;
        Ok(input)
    }
}

fn validate(node_id: &str, schema: &Value, value: &Value) -> Result<(), NodeError> {
    if let Some(expected) = schema.get("type").and_then(|v| v.as_str()) {
        let actual = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        if actual != expected {
            return Err(NodeError::fatal(node_id, format!("expected type '{expected}', got '{actual}'")));
        }
    }

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        let obj = value.as_object().ok_or_else(|| NodeError::fatal(node_id, "'required' needs an object value"))?;
        for key in required {
            let key = key.as_str().unwrap_or_default();
            if !obj.contains_key(key) {
                return Err(NodeError::fatal(node_id, format!("missing required property '{key}'")));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        if let Some(obj) = value.as_object() {
            for (key, sub_schema) in properties {
                if let Some(sub_value) = obj.get(key) {
                    validate(node_id, sub_schema, sub_value)?;
                }
            }
        }
    }

    Ok(())
}

/// `data: { "name": "<name>", "value": value }`.
///
/// Context nodes are exempt from the engine's pre-dispatch template
/// interpolation — their job is to *define* the context others interpolate
/// against — so unlike other nodes, `value` is taken as a literal JSON
/// value, not a pre-resolved string.
pub struct ContextVariableNode;

#[async_trait]
impl ExecutableNode for ContextVariableNode {
    fn kind(&self) -> &'static str {
        "context_variable"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let name = str_field(&node.id, &node.data, "name")?;
        let value = node.data.get("value").cloned().unwrap_or(Value::Null);
        ctx.set_context_variable(&name, value.clone());
        Ok(value)
    }
}

/// Same shape as `context_variable`, conceptually write-once: re-setting an
/// already-defined constant is allowed but logged, since the state manager
/// has no enforcement for it (see `DESIGN.md`).
pub struct ContextConstantNode;

#[async_trait]
impl ExecutableNode for ContextConstantNode {
    fn kind(&self) -> &'static str {
        "context_constant"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let name = str_field(&node.id, &node.data, "name")?;
        let value = node.data.get("value").cloned().unwrap_or(Value::Null);
        if ctx.get_context_constant(&name).is_some() {
            tracing::warn!(node_id = %node.id, constant = %name, "redefining an already-set context constant");
        }
        ctx.set_context_constant(&name, value.clone());
        Ok(value)
    }
}
