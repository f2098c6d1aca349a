//! Advanced control nodes: `switch`, `parallel`, `join`, `split`, `delay`,
//! `cache`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::util::{opt_str_field, opt_u64_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// `data: { "cases": [{ "when": "<expr>", "outputPath": "<label>" }],
/// "default"?: "<label>" }`. First matching case wins, evaluated in order.
pub struct SwitchNode;

#[async_trait]
impl ExecutableNode for SwitchNode {
    fn kind(&self) -> &'static str {
        "switch"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let value = ctx.input(&node.id);
        let cases = node
            .data
            .get("cases")
            .and_then(|v| v.as_array())
            .ok_or_else(|| NodeError::fatal(&node.id, "missing field 'cases'"))?;

        for case in cases {
            let when = case
                .get("when")
                .and_then(|v| v.as_str())
                .ok_or_else(|| NodeError::fatal(&node.id, "switch case missing 'when'"))?;
            if ctx.evaluate_bool(when, &value)? {
                let output_path = case.get("outputPath").and_then(|v| v.as_str()).unwrap_or("default");
                return Ok(json!({ "matched": true, "output_path": output_path, "case": when, "value": value }));
            }
        }

        let default = opt_str_field(&node.data, "default").unwrap_or_else(|| "default".to_string());
        Ok(json!({ "matched": false, "output_path": default, "case": Value::Null, "value": value }))
    }
}

/// `data: { "branches": [Node], "mode"?: "all"|"race" }`. `"all"` (default)
/// runs every branch to completion and fails if any does; `"race"` returns
/// the first to finish (success or failure).
///
/// Branches share the same `&dyn ExecutionContext` borrow, so they cannot be
/// `tokio::spawn`ed onto separate tasks; this drives them concurrently on
/// the current task via `tokio::select!` instead of true OS-level
/// parallelism — see `DESIGN.md`.
pub struct ParallelNode;

#[async_trait]
impl ExecutableNode for ParallelNode {
    fn kind(&self) -> &'static str {
        "parallel"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let branches_raw = node
            .data
            .get("branches")
            .and_then(|v| v.as_array())
            .ok_or_else(|| NodeError::fatal(&node.id, "missing field 'branches'"))?;
        let branches: Vec<Node> = branches_raw
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| NodeError::fatal(&node.id, format!("invalid branch node: {e}")))?;
        let mode = opt_str_field(&node.data, "mode").unwrap_or_else(|| "all".to_string());

        match mode.as_str() {
            "all" => {
                let mut pending: Vec<_> = branches.iter().map(|b| Box::pin(ctx.execute_body(b))).collect();
                let mut results = Vec::with_capacity(pending.len());
                while !pending.is_empty() {
                    let (result, index, rest) = futures::future::select_all(pending).await;
                    results.push((index, result?));
                    pending = rest;
                }
                results.sort_by_key(|(i, _)| *i);
                Ok(Value::Array(results.into_iter().map(|(_, v)| v).collect()))
            }
            "race" => {
                let pending: Vec<_> = branches.iter().map(|b| Box::pin(ctx.execute_body(b))).collect();
                let (result, _, _) = futures::future::select_all(pending).await;
                result.map(|v| json!({ "winner": v }))
            }
            other => Err(NodeError::fatal(&node.id, format!("unknown parallel mode '{other}'"))),
        }
    }
}

/// Combines all predecessor results into a single array — a pass-through
/// merge point for fan-in after a `parallel`/`split`.
pub struct JoinNode;

#[async_trait]
impl ExecutableNode for JoinNode {
    fn kind(&self) -> &'static str {
        "join"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        Ok(Value::Array(ctx.inputs(&node.id)))
    }
}

/// Fan-out marker: re-emits its input unchanged so multiple downstream edges
/// can each read the same value.
pub struct SplitNode;

#[async_trait]
impl ExecutableNode for SplitNode {
    fn kind(&self) -> &'static str {
        "split"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        Ok(ctx.input(&node.id))
    }
}

/// `data: { "duration": <milliseconds> }`.
pub struct DelayNode;

#[async_trait]
impl ExecutableNode for DelayNode {
    fn kind(&self) -> &'static str {
        "delay"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let ms = opt_u64_field(&node.data, "duration").unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(ctx.input(&node.id))
    }
}

/// `data: { "key": "<expr>", "ttl_ms"?: number, "value"?: "<expr>" }`.
/// Get-or-compute: returns the cached value if present and unexpired,
/// otherwise evaluates `value` (or falls back to the node's input) and
/// stores it.
pub struct CacheNode;

#[async_trait]
impl ExecutableNode for CacheNode {
    fn kind(&self) -> &'static str {
        "cache"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let key_expr = super::util::str_field(&node.id, &node.data, "key")?;
        let input = ctx.input(&node.id);
        let key = match ctx.evaluate_value(&key_expr, &input)? {
            Value::String(s) => s,
            other => other.to_string(),
        };

        if let Some(cached) = ctx.get_cache(&key) {
            return Ok(cached);
        }

        let value = match opt_str_field(&node.data, "value") {
            Some(expr) => ctx.evaluate_value(&expr, &input)?,
            None => input,
        };
        let ttl_ms = opt_u64_field(&node.data, "ttl_ms").unwrap_or(60_000);
        ctx.set_cache(&key, value.clone(), Duration::from_millis(ttl_ms));
        Ok(value)
    }
}
