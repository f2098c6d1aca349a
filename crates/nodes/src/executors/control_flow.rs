//! Branching and iteration: `condition`, `for_each`, `while_loop`, `filter`,
//! `map`, `reduce`.
//!
//! `for_each` drives a nested body through
//! [`ExecutionContext::execute_body`], binding the current element to the
//! `item` variable before each dispatch — the same mechanism
//! `retry`/`try_catch`/`timeout`/`parallel` use in `executors::resilience`
//! and `executors::advanced`. `filter`/`map`/`reduce` evaluate an inline
//! expression per element rather than dispatching a body node, but set
//! `variables.item` the same way before each evaluation, so a predicate can
//! reference either the bound `item` directly or `variables.item`.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::util::{resolve_array, str_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

fn parse_body(node_id: &str, data: &Value) -> Result<Node, NodeError> {
    let raw = data
        .get("body")
        .ok_or_else(|| NodeError::fatal(node_id, "missing field 'body'"))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| NodeError::fatal(node_id, format!("invalid 'body' node: {e}")))
}

/// `data: { "condition": "<expr>" }`.
pub struct ConditionNode;

#[async_trait]
impl ExecutableNode for ConditionNode {
    fn kind(&self) -> &'static str {
        "condition"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let condition = str_field(&node.id, &node.data, "condition")?;
        let value = ctx.input(&node.id);
        let met = ctx.evaluate_bool(&condition, &value)?;
        Ok(json!({
            "condition_met": met,
            "path": if met { "true" } else { "false" },
            "true_path": met,
            "false_path": !met,
            "value": value,
            "condition": condition,
        }))
    }
}

/// `data: { "body": Node, "input"?: "<expr>" }`.
pub struct ForEachNode;

#[async_trait]
impl ExecutableNode for ForEachNode {
    fn kind(&self) -> &'static str {
        "for_each"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let body = parse_body(&node.id, &node.data)?;
        let array = resolve_array(ctx, node, "input")?;

        let limit = ctx.config().max_for_each_iterations;
        if limit > 0 && array.len() as u64 > limit {
            return Err(NodeError::fatal(&node.id, format!("for_each array length {} exceeds limit {limit}", array.len())));
        }

        let mut results = Vec::with_capacity(array.len());
        for item in array {
            if ctx.is_cancelled() {
                return Err(NodeError::fatal(&node.id, "execution cancelled"));
            }
            ctx.set_variable("item", item)?;
            results.push(ctx.execute_body(&body).await?);
        }
        Ok(Value::Array(results))
    }
}

/// `data: { "body": Node, "condition": "<expr>", "max_iterations"?: number }`.
///
/// The condition is evaluated against the current accumulator value before
/// each iteration; the body is expected to advance it.
pub struct WhileLoopNode;

#[async_trait]
impl ExecutableNode for WhileLoopNode {
    fn kind(&self) -> &'static str {
        "while_loop"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let body = parse_body(&node.id, &node.data)?;
        let condition = str_field(&node.id, &node.data, "condition")?;
        let limit = node
            .data
            .get("max_iterations")
            .and_then(|v| v.as_u64())
            .unwrap_or(ctx.config().max_iterations);

        let mut iterations: u64 = 0;
        loop {
            if ctx.is_cancelled() {
                return Err(NodeError::fatal(&node.id, "execution cancelled"));
            }
            let current = ctx.get_accumulator();
            if !ctx.evaluate_bool(&condition, &current)? {
                break;
            }
            if limit > 0 && iterations >= limit {
                return Err(NodeError::fatal(&node.id, format!("while_loop exceeded {limit} iterations")));
            }
            ctx.execute_body(&body).await?;
            iterations += 1;
        }

        Ok(json!({ "iterations": iterations, "accumulator": ctx.get_accumulator() }))
    }
}

/// `data: { "predicate": "<expr>", "input"?: "<expr>" }`.
pub struct FilterNode;

#[async_trait]
impl ExecutableNode for FilterNode {
    fn kind(&self) -> &'static str {
        "filter"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let predicate = str_field(&node.id, &node.data, "predicate")?;
        let array = resolve_array(ctx, node, "input")?;
        let mut out = Vec::new();
        for item in array {
            ctx.set_variable("item", item.clone())?;
            if ctx.evaluate_bool(&predicate, &item)? {
                out.push(item);
            }
        }
        Ok(Value::Array(out))
    }
}

/// `data: { "expr": "<expr>", "input"?: "<expr>" }`.
pub struct MapNode;

#[async_trait]
impl ExecutableNode for MapNode {
    fn kind(&self) -> &'static str {
        "map"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let expr = str_field(&node.id, &node.data, "expr")?;
        let array = resolve_array(ctx, node, "input")?;
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            ctx.set_variable("item", item.clone())?;
            out.push(ctx.evaluate_value(&expr, &item)?);
        }
        Ok(Value::Array(out))
    }
}

/// `data: { "expr": "<expr>", "initial"?: value, "input"?: "<expr>" }`.
///
/// `expr` is evaluated with `{ "item": <element>, "acc": <accumulator> }` as
/// its bound value, so it can reference `item.item` / `item.acc` via the
/// evaluator's path syntax; `variables.item` is also set to the raw element
/// per iteration, for parity with `filter`/`map`.
pub struct ReduceNode;

#[async_trait]
impl ExecutableNode for ReduceNode {
    fn kind(&self) -> &'static str {
        "reduce"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let expr = str_field(&node.id, &node.data, "expr")?;
        let array = resolve_array(ctx, node, "input")?;
        let mut acc = node.data.get("initial").cloned().unwrap_or(Value::Null);

        for item in array {
            ctx.set_variable("item", item.clone())?;
            let bound = json!({ "item": item, "acc": acc });
            acc = ctx.evaluate_value(&expr, &bound)?;
        }

        ctx.set_accumulator(acc.clone());
        Ok(acc)
    }
}
