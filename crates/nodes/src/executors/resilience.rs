//! Resilience nodes: `retry`, `try_catch`, `timeout`. Each wraps a nested
//! `body` executed through [`ExecutionContext::execute_body`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::util::opt_u64_field;
use crate::config::BackoffStrategy;
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

fn parse_body(node_id: &str, data: &Value) -> Result<Node, NodeError> {
    let raw = data
        .get("body")
        .ok_or_else(|| NodeError::fatal(node_id, "missing field 'body'"))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| NodeError::fatal(node_id, format!("invalid 'body' node: {e}")))
}

fn parse_backoff(data: &Value) -> Option<BackoffStrategy> {
    match data.get("backoffStrategy")?.as_str()? {
        "constant" => Some(BackoffStrategy::Constant),
        "linear" => Some(BackoffStrategy::Linear),
        "exponential" => Some(BackoffStrategy::Exponential),
        _ => None,
    }
}

/// `data: { "body": Node, "maxAttempts"?: number, "backoffStrategy"?:
/// "constant"|"linear"|"exponential", "baseDelay"?: <milliseconds> }`.
///
/// Unspecified fields fall back to `Config::default_max_attempts` /
/// `Config::default_backoff`. The engine never retries a node
/// automatically — this is the only retry mechanism.
pub struct RetryNode;

#[async_trait]
impl ExecutableNode for RetryNode {
    fn kind(&self) -> &'static str {
        "retry"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let body = parse_body(&node.id, &node.data)?;
        let max_attempts = opt_u64_field(&node.data, "maxAttempts")
            .map(|v| v as u32)
            .unwrap_or(ctx.config().default_max_attempts)
            .max(1);
        let backoff = parse_backoff(&node.data).unwrap_or(ctx.config().default_backoff);
        let base_delay = Duration::from_millis(opt_u64_field(&node.data, "baseDelay").unwrap_or(100));

        let mut last_err = None;
        for attempt in 1..=max_attempts {
            if ctx.is_cancelled() {
                return Err(NodeError::fatal(&node.id, "execution cancelled"));
            }
            match ctx.execute_body(&body).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff.delay(base_delay, attempt)).await;
                    }
                }
            }
        }
        Err(NodeError::fatal(
            &node.id,
            format!("retry exhausted after {max_attempts} attempts: {}", last_err.unwrap()),
        ))
    }
}

/// `data: { "body": Node, "fallbackValue"?: value, "continueOnError"?: bool
/// (default true) }`.
pub struct TryCatchNode;

#[async_trait]
impl ExecutableNode for TryCatchNode {
    fn kind(&self) -> &'static str {
        "try_catch"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let body = parse_body(&node.id, &node.data)?;
        let continue_on_error = node.data.get("continueOnError").and_then(|v| v.as_bool()).unwrap_or(true);

        match ctx.execute_body(&body).await {
            Ok(value) => Ok(value),
            Err(e) if continue_on_error => {
                let fallback = node.data.get("fallbackValue").cloned().unwrap_or(Value::Null);
                tracing::debug!(node_id = %node.id, error = %e, "try_catch suppressed error");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }
}

/// `data: { "body": Node, "timeout": <milliseconds>, "timeoutAction"?:
/// "fail"|"fallback", "fallbackValue"?: value }`. `timeoutAction` is
/// informational beyond choosing whether a timed-out body is fatal or
/// returns `fallbackValue`; absent `fallbackValue` always means fatal.
pub struct TimeoutNode;

#[async_trait]
impl ExecutableNode for TimeoutNode {
    fn kind(&self) -> &'static str {
        "timeout"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let body = parse_body(&node.id, &node.data)?;
        let timeout_ms = node
            .data
            .get("timeout")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| NodeError::fatal(&node.id, "missing field 'timeout'"))?;

        match tokio::time::timeout(Duration::from_millis(timeout_ms), ctx.execute_body(&body)).await {
            Ok(result) => result,
            Err(_) => match node.data.get("fallbackValue") {
                Some(fallback) => Ok(fallback.clone()),
                None => Err(NodeError::fatal(&node.id, format!("body timed out after {timeout_ms}ms"))),
            },
        }
    }
}
