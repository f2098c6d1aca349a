//! Node-level error type.

use thiserror::Error;

/// Error returned by a node executor's `execute` method, or by any
/// [`crate::traits::ExecutionContext`] operation exposed to executors.
///
/// Node-level errors are always fatal to the enclosing execution unless an
/// enclosing `try_catch`, `retry`, or `timeout` control-flow executor
/// intercepts them — the engine itself never retries a node automatically.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    #[error("node '{node_id}' failed: {message}")]
    Fatal { node_id: String, message: String },
}

impl NodeError {
    pub fn fatal(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        NodeError::Fatal { node_id: node_id.into(), message: message.into() }
    }
}
