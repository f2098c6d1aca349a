//! Engine-level error types.
//!
//! The nine kinds mirror the taxonomy every collaborator (graph, state,
//! evaluator, registry, engine) raises into: payload parsing, graph shape,
//! resource validation, executor failure, runtime limits, security policy,
//! timeouts, expression evaluation, and snapshot versioning.

use thiserror::Error;

/// Errors produced anywhere in the workflow engine.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Malformed JSON, a missing required field, or an edge with an
    /// unresolved endpoint discovered at parse time.
    #[error("payload error: {0}")]
    Payload(String),

    /// The node/edge graph is not a valid DAG.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A stored value exceeds a configured resource ceiling.
    #[error("validation error: {0}")]
    Validation(String),

    /// A node executor rejected its inputs or failed at runtime.
    #[error("node '{node_id}' failed: {message}")]
    Executor { node_id: String, message: String },

    /// A runtime counter (node executions, HTTP calls, loop iterations)
    /// exceeded its configured ceiling.
    #[error("limit exceeded: {0}")]
    Limit(String),

    /// HTTP disabled, target IP class blocked, or domain not allowlisted.
    #[error("security error: {0}")]
    Security(String),

    /// The workflow-level or a nested timeout scope expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Parse or evaluation failure in the expression DSL.
    #[error(transparent)]
    Expression(#[from] crate::expr::ExpressionError),

    /// Snapshot version mismatch or malformed snapshot payload.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Graph-shape errors raised by [`crate::graph::topological_sort`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id: '{0}'")]
    DuplicateNodeId(String),

    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    #[error("workflow graph contains a cycle")]
    CycleDetected,
}

impl From<nodes::NodeError> for EngineError {
    fn from(err: nodes::NodeError) -> Self {
        match err {
            nodes::NodeError::Fatal { node_id, message } => {
                EngineError::Executor { node_id, message }
            }
        }
    }
}
