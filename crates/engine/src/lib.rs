//! `engine` crate — the Graph, State Manager, Expression Evaluator, and the
//! `Engine` orchestrator that dispatches workflow nodes through `nodes`'s
//! executor registry.

pub mod engine;
pub mod error;
pub mod expr;
pub mod graph;
pub mod models;
pub mod observer;
pub mod snapshot;
pub mod state;

pub use engine::{infer_kind, Engine};
pub use error::{EngineError, GraphError};
pub use expr::{EvalContext, Expr, ExpressionError};
pub use graph::Graph;
pub use models::{Edge, ExecutionRecord, Payload, RawNode};
pub use observer::{Event, NoopObserver, Observer, ObserverManager};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use state::StateManager;

#[cfg(test)]
mod engine_tests;
