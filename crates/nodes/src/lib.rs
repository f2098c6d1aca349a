//! `nodes` crate — the `ExecutableNode` trait and built-in node implementations.
//!
//! Every node — built-in and plugin alike — must implement [`ExecutableNode`].
//! The engine crate dispatches execution through this trait object. This
//! crate also carries the shared vocabulary (`Config`, `Node`,
//! `ExecutionContext`, `NodeError`) that both it and `engine` need, since
//! `engine` depends on this crate and not the other way around.

pub mod config;
pub mod error;
pub mod executors;
pub mod mock;
pub mod registry;
pub mod traits;

pub use config::{BackoffStrategy, Config};
pub use error::NodeError;
pub use registry::Registry;
pub use traits::{ExecutableNode, ExecutionContext, Node};

/// Register every built-in executor into `registry`.
pub fn register_builtins(registry: &mut Registry) -> Result<(), NodeError> {
    executors::register_all(registry)
}
