//! Executor registry: maps a node-kind tag to its executor implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::ExecutableNode;
use crate::NodeError;

/// Maps `node.kind` strings to registered executors.
///
/// Registration is exclusive — [`Registry::register`] fails if the kind is
/// already taken. Read-only during execution; all registration happens
/// before the engine starts running nodes.
#[derive(Default)]
pub struct Registry {
    executors: HashMap<&'static str, Arc<dyn ExecutableNode>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { executors: HashMap::new() }
    }

    /// Register an executor. Fails if its `kind()` is already registered.
    pub fn register(&mut self, executor: Arc<dyn ExecutableNode>) -> Result<(), NodeError> {
        let kind = executor.kind();
        if self.executors.contains_key(kind) {
            return Err(NodeError::fatal(
                "<registry>",
                format!("executor kind '{kind}' is already registered"),
            ));
        }
        self.executors.insert(kind, executor);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ExecutableNode>> {
        self.executors.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.executors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.executors.keys().copied().collect()
    }
}
