//! Arithmetic over a node's predecessor inputs.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::util::{as_number, str_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// Folds `ctx.inputs(node.id)` left-to-right through `data.op`.
/// `data: { "op": "add" | "subtract" | "multiply" | "divide" | "modulo" }`.
pub struct OperationNode;

#[async_trait]
impl ExecutableNode for OperationNode {
    fn kind(&self) -> &'static str {
        "operation"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let op = str_field(&node.id, &node.data, "op")?;
        let inputs = ctx.inputs(&node.id);
        if inputs.is_empty() {
            return Err(NodeError::fatal(&node.id, "operation node has no inputs"));
        }

        let mut numbers = inputs.iter().map(|v| as_number(&node.id, v));
        let mut acc = numbers.next().unwrap()?;
        for next in numbers {
            let next = next?;
            acc = match op.as_str() {
                "add" => acc + next,
                "subtract" => acc - next,
                "multiply" => acc * next,
                "divide" => {
                    if next == 0.0 {
                        return Err(NodeError::fatal(&node.id, "division by zero"));
                    }
                    acc / next
                }
                "modulo" => {
                    if next == 0.0 {
                        return Err(NodeError::fatal(&node.id, "modulo by zero"));
                    }
                    acc % next
                }
                other => return Err(NodeError::fatal(&node.id, format!("unknown operation '{other}'"))),
            };
        }

        Ok(json!(acc))
    }
}
