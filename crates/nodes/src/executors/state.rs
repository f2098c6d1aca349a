//! State-manipulation nodes: `variable`, `extract`, `transform`,
//! `accumulator`, `counter`, `parse`, `format`.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::util::{opt_f64_field, opt_str_field, str_field};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// `data: { "varName": "<name>", "varOp": "set"|"get"|"delete", "value"?: "<expr>" }`.
///
/// There is no real delete for a single-slot variable store; `delete`
/// overwrites the slot with `null`, matching `state::VariableStore`'s flat
/// `HashMap<String, Value>` semantics.
pub struct VariableNode;

#[async_trait]
impl ExecutableNode for VariableNode {
    fn kind(&self) -> &'static str {
        "variable"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let name = str_field(&node.id, &node.data, "varName")?;
        let op = opt_str_field(&node.data, "varOp").unwrap_or_else(|| "get".to_string());

        match op.as_str() {
            "get" => Ok(ctx.get_variable(&name).unwrap_or(Value::Null)),
            "set" => {
                let value = match opt_str_field(&node.data, "value") {
                    Some(expr) => ctx.evaluate_value(&expr, &ctx.input(&node.id))?,
                    None => ctx.input(&node.id),
                };
                ctx.set_variable(&name, value.clone())?;
                Ok(value)
            }
            "delete" => {
                ctx.set_variable(&name, Value::Null)?;
                Ok(Value::Null)
            }
            other => Err(NodeError::fatal(&node.id, format!("unknown var_op '{other}'"))),
        }
    }
}

/// `data: { "path": "a.b.c" }`. Walks the input value's object fields.
pub struct ExtractNode;

#[async_trait]
impl ExecutableNode for ExtractNode {
    fn kind(&self) -> &'static str {
        "extract"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let path = str_field(&node.id, &node.data, "path")?;
        let input = ctx.input(&node.id);
        let out = path.split('.').fold(input, |acc, seg| acc.get(seg).cloned().unwrap_or(Value::Null));
        Ok(out)
    }
}

/// `data: { "expr": "<expr>" }`. A general-purpose evaluator pass-through.
pub struct TransformNode;

#[async_trait]
impl ExecutableNode for TransformNode {
    fn kind(&self) -> &'static str {
        "transform"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let expr = str_field(&node.id, &node.data, "expr")?;
        let input = ctx.input(&node.id);
        ctx.evaluate_value(&expr, &input)
    }
}

/// `data: { "op": "set"|"add"|"append", "value"?: "<expr>" }`.
pub struct AccumulatorNode;

#[async_trait]
impl ExecutableNode for AccumulatorNode {
    fn kind(&self) -> &'static str {
        "accumulator"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let op = opt_str_field(&node.data, "op").unwrap_or_else(|| "set".to_string());
        let input = ctx.input(&node.id);
        let value = match opt_str_field(&node.data, "value") {
            Some(expr) => ctx.evaluate_value(&expr, &input)?,
            None => input,
        };

        let next = match op.as_str() {
            "set" => value,
            "add" => {
                let current = ctx.get_accumulator().as_f64().unwrap_or(0.0);
                let delta = value.as_f64().ok_or_else(|| NodeError::fatal(&node.id, "accumulator 'add' needs a numeric value"))?;
                json!(current + delta)
            }
            "append" => {
                let mut current = ctx.get_accumulator();
                let arr = match current.as_array_mut() {
                    Some(arr) => arr,
                    None => {
                        current = Value::Array(Vec::new());
                        current.as_array_mut().unwrap()
                    }
                };
                arr.push(value);
                current
            }
            other => return Err(NodeError::fatal(&node.id, format!("unknown accumulator op '{other}'"))),
        };

        ctx.set_accumulator(next.clone());
        Ok(next)
    }
}

/// `data: { "op": "increment"|"decrement"|"reset", "delta"?: number }`.
pub struct CounterNode;

#[async_trait]
impl ExecutableNode for CounterNode {
    fn kind(&self) -> &'static str {
        "counter"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let op = opt_str_field(&node.data, "op").unwrap_or_else(|| "increment".to_string());
        let delta = opt_f64_field(&node.data, "delta").unwrap_or(1.0);

        let value = match op.as_str() {
            "increment" => ctx.increment_counter(delta),
            "decrement" => ctx.increment_counter(-delta),
            "reset" => {
                ctx.set_counter(0.0);
                0.0
            }
            other => return Err(NodeError::fatal(&node.id, format!("unknown counter op '{other}'"))),
        };
        Ok(json!(value))
    }
}

/// `data: { "format": "json"|"number"|"boolean" }`. Parses the string input.
pub struct ParseNode;

#[async_trait]
impl ExecutableNode for ParseNode {
    fn kind(&self) -> &'static str {
        "parse"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let format = opt_str_field(&node.data, "format").unwrap_or_else(|| "json".to_string());
        let input = ctx.input(&node.id);
        let text = input.as_str().ok_or_else(|| NodeError::fatal(&node.id, "parse node requires a string input"))?;

        match format.as_str() {
            "json" => serde_json::from_str(text).map_err(|e| NodeError::fatal(&node.id, format!("invalid json: {e}"))),
            "number" => text
                .trim()
                .parse::<f64>()
                .map(|n| json!(n))
                .map_err(|e| NodeError::fatal(&node.id, format!("invalid number: {e}"))),
            "boolean" => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(json!(true)),
                "false" => Ok(json!(false)),
                other => Err(NodeError::fatal(&node.id, format!("invalid boolean literal '{other}'"))),
            },
            other => Err(NodeError::fatal(&node.id, format!("unknown parse format '{other}'"))),
        }
    }
}

/// `data: { "template": "..." }`. Runs `ExecutionContext::interpolate`
/// (variable/constant placeholders), then anything else literally.
pub struct FormatNode;

#[async_trait]
impl ExecutableNode for FormatNode {
    fn kind(&self) -> &'static str {
        "format"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let template = str_field(&node.id, &node.data, "template")?;
        Ok(json!(ctx.interpolate(&template)))
    }
}
