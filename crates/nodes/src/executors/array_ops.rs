//! Array-transform nodes: `slice`, `sort`, `find`, `flat_map`, `group_by`,
//! `unique`, `chunk`, `reverse`, `partition`, `zip`, `sample`, `range`,
//! `compact`, `transpose`.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::{json, Map, Value};

use super::util::{as_array, is_truthy, opt_f64_field, opt_str_field, opt_u64_field, resolve_array};
use crate::traits::{ExecutableNode, ExecutionContext, Node};
use crate::NodeError;

/// `data: { "start"?: number, "end"?: number }`. Negative indices count from
/// the end, same convention as the string-function `slice()` in the
/// expression evaluator.
pub struct SliceNode;

#[async_trait]
impl ExecutableNode for SliceNode {
    fn kind(&self) -> &'static str {
        "slice"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let array = resolve_array(ctx, node, "input")?;
        let len = array.len() as i64;
        let norm = |i: i64| -> usize { if i < 0 { (len + i).max(0) as usize } else { (i as usize).min(len as usize) } };
        let start = norm(opt_f64_field(&node.data, "start").map(|v| v as i64).unwrap_or(0));
        let end = norm(opt_f64_field(&node.data, "end").map(|v| v as i64).unwrap_or(len));
        let out = if start < end { array[start..end].to_vec() } else { Vec::new() };
        Ok(Value::Array(out))
    }
}

/// `data: { "key"?: "<path>", "desc"?: bool }`. Without `key`, compares
/// elements directly as numbers or strings.
pub struct SortNode;

#[async_trait]
impl ExecutableNode for SortNode {
    fn kind(&self) -> &'static str {
        "sort"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let mut array = resolve_array(ctx, node, "input")?;
        let key_path = opt_str_field(&node.data, "key");
        let desc = node.data.get("desc").and_then(|v| v.as_bool()).unwrap_or(false);

        let key_of = |v: &Value| -> Value {
            match &key_path {
                Some(path) => path.split('.').fold(v.clone(), |acc, seg| acc.get(seg).cloned().unwrap_or(Value::Null)),
                None => v.clone(),
            }
        };

        array.sort_by(|a, b| {
            let (ka, kb) = (key_of(a), key_of(b));
            let ord = match (ka.as_f64(), kb.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => ka.to_string().cmp(&kb.to_string()),
            };
            if desc { ord.reverse() } else { ord }
        });
        Ok(Value::Array(array))
    }
}

/// `data: { "predicate": "<expr>" }`. `Value::Null` if nothing matches.
pub struct FindNode;

#[async_trait]
impl ExecutableNode for FindNode {
    fn kind(&self) -> &'static str {
        "find"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let predicate = super::util::str_field(&node.id, &node.data, "predicate")?;
        let array = resolve_array(ctx, node, "input")?;
        for item in array {
            if ctx.evaluate_bool(&predicate, &item)? {
                return Ok(item);
            }
        }
        Ok(Value::Null)
    }
}

/// `data: { "expr": "<expr>" }`. `expr` must evaluate each element to an
/// array; the results are concatenated.
pub struct FlatMapNode;

#[async_trait]
impl ExecutableNode for FlatMapNode {
    fn kind(&self) -> &'static str {
        "flat_map"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let expr = super::util::str_field(&node.id, &node.data, "expr")?;
        let array = resolve_array(ctx, node, "input")?;
        let mut out = Vec::new();
        for item in array {
            let mapped = ctx.evaluate_value(&expr, &item)?;
            out.extend(as_array(&node.id, &mapped)?.clone());
        }
        Ok(Value::Array(out))
    }
}

/// `data: { "key": "<expr>" }`. Returns a JSON object keyed by the
/// stringified group key.
pub struct GroupByNode;

#[async_trait]
impl ExecutableNode for GroupByNode {
    fn kind(&self) -> &'static str {
        "group_by"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let key_expr = super::util::str_field(&node.id, &node.data, "key")?;
        let array = resolve_array(ctx, node, "input")?;
        let mut groups: Map<String, Value> = Map::new();
        for item in array {
            let key = value_as_key(&ctx.evaluate_value(&key_expr, &item)?);
            match groups.entry(key) {
                serde_json::map::Entry::Occupied(mut e) => {
                    if let Value::Array(bucket) = e.get_mut() {
                        bucket.push(item);
                    }
                }
                serde_json::map::Entry::Vacant(e) => {
                    e.insert(Value::Array(vec![item]));
                }
            }
        }
        Ok(Value::Object(groups))
    }
}

fn value_as_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `data: { "key"?: "<expr>" }`. Without `key`, dedups by structural equality.
pub struct UniqueNode;

#[async_trait]
impl ExecutableNode for UniqueNode {
    fn kind(&self) -> &'static str {
        "unique"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let key_expr = opt_str_field(&node.data, "key");
        let array = resolve_array(ctx, node, "input")?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in array {
            let key = match &key_expr {
                Some(expr) => value_as_key(&ctx.evaluate_value(expr, &item)?),
                None => item.to_string(),
            };
            if seen.insert(key) {
                out.push(item);
            }
        }
        Ok(Value::Array(out))
    }
}

/// `data: { "size": number }`.
pub struct ChunkNode;

#[async_trait]
impl ExecutableNode for ChunkNode {
    fn kind(&self) -> &'static str {
        "chunk"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let size = opt_u64_field(&node.data, "size").unwrap_or(1).max(1) as usize;
        let array = resolve_array(ctx, node, "input")?;
        let chunks: Vec<Value> = array.chunks(size).map(|c| Value::Array(c.to_vec())).collect();
        Ok(Value::Array(chunks))
    }
}

pub struct ReverseNode;

#[async_trait]
impl ExecutableNode for ReverseNode {
    fn kind(&self) -> &'static str {
        "reverse"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let mut array = resolve_array(ctx, node, "input")?;
        array.reverse();
        Ok(Value::Array(array))
    }
}

/// `data: { "predicate": "<expr>" }` -> `{ "pass": [...], "fail": [...] }`.
pub struct PartitionNode;

#[async_trait]
impl ExecutableNode for PartitionNode {
    fn kind(&self) -> &'static str {
        "partition"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let predicate = super::util::str_field(&node.id, &node.data, "predicate")?;
        let array = resolve_array(ctx, node, "input")?;
        let (mut pass, mut fail) = (Vec::new(), Vec::new());
        for item in array {
            if ctx.evaluate_bool(&predicate, &item)? {
                pass.push(item);
            } else {
                fail.push(item);
            }
        }
        Ok(json!({ "pass": pass, "fail": fail }))
    }
}

/// `data: { "other": "<expr>" }`. `other` must evaluate to an array; zips
/// pairwise with the node's own input array, truncating to the shorter.
pub struct ZipNode;

#[async_trait]
impl ExecutableNode for ZipNode {
    fn kind(&self) -> &'static str {
        "zip"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let other_expr = super::util::str_field(&node.id, &node.data, "other")?;
        let left = resolve_array(ctx, node, "input")?;
        let right_val = ctx.evaluate_value(&other_expr, &Value::Null)?;
        let right = as_array(&node.id, &right_val)?;
        let out: Vec<Value> = left
            .into_iter()
            .zip(right.iter().cloned())
            .map(|(a, b)| json!([a, b]))
            .collect();
        Ok(Value::Array(out))
    }
}

/// `data: { "count": number }`. Sampling without replacement; clamps to the
/// array length.
pub struct SampleNode;

#[async_trait]
impl ExecutableNode for SampleNode {
    fn kind(&self) -> &'static str {
        "sample"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let count = opt_u64_field(&node.data, "count").unwrap_or(1) as usize;
        let array = resolve_array(ctx, node, "input")?;
        let mut rng = rand::thread_rng();
        let chosen: Vec<Value> = array
            .choose_multiple(&mut rng, count.min(array.len()))
            .cloned()
            .collect();
        Ok(Value::Array(chosen))
    }
}

/// `data: { "start": number, "end": number, "step"?: number }`. Source node:
/// ignores predecessor input, generates its own array.
pub struct RangeNode;

#[async_trait]
impl ExecutableNode for RangeNode {
    fn kind(&self) -> &'static str {
        "range"
    }

    async fn execute(&self, _ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let start = super::util::f64_field(&node.id, &node.data, "start")?;
        let end = super::util::f64_field(&node.id, &node.data, "end")?;
        let step = opt_f64_field(&node.data, "step").unwrap_or(1.0);
        if step == 0.0 {
            return Err(NodeError::fatal(&node.id, "range step must not be zero"));
        }
        let mut out = Vec::new();
        let mut cur = start;
        if step > 0.0 {
            while cur < end {
                out.push(json!(cur));
                cur += step;
            }
        } else {
            while cur > end {
                out.push(json!(cur));
                cur += step;
            }
        }
        Ok(Value::Array(out))
    }
}

/// Drops falsy elements (`null`, `false`, `0`, empty string/array/object).
pub struct CompactNode;

#[async_trait]
impl ExecutableNode for CompactNode {
    fn kind(&self) -> &'static str {
        "compact"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let array = resolve_array(ctx, node, "input")?;
        Ok(Value::Array(array.into_iter().filter(is_truthy).collect()))
    }
}

/// Transposes an array-of-arrays (a matrix). Rows are padded with `null` to
/// the longest row's length before transposing.
pub struct TransposeNode;

#[async_trait]
impl ExecutableNode for TransposeNode {
    fn kind(&self) -> &'static str {
        "transpose"
    }

    async fn execute(&self, ctx: &dyn ExecutionContext, node: &Node) -> Result<Value, NodeError> {
        let rows = resolve_array(ctx, node, "input")?;
        let rows: Vec<Vec<Value>> = rows
            .iter()
            .map(|r| as_array(&node.id, r).cloned())
            .collect::<Result<_, _>>()?;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut out = vec![Vec::with_capacity(rows.len()); width];
        for row in &rows {
            for col in 0..width {
                out[col].push(row.get(col).cloned().unwrap_or(Value::Null));
            }
        }
        Ok(Value::Array(out.into_iter().map(Value::Array).collect()))
    }
}
