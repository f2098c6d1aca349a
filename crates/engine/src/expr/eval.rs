//! Walks an [`Expr`] AST against an [`EvalContext`] and the bound `item`.

use serde_json::Value;

use super::ast::{ArithOp, CmpOp, Expr, PathSeg, TermOp};
use super::{functions, EvalContext, ExpressionError, MAX_EXPR_DEPTH};

pub fn eval(
    expr: &Expr,
    item: &Value,
    ctx: &dyn EvalContext,
    depth: usize,
    text: &str,
) -> Result<Value, ExpressionError> {
    if depth > MAX_EXPR_DEPTH {
        return Err(ExpressionError::TooDeep { expr: text.to_string() });
    }

    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Path { root, segs } => eval_path(root, segs, item, ctx, depth, text),

        Expr::Ternary(cond, when_true, when_false) => {
            let branch = if is_truthy(&eval(cond, item, ctx, depth + 1, text)?) { when_true } else { when_false };
            eval(branch, item, ctx, depth + 1, text)
        }

        Expr::Or(a, b) => {
            let left = is_truthy(&eval(a, item, ctx, depth + 1, text)?);
            if left {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&eval(b, item, ctx, depth + 1, text)?)))
        }

        Expr::And(a, b) => {
            let left = is_truthy(&eval(a, item, ctx, depth + 1, text)?);
            if !left {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&eval(b, item, ctx, depth + 1, text)?)))
        }

        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, item, ctx, depth + 1, text)?))),

        Expr::Cmp(op, a, b) => {
            let left = eval(a, item, ctx, depth + 1, text)?;
            let right = eval(b, item, ctx, depth + 1, text)?;
            Ok(Value::Bool(compare(*op, &left, &right)))
        }

        Expr::Arith(op, a, b) => {
            let left = as_number(text, &eval(a, item, ctx, depth + 1, text)?)?;
            let right = as_number(text, &eval(b, item, ctx, depth + 1, text)?)?;
            let result = match op {
                ArithOp::Add => left + right,
                ArithOp::Sub => left - right,
            };
            Ok(Value::from(result))
        }

        Expr::Term(op, a, b) => {
            let left = as_number(text, &eval(a, item, ctx, depth + 1, text)?)?;
            let right = as_number(text, &eval(b, item, ctx, depth + 1, text)?)?;
            let result = match op {
                TermOp::Mul => left * right,
                TermOp::Div => {
                    if right == 0.0 {
                        return Err(ExpressionError::Eval { expr: text.to_string(), message: "division by zero".to_string() });
                    }
                    left / right
                }
                TermOp::Mod => {
                    if right == 0.0 {
                        return Err(ExpressionError::Eval { expr: text.to_string(), message: "modulo by zero".to_string() });
                    }
                    left % right
                }
            };
            Ok(Value::from(result))
        }

        Expr::Neg(inner) => Ok(Value::from(-as_number(text, &eval(inner, item, ctx, depth + 1, text)?)?)),

        Expr::Call(name, args) if name == "map" => eval_map(args, item, ctx, depth, text),

        Expr::Call(name, args) => {
            let values = args.iter().map(|a| eval(a, item, ctx, depth + 1, text)).collect::<Result<Vec<_>, _>>()?;
            functions::call(name, values, text)
        }
    }
}

fn eval_map(args: &[Expr], item: &Value, ctx: &dyn EvalContext, depth: usize, text: &str) -> Result<Value, ExpressionError> {
    if args.len() != 2 {
        return Err(ExpressionError::Eval { expr: text.to_string(), message: "map() takes exactly 2 arguments".to_string() });
    }
    let array = eval(&args[0], item, ctx, depth + 1, text)?;
    let array = array.as_array().ok_or_else(|| ExpressionError::Eval { expr: text.to_string(), message: "map()'s first argument must be an array".to_string() })?;
    let mut out = Vec::with_capacity(array.len());
    for element in array {
        out.push(eval(&args[1], element, ctx, depth + 1, text)?);
    }
    Ok(Value::Array(out))
}

fn eval_path(
    root: &str,
    segs: &[PathSeg],
    item: &Value,
    ctx: &dyn EvalContext,
    depth: usize,
    text: &str,
) -> Result<Value, ExpressionError> {
    let (mut value, remaining) = match root {
        "node" => {
            let (name, rest) = split_first_field(segs, text, "node")?;
            (ctx.node_result(&name).unwrap_or(Value::Null), rest)
        }
        "variables" => {
            let (name, rest) = split_first_field(segs, text, "variables")?;
            (ctx.variable(&name).unwrap_or(Value::Null), rest)
        }
        "context" => {
            let (name, rest) = split_first_field(segs, text, "context")?;
            (ctx.context(&name).unwrap_or(Value::Null), rest)
        }
        "item" | "input" | "#" => (item.clone(), segs),
        other => (item.get(other).cloned().unwrap_or(Value::Null), segs),
    };

    for seg in remaining {
        value = match seg {
            PathSeg::Field(name) => value.get(name).cloned().unwrap_or(Value::Null),
            PathSeg::Index(index_expr) => {
                let index_value = eval(index_expr, item, ctx, depth + 1, text)?;
                match (&value, &index_value) {
                    (Value::Array(arr), Value::Number(n)) => {
                        let i = n.as_f64().unwrap_or(-1.0);
                        if i >= 0.0 { arr.get(i as usize).cloned().unwrap_or(Value::Null) } else { Value::Null }
                    }
                    (Value::Object(_), Value::String(key)) => value.get(key).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
        };
    }

    Ok(value)
}

fn split_first_field<'a>(segs: &'a [PathSeg], text: &str, root: &str) -> Result<(String, &'a [PathSeg]), ExpressionError> {
    match segs.first() {
        Some(PathSeg::Field(name)) => Ok((name.clone(), &segs[1..])),
        _ => Err(ExpressionError::Eval { expr: text.to_string(), message: format!("'{root}' must be followed by a field name") }),
    }
}

fn as_number(expr: &str, v: &Value) -> Result<f64, ExpressionError> {
    v.as_f64().ok_or_else(|| ExpressionError::Eval { expr: expr.to_string(), message: format!("expected a number, got {v}") })
}

/// `null`, `false`, `0`, and an empty string/array/object are falsy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_rfc3339(v: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    v.as_str().and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&chrono::Utc))
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(left, right),
        CmpOp::Ne => !values_equal(left, right),
        CmpOp::Lt | CmpOp::Lte | CmpOp::Gt | CmpOp::Gte => {
            let ordering = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (as_rfc3339(left), as_rfc3339(right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return false,
                },
            };
            match (op, ordering) {
                (CmpOp::Lt, Some(std::cmp::Ordering::Less)) => true,
                (CmpOp::Lte, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)) => true,
                (CmpOp::Gt, Some(std::cmp::Ordering::Greater)) => true,
                (CmpOp::Gte, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)) => true,
                _ => false,
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => return a == b,
        _ => {}
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        if let (Some(da), Some(db)) = (as_rfc3339(left), as_rfc3339(right)) {
            return da == db;
        }
        return a == b;
    }
    if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
        return a == b;
    }
    false
}
