//! The fixed function table. `map` is handled specially in [`super::eval`]
//! because its second argument is an unevaluated expression (a closure
//! body), not a value — every other function here receives already-
//! evaluated [`Value`] arguments.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use serde_json::{json, Value};

use super::ExpressionError;

fn fail(expr: &str, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Eval { expr: expr.to_string(), message: message.into() }
}

fn as_f64(expr: &str, v: &Value) -> Result<f64, ExpressionError> {
    v.as_f64().ok_or_else(|| fail(expr, format!("expected a number, got {v}")))
}

fn as_str<'a>(expr: &str, v: &'a Value) -> Result<&'a str, ExpressionError> {
    v.as_str().ok_or_else(|| fail(expr, format!("expected a string, got {v}")))
}

fn as_array<'a>(expr: &str, v: &'a Value) -> Result<&'a Vec<Value>, ExpressionError> {
    v.as_array().ok_or_else(|| fail(expr, format!("expected an array, got {v}")))
}

/// Bounds-checked positional argument access. A workflow expression comes
/// from an untrusted payload, so a wrong-arity call (`upper()`,
/// `contains(x)`) must return an `ExpressionError`, not panic.
fn arg<'a>(expr: &str, name: &str, args: &'a [Value], index: usize) -> Result<&'a Value, ExpressionError> {
    args.get(index).ok_or_else(|| {
        fail(expr, format!("{name}() expects at least {} argument{}, got {}", index + 1, if index == 0 { "" } else { "s" }, args.len()))
    })
}

/// Numbers accepted either as `f(a, b, c, ...)` or `f([a, b, c])`, per
/// spec.md's rule for `min`/`max`/`sum`/`avg`/`round`/`floor`/`ceil`/`abs`.
fn numeric_args(expr: &str, args: &[Value]) -> Result<Vec<f64>, ExpressionError> {
    if args.len() == 1 {
        if let Value::Array(items) = &args[0] {
            return items.iter().map(|v| as_f64(expr, v)).collect();
        }
    }
    args.iter().map(|v| as_f64(expr, v)).collect()
}

fn parse_datetime(expr: &str, s: &str) -> Result<DateTime<Utc>, ExpressionError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| fail(expr, format!("invalid date '{s}': {e}")))
}

pub fn call(name: &str, args: Vec<Value>, expr: &str) -> Result<Value, ExpressionError> {
    match name {
        // ---- string ----
        "contains" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.contains(as_str(expr, arg(expr, name, &args, 1)?)?))),
        "startsWith" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.starts_with(as_str(expr, arg(expr, name, &args, 1)?)?))),
        "endsWith" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.ends_with(as_str(expr, arg(expr, name, &args, 1)?)?))),
        "upper" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.to_uppercase())),
        "lower" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.to_lowercase())),
        "trim" => Ok(json!(as_str(expr, arg(expr, name, &args, 0)?)?.trim())),
        "split" => {
            let sep = as_str(expr, arg(expr, name, &args, 1)?)?;
            let parts: Vec<Value> = as_str(expr, arg(expr, name, &args, 0)?)?.split(sep).map(|s| json!(s)).collect();
            Ok(Value::Array(parts))
        }
        "join" => {
            let sep = as_str(expr, arg(expr, name, &args, 1)?)?;
            let items = as_array(expr, arg(expr, name, &args, 0)?)?;
            let text = items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(sep);
            Ok(json!(text))
        }
        "replace" => {
            let text = as_str(expr, arg(expr, name, &args, 0)?)?;
            let from = as_str(expr, arg(expr, name, &args, 1)?)?;
            let to = as_str(expr, arg(expr, name, &args, 2)?)?;
            Ok(json!(text.replace(from, to)))
        }

        // ---- arithmetic ----
        "pow" => Ok(json!(as_f64(expr, arg(expr, name, &args, 0)?)?.powf(as_f64(expr, arg(expr, name, &args, 1)?)?))),
        "sqrt" => Ok(json!(as_f64(expr, arg(expr, name, &args, 0)?)?.sqrt())),
        "abs" => {
            let values = numeric_args(expr, &args)?;
            if values.len() == 1 {
                Ok(json!(values[0].abs()))
            } else {
                Err(fail(expr, "abs expects a single value"))
            }
        }
        "floor" => {
            let values = numeric_args(expr, &args)?;
            if values.len() == 1 {
                Ok(json!(values[0].floor()))
            } else {
                Err(fail(expr, "floor expects a single value"))
            }
        }
        "ceil" => {
            let values = numeric_args(expr, &args)?;
            if values.len() == 1 {
                Ok(json!(values[0].ceil()))
            } else {
                Err(fail(expr, "ceil expects a single value"))
            }
        }
        "round" => {
            let values = numeric_args(expr, &args)?;
            if values.len() == 1 {
                Ok(json!(values[0].round()))
            } else {
                Err(fail(expr, "round expects a single value"))
            }
        }
        "min" => {
            let values = numeric_args(expr, &args)?;
            values.into_iter().fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
                .map(|v| json!(v))
                .ok_or_else(|| fail(expr, "min requires at least one argument"))
        }
        "max" => {
            let values = numeric_args(expr, &args)?;
            values.into_iter().fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
                .map(|v| json!(v))
                .ok_or_else(|| fail(expr, "max requires at least one argument"))
        }
        "sum" => Ok(json!(numeric_args(expr, &args)?.into_iter().sum::<f64>())),
        "avg" => {
            let values = numeric_args(expr, &args)?;
            if values.is_empty() {
                return Err(fail(expr, "avg requires at least one argument"));
            }
            Ok(json!(values.iter().sum::<f64>() / values.len() as f64))
        }

        // ---- array ----
        "first" => Ok(as_array(expr, arg(expr, name, &args, 0)?)?.first().cloned().unwrap_or(Value::Null)),
        "last" => Ok(as_array(expr, arg(expr, name, &args, 0)?)?.last().cloned().unwrap_or(Value::Null)),
        "reverse" => {
            let mut items = as_array(expr, arg(expr, name, &args, 0)?)?.clone();
            items.reverse();
            Ok(Value::Array(items))
        }
        "unique" => {
            let items = as_array(expr, arg(expr, name, &args, 0)?)?;
            let mut seen = std::collections::HashSet::new();
            let mut out = Vec::new();
            for item in items {
                if seen.insert(item.to_string()) {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        "flatten" => {
            let items = as_array(expr, arg(expr, name, &args, 0)?)?;
            let mut out = Vec::new();
            for item in items {
                match item {
                    Value::Array(inner) => out.extend(inner.clone()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(out))
        }
        "slice" => {
            let items = as_array(expr, arg(expr, name, &args, 0)?)?;
            let len = items.len() as i64;
            let norm = |i: i64| -> usize { if i < 0 { (len + i).max(0) as usize } else { (i as usize).min(len as usize) } };
            let start = norm(as_f64(expr, arg(expr, name, &args, 1)?)? as i64);
            let end = args.get(2).map(|v| as_f64(expr, v)).transpose()?.map(|v| norm(v as i64)).unwrap_or(items.len());
            Ok(Value::Array(if start < end { items[start..end].to_vec() } else { Vec::new() }))
        }
        "zip" => {
            let a = as_array(expr, arg(expr, name, &args, 0)?)?;
            let b = as_array(expr, arg(expr, name, &args, 1)?)?;
            let out: Vec<Value> = a.iter().zip(b.iter()).map(|(x, y)| json!([x, y])).collect();
            Ok(Value::Array(out))
        }
        "sort" => {
            let mut items = as_array(expr, arg(expr, name, &args, 0)?)?.clone();
            items.sort_by(|a, b| match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => a.to_string().cmp(&b.to_string()),
            });
            Ok(Value::Array(items))
        }
        // `map` is intercepted before argument evaluation in eval.rs; it
        // never reaches this table.
        "map" => Err(fail(expr, "map() must be called with an expression argument")),

        // ---- date/time ----
        "now" => Ok(json!(Utc::now().to_rfc3339())),
        "parseDate" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.to_rfc3339())),
        "toEpoch" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.timestamp() as f64)),
        "toEpochMillis" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.timestamp_millis() as f64)),
        "fromEpoch" => {
            let secs = as_f64(expr, arg(expr, name, &args, 0)?)? as i64;
            Utc.timestamp_opt(secs, 0).single().map(|dt| json!(dt.to_rfc3339())).ok_or_else(|| fail(expr, "invalid epoch seconds"))
        }
        "fromEpochMillis" => {
            let millis = as_f64(expr, arg(expr, name, &args, 0)?)? as i64;
            Utc.timestamp_millis_opt(millis).single().map(|dt| json!(dt.to_rfc3339())).ok_or_else(|| fail(expr, "invalid epoch millis"))
        }
        "dateDiff" => {
            let a = parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?;
            let b = parse_datetime(expr, as_str(expr, arg(expr, name, &args, 1)?)?)?;
            Ok(json!((a - b).num_seconds() as f64))
        }
        "dateAdd" => {
            let base = parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?;
            let seconds = as_f64(expr, arg(expr, name, &args, 1)?)? as i64;
            Ok(json!((base + ChronoDuration::seconds(seconds)).to_rfc3339()))
        }
        "year" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.year() as f64)),
        "month" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.month() as f64)),
        "day" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.day() as f64)),
        "hour" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.hour() as f64)),
        "minute" => Ok(json!(parse_datetime(expr, as_str(expr, arg(expr, name, &args, 0)?)?)?.minute() as f64)),

        // ---- null ----
        "isNull" => Ok(json!(arg(expr, name, &args, 0)?.is_null())),
        "coalesce" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),

        other => Err(fail(expr, format!("unknown function '{other}'"))),
    }
}
