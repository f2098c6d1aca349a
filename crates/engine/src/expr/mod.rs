//! The condition/arithmetic/template DSL shared by `condition`, `switch`,
//! `filter`, `map`, `reduce`, and template interpolation.
//!
//! A small hand-rolled recursive-descent parser (tokenizer in
//! [`lexer`], precedence-climbing in [`parser`]) builds an [`ast::Expr`],
//! which [`eval`] walks against an [`EvalContext`]. Parsing and evaluation
//! recursion are both bounded by [`MAX_EXPR_DEPTH`] so a pathological
//! expression cannot exhaust the stack — the isolation requirement for a
//! DSL that only ever calls its own fixed function table, never arbitrary
//! host code.

mod ast;
mod eval;
mod functions;
mod lexer;
mod parser;

use serde_json::Value;
use thiserror::Error;

pub use ast::Expr;

/// Ceiling on nested path/call/parenthesis depth while parsing or
/// evaluating an expression.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Resolves the three non-`item` roots an expression can reference:
/// `node.ID` (a prior node's result), `variables.NAME`, and `context.NAME`
/// (which checks context variables before context constants). Implemented
/// by the engine, which owns `node_results` and the `StateManager`.
pub trait EvalContext {
    fn node_result(&self, node_id: &str) -> Option<Value>;
    fn variable(&self, name: &str) -> Option<Value>;
    fn context(&self, name: &str) -> Option<Value>;
}

#[derive(Debug, Error, Clone)]
pub enum ExpressionError {
    #[error("error parsing expression '{expr}' at position {position}: {message}")]
    Parse { expr: String, position: usize, message: String },

    #[error("error evaluating expression '{expr}': {message}")]
    Eval { expr: String, message: String },

    #[error("expression '{expr}' exceeds the maximum nesting depth")]
    TooDeep { expr: String },
}

/// Parses and evaluates `expr` as a boolean. Non-boolean results are
/// coerced via [`eval::is_truthy`] rather than erroring, matching the
/// evaluator's permissive equality semantics.
pub fn evaluate_bool(expr: &str, item: &Value, ctx: &dyn EvalContext) -> Result<bool, ExpressionError> {
    let value = evaluate_value(expr, item, ctx)?;
    Ok(eval::is_truthy(&value))
}

pub fn evaluate_value(expr: &str, item: &Value, ctx: &dyn EvalContext) -> Result<Value, ExpressionError> {
    let ast = parser::parse(expr)?;
    eval::eval(&ast, item, ctx, 0, expr)
}

/// Interpolates `{{ variable.NAME }}` and `{{ const.NAME }}` placeholders
/// in `template`. Unrecognized or unresolved placeholders are left
/// untouched rather than erroring — interpolation is best-effort.
pub fn interpolate(template: &str, ctx: &dyn EvalContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let placeholder = after[..end].trim();
                let resolved = resolve_placeholder(placeholder, ctx);
                match resolved {
                    Some(value) => out.push_str(&value_to_text(&value)),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_placeholder(placeholder: &str, ctx: &dyn EvalContext) -> Option<Value> {
    let (root, name) = placeholder.split_once('.')?;
    match root {
        "variable" => ctx.variable(name),
        "const" => ctx.context(name),
        _ => None,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct TestContext {
        nodes: HashMap<String, Value>,
        variables: HashMap<String, Value>,
        context: HashMap<String, Value>,
    }

    impl EvalContext for TestContext {
        fn node_result(&self, node_id: &str) -> Option<Value> {
            self.nodes.get(node_id).cloned()
        }
        fn variable(&self, name: &str) -> Option<Value> {
            self.variables.get(name).cloned()
        }
        fn context(&self, name: &str) -> Option<Value> {
            self.context.get(name).cloned()
        }
    }

    fn empty_ctx() -> TestContext {
        TestContext { nodes: HashMap::new(), variables: HashMap::new(), context: HashMap::new() }
    }

    #[test]
    fn short_form_comparison() {
        let ctx = empty_ctx();
        assert!(evaluate_bool(">18", &json!(25), &ctx).unwrap());
        assert!(!evaluate_bool(">18", &json!(10), &ctx).unwrap());
    }

    #[test]
    fn arithmetic_precedence() {
        let ctx = empty_ctx();
        let result = evaluate_value("1 + 2 * 3", &json!(null), &ctx).unwrap();
        assert_eq!(result, json!(7.0));
    }

    #[test]
    fn ternary_and_logic() {
        let ctx = empty_ctx();
        let result = evaluate_value("true && false ? 1 : 2", &json!(null), &ctx).unwrap();
        assert_eq!(result, json!(2.0));
    }

    #[test]
    fn de_morgan_holds() {
        let ctx = empty_ctx();
        for (a, b) in [(true, true), (true, false), (false, true), (false, false)] {
            let item = json!({ "a": a, "b": b });
            let lhs = evaluate_bool("!(item.a && item.b)", &item, &ctx).unwrap();
            let rhs = evaluate_bool("(!item.a) || (!item.b)", &item, &ctx).unwrap();
            assert_eq!(lhs, rhs);
        }
    }

    #[test]
    fn map_closure_binds_item_and_hash() {
        let ctx = empty_ctx();
        let input = json!([{"age": 31}, {"age": 29}, {"age": 40}]);
        let result = evaluate_value("round(avg(map(input, item.age))) + 2", &input, &ctx).unwrap();
        assert_eq!(result, json!(35.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let ctx = empty_ctx();
        assert!(evaluate_value("1 / 0", &json!(null), &ctx).is_err());
    }

    #[test]
    fn interpolation_leaves_unresolved_placeholders() {
        let mut ctx = empty_ctx();
        ctx.variables.insert("name".to_string(), json!("Ada"));
        let out = interpolate("hello {{ variable.name }}, {{ const.missing }}", &ctx);
        assert_eq!(out, "hello Ada, {{ const.missing }}");
    }
}
