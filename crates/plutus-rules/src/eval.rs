//! Typed evaluation of parsed expressions against a context.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::context::EvalContext;
use crate::error::EngineError;
use crate::parser::{CmpOp, Expr, LogicOp};

/// Runtime value a sub-expression evaluates to.
#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Number(f64),
    Str(String),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

/// Evaluate a rule expression to a boolean.
///
/// Missing context fields and type mismatches are errors; the runtime
/// evaluator treats them as a non-matching rule.
pub fn evaluate_rule(expr: &Expr, ctx: &EvalContext) -> Result<bool, EngineError> {
    match eval(expr, ctx)? {
        EvalValue::Bool(b) => Ok(b),
        other => Err(EngineError::Type(format!(
            "rule expression must produce a boolean, got {:?}",
            other
        ))),
    }
}

fn eval(expr: &Expr, ctx: &EvalContext) -> Result<EvalValue, EngineError> {
    match expr {
        Expr::Number(n) => Ok(EvalValue::Number(*n)),
        Expr::Str(s) => Ok(EvalValue::Str(s.clone())),
        Expr::Bool(b) => Ok(EvalValue::Bool(*b)),
        Expr::DateTime(dt) => Ok(EvalValue::DateTime(*dt)),
        Expr::Field(name) => field_value(name, ctx),
        Expr::Logical { op, lhs, rhs } => {
            let lhs = expect_bool(eval(lhs, ctx)?)?;
            // Short-circuit the way the emitted `&&`/`||` would.
            match op {
                LogicOp::And if !lhs => Ok(EvalValue::Bool(false)),
                LogicOp::Or if lhs => Ok(EvalValue::Bool(true)),
                _ => {
                    let rhs = expect_bool(eval(rhs, ctx)?)?;
                    Ok(EvalValue::Bool(rhs))
                }
            }
        }
        Expr::Compare { op, lhs, rhs } => {
            let lhs = eval(lhs, ctx)?;
            let rhs = eval(rhs, ctx)?;
            compare(*op, lhs, rhs).map(EvalValue::Bool)
        }
        Expr::Contains { field, needle } => {
            let value = ctx
                .get(field)
                .ok_or_else(|| EngineError::MissingField(field.clone()))?;
            match value {
                JsonValue::String(s) => Ok(EvalValue::Bool(s.contains(needle.as_str()))),
                JsonValue::Array(items) => Ok(EvalValue::Bool(
                    items.iter().any(|item| item.as_str() == Some(needle.as_str())),
                )),
                other => Err(EngineError::Type(format!(
                    "Contains expects a string or array field, ctx.{} is {}",
                    field,
                    json_type_name(other)
                ))),
            }
        }
    }
}

fn expect_bool(value: EvalValue) -> Result<bool, EngineError> {
    match value {
        EvalValue::Bool(b) => Ok(b),
        other => Err(EngineError::Type(format!(
            "expected a boolean operand, got {:?}",
            other
        ))),
    }
}

fn field_value(name: &str, ctx: &EvalContext) -> Result<EvalValue, EngineError> {
    let value = ctx
        .get(name)
        .ok_or_else(|| EngineError::MissingField(name.to_string()))?;
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .map(EvalValue::Number)
            .ok_or_else(|| EngineError::Type(format!("ctx.{} is not a finite number", name))),
        JsonValue::String(s) => Ok(EvalValue::Str(s.clone())),
        JsonValue::Bool(b) => Ok(EvalValue::Bool(*b)),
        other => Err(EngineError::Type(format!(
            "ctx.{} has unsupported type {}",
            name,
            json_type_name(other)
        ))),
    }
}

fn compare(op: CmpOp, lhs: EvalValue, rhs: EvalValue) -> Result<bool, EngineError> {
    use EvalValue::*;
    match (lhs, rhs) {
        (Number(a), Number(b)) => Ok(apply_ord(op, a.partial_cmp(&b))),
        (Bool(a), Bool(b)) => match op {
            CmpOp::Eq => Ok(a == b),
            CmpOp::Neq => Ok(a != b),
            _ => Err(EngineError::Type(
                "booleans only support == and !=".to_string(),
            )),
        },
        (Str(a), Str(b)) => match op {
            CmpOp::Eq => Ok(a == b),
            CmpOp::Neq => Ok(a != b),
            _ => Err(EngineError::Type(
                "strings only support == and !=".to_string(),
            )),
        },
        (DateTime(a), DateTime(b)) => Ok(apply_ord(op, a.partial_cmp(&b))),
        // A ctx field holding an RFC3339 string compared against a date literal.
        (Str(a), DateTime(b)) => {
            let a = parse_ctx_datetime(&a)?;
            Ok(apply_ord(op, a.partial_cmp(&b)))
        }
        (DateTime(a), Str(b)) => {
            let b = parse_ctx_datetime(&b)?;
            Ok(apply_ord(op, a.partial_cmp(&b)))
        }
        (lhs, rhs) => Err(EngineError::Type(format!(
            "cannot compare {:?} with {:?}",
            lhs, rhs
        ))),
    }
}

fn apply_ord(op: CmpOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (CmpOp::Gt, Some(Greater)) => true,
        (CmpOp::Gte, Some(Greater) | Some(Equal)) => true,
        (CmpOp::Lt, Some(Less)) => true,
        (CmpOp::Lte, Some(Less) | Some(Equal)) => true,
        (CmpOp::Eq, Some(Equal)) => true,
        (CmpOp::Neq, Some(Less) | Some(Greater)) => true,
        _ => false,
    }
}

fn parse_ctx_datetime(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| EngineError::Type(format!("'{}' is not an RFC3339 datetime", raw)))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::context_from_json;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn eval_str(expr: &str, ctx: &serde_json::Value) -> Result<bool, EngineError> {
        let expr = parse_expression(expr).unwrap();
        evaluate_rule(&expr, &context_from_json(ctx))
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = json!({"gasto": 60});
        assert!(eval_str("ctx.gasto > 50", &ctx).unwrap());
        assert!(eval_str("ctx.gasto >= 60", &ctx).unwrap());
        assert!(!eval_str("ctx.gasto < 60", &ctx).unwrap());
        assert!(eval_str("ctx.gasto != 59", &ctx).unwrap());
        assert!(eval_str("ctx.gasto == 60", &ctx).unwrap());
    }

    #[test]
    fn test_string_and_bool() {
        let ctx = json!({"club": "gold", "esVip": true});
        assert!(eval_str(r#"ctx.club == "gold""#, &ctx).unwrap());
        assert!(eval_str(r#"ctx.club != "silver""#, &ctx).unwrap());
        assert!(eval_str("ctx.esVip == true", &ctx).unwrap());
        assert!(!eval_str("ctx.esVip == false", &ctx).unwrap());
    }

    #[test]
    fn test_logical_short_circuit() {
        let ctx = json!({"gasto": 60});
        // Right operand references a missing field but the left already decides.
        assert!(!eval_str("ctx.gasto < 10 && ctx.missing == 1", &ctx).unwrap());
        assert!(eval_str("ctx.gasto > 10 || ctx.missing == 1", &ctx).unwrap());
        // When the left does not decide, the missing field surfaces.
        assert!(eval_str("ctx.gasto > 10 && ctx.missing == 1", &ctx).is_err());
    }

    #[test]
    fn test_contains_on_string_and_array() {
        let ctx = json!({"club": "gold-plus", "tags": ["vip", "beta"]});
        assert!(eval_str(r#"ctx.club.Contains("gold")"#, &ctx).unwrap());
        assert!(eval_str(r#"ctx.tags.Contains("vip")"#, &ctx).unwrap());
        assert!(!eval_str(r#"ctx.tags.Contains("gamma")"#, &ctx).unwrap());
    }

    #[test]
    fn test_datetime_comparison() {
        let ctx = json!({"since": "2024-06-01T00:00:00Z"});
        assert!(
            eval_str(r#"ctx.since >= parseDateTime("2024-01-01T00:00:00Z")"#, &ctx).unwrap()
        );
        assert!(
            !eval_str(r#"ctx.since < parseDateTime("2024-01-01T00:00:00Z")"#, &ctx).unwrap()
        );
    }

    #[test]
    fn test_missing_field_is_error() {
        let ctx = json!({});
        assert!(matches!(
            eval_str("ctx.gasto > 50", &ctx),
            Err(EngineError::MissingField(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let ctx = json!({"gasto": "sixty"});
        assert!(matches!(
            eval_str("ctx.gasto > 50", &ctx),
            Err(EngineError::Type(_))
        ));
        let ctx = json!({"club": "gold"});
        assert!(eval_str(r#"ctx.club > "a""#, &ctx).is_err());
    }

    #[test]
    fn test_literal_true_always_fires() {
        assert!(eval_str("true", &json!({})).unwrap());
    }
}
