//! Pure evaluator for parsed condition expressions.

use std::cmp::Ordering;

use serde_json::Value;

use docguard_core::Injections;

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Evaluate `expr` against the given bindings.
///
/// The evaluator is pure: the only inputs are the AST and the bindings, and
/// the only outputs are a value or an error message.
pub fn evaluate(expr: &Expr, bindings: &Injections) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| format!("variable {name} is not defined")),
        Expr::Array(elements) => {
            let values = elements
                .iter()
                .map(|e| evaluate(e, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
        Expr::Unary(op, inner) => {
            let value = evaluate(inner, bindings)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                UnaryOp::Neg => {
                    let n = value
                        .as_f64()
                        .ok_or_else(|| format!("cannot negate {}", kind(&value)))?;
                    Ok(number(-n))
                }
            }
        }
        Expr::Binary(op, lhs, rhs) => evaluate_binary(*op, lhs, rhs, bindings),
    }
}

fn evaluate_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    bindings: &Injections,
) -> Result<Value, String> {
    // || and && short-circuit and return the deciding operand.
    if op == BinaryOp::Or {
        let left = evaluate(lhs, bindings)?;
        return if truthy(&left) {
            Ok(left)
        } else {
            evaluate(rhs, bindings)
        };
    }
    if op == BinaryOp::And {
        let left = evaluate(lhs, bindings)?;
        return if truthy(&left) {
            evaluate(rhs, bindings)
        } else {
            Ok(left)
        };
    }

    let left = evaluate(lhs, bindings)?;
    let right = evaluate(rhs, bindings)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(value_eq(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!value_eq(&left, &right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&left, &right)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&left, &right)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&left, &right)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&left, &right)? != Ordering::Less)),
        BinaryOp::In => membership(&left, &right),
        BinaryOp::Add => {
            if let (Value::String(l), Value::String(r)) = (&left, &right) {
                return Ok(Value::String(format!("{l}{r}")));
            }
            arithmetic(&left, &right, "add", |l, r| l + r)
        }
        BinaryOp::Sub => arithmetic(&left, &right, "subtract", |l, r| l - r),
        BinaryOp::Mul => arithmetic(&left, &right, "multiply", |l, r| l * r),
        BinaryOp::Div => arithmetic(&left, &right, "divide", |l, r| l / r),
        BinaryOp::Rem => arithmetic(&left, &right, "take remainder of", |l, r| l % r),
        BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
    }
}

fn membership(left: &Value, right: &Value) -> Result<Value, String> {
    match right {
        Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| value_eq(item, left)))),
        Value::String(haystack) => match left {
            Value::String(needle) => Ok(Value::Bool(haystack.contains(needle.as_str()))),
            other => Err(format!("cannot search a string for {}", kind(other))),
        },
        other => Err(format!("'in' requires an array or string, found {}", kind(other))),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    verb: &str,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value, String> {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) if left.is_number() && right.is_number() => {
            let result = apply(l, r);
            if result.is_finite() {
                Ok(number(result))
            } else {
                Err(format!("cannot {verb}: result is not finite"))
            }
        }
        _ => Err(format!(
            "cannot {verb} {} and {}",
            kind(left),
            kind(right)
        )),
    }
}

/// Truthiness coercion: `null`, `false`, `0`, and `""` are false; everything
/// else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Deep equality with numeric coercion: `1` equals `1.0`.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.as_f64() == b.as_f64();
    }
    a == b
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    if a.is_number() && b.is_number() {
        return a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(l, r)| l.partial_cmp(&r))
            .ok_or_else(|| "numbers are not comparable".to_string());
    }
    match (a, b) {
        (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
        _ => Err(format!("cannot compare {} and {}", kind(a), kind(b))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use serde_json::json;

    fn eval(source: &str, bindings: &[(&str, Value)]) -> Result<Value, String> {
        let bindings: Injections = bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        evaluate(&parse(source).unwrap(), &bindings)
    }

    #[test]
    fn test_equality_with_numeric_coercion() {
        assert_eq!(eval("$a == 1", &[("$a", json!(1.0))]).unwrap(), json!(true));
        assert_eq!(eval("$a == 1", &[("$a", json!(2))]).unwrap(), json!(false));
        assert_eq!(eval("$a != 'x'", &[("$a", json!("y"))]).unwrap(), json!(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("2 < 3", &[]).unwrap(), json!(true));
        assert_eq!(eval("'abc' <= 'abd'", &[]).unwrap(), json!(true));
        assert!(eval("1 < 'a'", &[]).is_err());
    }

    #[test]
    fn test_logic_short_circuits() {
        // The right side would fail if evaluated.
        assert_eq!(eval("true || $missing", &[]).unwrap(), json!(true));
        assert_eq!(eval("false && $missing", &[]).unwrap(), json!(false));
        assert!(eval("false || $missing", &[]).is_err());
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), json!(7));
        assert_eq!(eval("7 % 4", &[]).unwrap(), json!(3));
        assert_eq!(eval("5 / 2", &[]).unwrap(), json!(2.5));
        assert_eq!(eval("'a' + 'b'", &[]).unwrap(), json!("ab"));
        assert!(eval("1 / 0", &[]).is_err());
        assert!(eval("1 + 'a'", &[]).is_err());
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            eval("$role in ['admin', 'editor']", &[("$role", json!("admin"))]).unwrap(),
            json!(true)
        );
        assert_eq!(
            eval("$v in [1, 2, 3]", &[("$v", json!(2.0))]).unwrap(),
            json!(true)
        );
        assert_eq!(eval("'ell' in 'hello'", &[]).unwrap(), json!(true));
        assert!(eval("1 in 2", &[]).is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("!''", &[]).unwrap(), json!(true));
        assert_eq!(eval("-$n", &[("$n", json!(4))]).unwrap(), json!(-4));
        assert!(eval("-'a'", &[]).is_err());
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = eval("$nobody", &[]).unwrap_err();
        assert_eq!(err, "variable $nobody is not defined");
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(-1)));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
    }
}
