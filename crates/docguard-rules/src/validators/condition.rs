//! The `condition` validator.

use serde_json::Value;

use crate::context::ValidationContext;
use crate::error::{Result, RuleError};

/// Non-match message for a false condition. The misspelling is part of the
/// wire contract.
pub(crate) const CONDITION_FALSE: &str = "condition evaluted to false";

/// One element of a condition config.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConditionTerm {
    /// `true` always matches; `false` never matches.
    Flag(bool),
    /// Evaluated by the expression sandbox with the request's injections.
    Expr(String),
}

/// Parsed config of the `condition` validator: a boolean, a string, or a
/// sequence of either. Every term must hold for the validator to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionConfig {
    terms: Vec<ConditionTerm>,
}

impl ConditionConfig {
    /// Parse and validate a raw condition config.
    pub fn parse(config: &Value) -> Result<Self> {
        let terms = match config {
            Value::Bool(b) => vec![ConditionTerm::Flag(*b)],
            Value::String(s) => vec![ConditionTerm::Expr(s.clone())],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Bool(b) => Ok(ConditionTerm::Flag(*b)),
                    Value::String(s) => Ok(ConditionTerm::Expr(s.clone())),
                    other => Err(RuleError::invalid_shape(format!(
                        "condition elements must be booleans or strings, found {other}"
                    ))),
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(RuleError::invalid_shape(format!(
                    "condition must be a boolean, string or sequence, found {other}"
                )));
            }
        };
        Ok(Self { terms })
    }

    /// Check the condition against the request's injections.
    pub fn check(&self, ctx: &ValidationContext<'_>) -> Result<Option<String>> {
        for term in &self.terms {
            match term {
                ConditionTerm::Flag(true) => {}
                ConditionTerm::Flag(false) => {
                    return Ok(Some(CONDITION_FALSE.to_string()));
                }
                ConditionTerm::Expr(source) => {
                    match ctx.expr.eval_truthy(source, ctx.injections) {
                        Ok(true) => {}
                        Ok(false) => return Ok(Some(CONDITION_FALSE.to_string())),
                        // Expression failures are non-matches, not faults.
                        Err(e) => return Ok(Some(e.to_string())),
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_shapes() {
        assert!(ConditionConfig::parse(&json!(true)).is_ok());
        assert!(ConditionConfig::parse(&json!("$admin")).is_ok());
        assert!(ConditionConfig::parse(&json!([true, "$admin"])).is_ok());
        assert!(ConditionConfig::parse(&json!(42)).is_err());
        assert!(ConditionConfig::parse(&json!(["$a", 42])).is_err());
        assert!(ConditionConfig::parse(&json!({"expr": "$a"})).is_err());
    }

    #[test]
    fn test_parse_preserves_term_order() {
        let config = ConditionConfig::parse(&json!([false, "$never_reached"])).unwrap();
        assert_eq!(config.terms[0], ConditionTerm::Flag(false));
    }
}
