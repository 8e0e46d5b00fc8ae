//! The `multi` validator.
//!
//! Governs whether a request may affect more than one document. Unlike the
//! other built-ins this validator computes a per-action default, so it runs
//! even when no config is present: `read` allows multi-document requests by
//! default, every other action denies them.

use serde_json::Value;

use docguard_core::Action;

use crate::context::ValidationContext;
use crate::error::{Result, RuleError};
use crate::expr::truthy;

/// Parsed config of the `multi` validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiConfig {
    /// A fixed allow/deny override.
    Flag(bool),
    /// A sandbox expression over the injections plus `query`, `data` and
    /// `multi`.
    Expr(String),
}

impl MultiConfig {
    /// Parse and validate a raw multi config.
    pub fn parse(config: &Value) -> Result<Self> {
        match config {
            Value::Bool(b) => Ok(Self::Flag(*b)),
            Value::String(s) => Ok(Self::Expr(s.clone())),
            other => Err(RuleError::invalid_shape(format!(
                "multi must be a boolean or expression string, found {other}"
            ))),
        }
    }
}

/// Check the request's multi-document intent.
pub fn check(config: Option<&MultiConfig>, ctx: &ValidationContext<'_>) -> Option<String> {
    if ctx.action == Action::Add
        && ctx.request.data.as_ref().is_some_and(Value::is_array)
        && !ctx.request.multi
    {
        return Some("multi insert operation denied".to_string());
    }

    let allowed = match config {
        Some(MultiConfig::Flag(b)) => *b,
        Some(MultiConfig::Expr(source)) => {
            let mut bindings = ctx.injections.clone();
            bindings.insert(
                "query".to_string(),
                ctx.request.query.clone().unwrap_or(Value::Null),
            );
            bindings.insert(
                "data".to_string(),
                ctx.request.data.clone().unwrap_or(Value::Null),
            );
            bindings.insert("multi".to_string(), Value::Bool(ctx.request.multi));
            match ctx.expr.evaluate(source, &bindings) {
                Ok(value) => truthy(&value),
                Err(e) => return Some(e.to_string()),
            }
        }
        None => ctx.action == Action::Read,
    };

    if !allowed && ctx.request.multi {
        return Some("multi operation denied".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_shapes() {
        assert_eq!(
            MultiConfig::parse(&json!(true)).unwrap(),
            MultiConfig::Flag(true)
        );
        assert_eq!(
            MultiConfig::parse(&json!("multi == true")).unwrap(),
            MultiConfig::Expr("multi == true".to_string())
        );
        assert!(MultiConfig::parse(&json!(1)).is_err());
        assert!(MultiConfig::parse(&json!({"allow": true})).is_err());
    }
}
