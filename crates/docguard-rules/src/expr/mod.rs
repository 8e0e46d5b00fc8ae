//! Sandboxed expression evaluation for rule conditions.
//!
//! Rule authors write compact boolean conditions (`"$userid == $value"`)
//! that run against per-request injections. This module is the only place
//! the engine executes user-supplied code, so its surface is deliberately
//! enumerable: literals, variable references, and the boolean / equality /
//! comparison / membership / arithmetic operators. No assignment, no
//! function definition, no access to host state outside the bindings.
//!
//! # Design
//!
//! The runtime is created once and reused for all evaluations. Sources are
//! parsed to an AST once and cached by hash; only the binding lookup happens
//! per request.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ ExprRuntime (created once)              │
//! │   └── ast_cache: HashMap<hash, Expr>    │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼ evaluate(source, bindings)
//! ┌─────────────────────────────────────────┐
//! │ Per-request (lightweight):              │
//! │   1. Get or parse AST (cached)          │
//! │   2. Evaluate against bindings          │
//! └─────────────────────────────────────────┘
//! ```

pub mod eval;
pub mod parser;
pub mod token;

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;

use docguard_core::Injections;

use self::parser::Expr;

pub use self::eval::{truthy, value_eq};

/// An expression that failed to parse or evaluate.
///
/// Carries the source text and the underlying message. Expression failures
/// surface to validators as non-matches; they never poison the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expression \"{expression}\" failed: {message}")]
pub struct ExprError {
    /// The offending source text.
    pub expression: String,
    /// The parse or evaluation message.
    pub message: String,
}

/// Statistics about the expression AST cache.
#[derive(Debug, Clone)]
pub struct ExprCacheStats {
    /// Number of cached expressions.
    pub cached_expressions: usize,
}

/// Reentrant expression runtime with an AST cache.
#[derive(Debug, Default)]
pub struct ExprRuntime {
    ast_cache: RwLock<HashMap<u64, Arc<Expr>>>,
}

impl ExprRuntime {
    /// Create a new runtime with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `source` against `bindings`.
    pub fn evaluate(&self, source: &str, bindings: &Injections) -> Result<Value, ExprError> {
        let ast = self.get_or_parse(source)?;
        eval::evaluate(&ast, bindings).map_err(|message| ExprError {
            expression: source.to_string(),
            message,
        })
    }

    /// Evaluate `source` and coerce the result to a boolean.
    pub fn eval_truthy(&self, source: &str, bindings: &Injections) -> Result<bool, ExprError> {
        Ok(truthy(&self.evaluate(source, bindings)?))
    }

    /// Get a parsed AST from cache, or parse and cache it.
    fn get_or_parse(&self, source: &str) -> Result<Arc<Expr>, ExprError> {
        let hash = Self::hash_source(source);

        {
            let cache = self.ast_cache.read().unwrap();
            if let Some(ast) = cache.get(&hash) {
                return Ok(Arc::clone(ast));
            }
        }

        let ast = Arc::new(parser::parse(source).map_err(|message| {
            tracing::warn!(expression = %source, error = %message, "failed to parse expression");
            ExprError {
                expression: source.to_string(),
                message,
            }
        })?);

        self.ast_cache.write().unwrap().insert(hash, Arc::clone(&ast));
        Ok(ast)
    }

    fn hash_source(source: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        hasher.finish()
    }

    /// Get cache statistics for monitoring.
    #[must_use]
    pub fn cache_stats(&self) -> ExprCacheStats {
        ExprCacheStats {
            cached_expressions: self.ast_cache.read().unwrap().len(),
        }
    }

    /// Clear the AST cache.
    pub fn clear_cache(&self) {
        self.ast_cache.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, Value)]) -> Injections {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_evaluate() {
        let runtime = ExprRuntime::new();
        let result = runtime
            .evaluate("$userid == $value", &bindings(&[
                ("$userid", json!(123)),
                ("$value", json!(123)),
            ]))
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn test_eval_truthy_coerces() {
        let runtime = ExprRuntime::new();
        let b = bindings(&[("$n", json!(5))]);
        assert!(runtime.eval_truthy("$n", &b).unwrap());
        assert!(!runtime.eval_truthy("$n - 5", &b).unwrap());
        assert!(!runtime.eval_truthy("''", &b).unwrap());
    }

    #[test]
    fn test_parse_error_carries_source() {
        let runtime = ExprRuntime::new();
        let err = runtime.evaluate("1 +", &bindings(&[])).unwrap_err();
        assert_eq!(err.expression, "1 +");
        assert!(err.to_string().contains("1 +"));
    }

    #[test]
    fn test_eval_error_carries_source() {
        let runtime = ExprRuntime::new();
        let err = runtime.evaluate("$ghost", &bindings(&[])).unwrap_err();
        assert_eq!(err.expression, "$ghost");
        assert!(err.message.contains("$ghost"));
    }

    #[test]
    fn test_ast_caching() {
        let runtime = ExprRuntime::new();
        let b = bindings(&[("$a", json!(1))]);

        let _ = runtime.evaluate("$a == 1", &b);
        assert_eq!(runtime.cache_stats().cached_expressions, 1);

        // Same source reuses the cached AST.
        let _ = runtime.evaluate("$a == 1", &b);
        assert_eq!(runtime.cache_stats().cached_expressions, 1);

        let _ = runtime.evaluate("$a == 2", &b);
        assert_eq!(runtime.cache_stats().cached_expressions, 2);

        runtime.clear_cache();
        assert_eq!(runtime.cache_stats().cached_expressions, 0);
    }

    #[test]
    fn test_failed_parses_are_not_cached() {
        let runtime = ExprRuntime::new();
        let _ = runtime.evaluate("((", &bindings(&[]));
        assert_eq!(runtime.cache_stats().cached_expressions, 0);
    }

    #[test]
    fn test_runtime_is_reentrant() {
        // Two evaluations against different bindings share one cached AST.
        let runtime = ExprRuntime::new();
        assert_eq!(
            runtime
                .evaluate("$x * 2", &bindings(&[("$x", json!(2))]))
                .unwrap(),
            json!(4)
        );
        assert_eq!(
            runtime
                .evaluate("$x * 2", &bindings(&[("$x", json!(5))]))
                .unwrap(),
            json!(10)
        );
        assert_eq!(runtime.cache_stats().cached_expressions, 1);
    }
}
