//! The `query` validator.
//!
//! A sequence config whitelists the allowed top-level query fields; a
//! mapping config whitelists its keys **and** applies the field-rule
//! language to each. Operator keys (`$or`, `$and`, ...) are transparently
//! stripped when enumerating input fields on query-carrying actions.

use serde_json::Value;

use docguard_core::{Action, JsonMap, is_operator};

use crate::context::ValidationContext;
use crate::error::{Result, RuleError};
use crate::fields::{FieldMode, FieldRules};

/// Parsed config of the `query` validator.
#[derive(Debug, Clone)]
pub enum QueryConfig {
    /// Whitelist of allowed top-level query fields.
    Allowed(Vec<String>),
    /// Whitelist plus per-field rules.
    Fields(FieldRules),
}

impl QueryConfig {
    /// Parse and validate a raw query config.
    pub fn parse(config: &Value) -> Result<Self> {
        match config {
            Value::Array(items) => {
                let fields = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            RuleError::invalid_shape(
                                "query whitelist entries must be field names",
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Allowed(fields))
            }
            Value::Object(map) => Ok(Self::Fields(FieldRules::parse(map)?)),
            other => Err(RuleError::invalid_shape(format!(
                "query rules must be a sequence or mapping, found {other}"
            ))),
        }
    }

    fn allows(&self, field: &str) -> bool {
        match self {
            Self::Allowed(fields) => fields.iter().any(|f| f == field),
            Self::Fields(rules) => rules.fields().any(|f| f == field),
        }
    }

    /// Check the request's `query` document.
    pub async fn check(&self, ctx: &mut ValidationContext<'_>) -> Result<Option<String>> {
        let Some(query) = ctx.request.query.clone() else {
            return Ok(Some("query is undefined".to_string()));
        };
        let Some(map) = query.as_object() else {
            return Ok(Some("query must be an object".to_string()));
        };

        // Operator keys are not caller fields on query-carrying actions.
        let strip = matches!(
            ctx.action,
            Action::Read | Action::Count | Action::Remove | Action::Update
        );
        let mut fields = JsonMap::new();
        for (key, value) in map {
            if strip && is_operator(key) {
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }

        for field in fields.keys() {
            if !self.allows(field) {
                // The trailing bracket is part of the wire contract.
                return Ok(Some(format!("the field '{field}' is NOT allowed]")));
            }
        }

        match self {
            Self::Allowed(_) => Ok(None),
            Self::Fields(rules) => rules.check(ctx, &mut fields, FieldMode::Query).await,
        }
    }
}
