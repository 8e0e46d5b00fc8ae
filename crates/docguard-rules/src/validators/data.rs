//! The `data` validator.
//!
//! Validates the `data` payload of `add` and `update` requests: structural
//! preconditions, the merge/operator consistency rule, and the per-field
//! rule language. Requests for other actions pass through untouched even
//! when the validator is configured.

use serde_json::Value;

use docguard_core::{Action, JsonMap, is_update_operator};

use crate::context::ValidationContext;
use crate::error::{Result, RuleError};
use crate::fields::{FieldRules, mode_for};

/// Parsed config of the `data` validator: a `field -> field-rule` mapping.
#[derive(Debug, Clone)]
pub struct DataConfig {
    rules: FieldRules,
}

impl DataConfig {
    /// Parse and validate a raw data config.
    pub fn parse(config: &Value) -> Result<Self> {
        let map = config.as_object().ok_or_else(|| {
            RuleError::invalid_shape("data rules must be a mapping of field rules")
        })?;
        Ok(Self {
            rules: FieldRules::parse(map)?,
        })
    }

    /// Check the request's `data` payload.
    pub async fn check(&self, ctx: &mut ValidationContext<'_>) -> Result<Option<String>> {
        if !ctx.action.writes_data() {
            return Ok(None);
        }

        let Some(data) = ctx.request.data.clone() else {
            return Ok(Some("data is undefined".to_string()));
        };
        let Some(map) = data.as_object() else {
            return Ok(Some("data must be an object".to_string()));
        };
        if map.is_empty() {
            return Ok(Some("data is empty".to_string()));
        }

        if ctx.action == Action::Update {
            let has_operator = map.keys().any(|key| is_update_operator(key));
            if ctx.request.merge && !has_operator {
                return Ok(Some(
                    "data must contain operator while `merge` with true".to_string(),
                ));
            }
            if !ctx.request.merge && has_operator {
                return Ok(Some("data must not contain any operator".to_string()));
            }
        }

        let mode = mode_for(ctx.action);
        let mut flat = flatten(map);
        self.rules.check(ctx, &mut flat, mode).await
    }
}

/// Merge operator sub-mappings one level up: `{$set: {a: 1}, b: 2}`
/// flattens to `{a: 1, b: 2}`.
pub fn flatten(data: &JsonMap) -> JsonMap {
    let mut flat = JsonMap::new();
    for (key, value) in data {
        if is_update_operator(key) {
            if let Some(nested) = value.as_object() {
                for (field, field_value) in nested {
                    flat.insert(field.clone(), field_value.clone());
                }
            }
        } else {
            flat.insert(key.clone(), value.clone());
        }
    }
    flat
}
