//! The per-field rule language shared by the `data` and `query` validators.
//!
//! A field rule is either a bare condition string (shorthand) or a mapping
//! drawn from a fixed set of keys: `required`, `default`, `in`, `length`,
//! `number`, `match`, `exists`, `unique`, `condition`. Unknown keys are
//! fatal at compile time. Rules are parsed once when the rule set compiles;
//! regexes and `exists` references are validated there so request-time
//! evaluation never hits a malformed rule.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use docguard_core::{Action, JsonMap};

use crate::context::ValidationContext;
use crate::error::{Result, RuleError};
use crate::expr::{truthy, value_eq};
use crate::validators::condition::CONDITION_FALSE;

/// How a set of field rules is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// `add` payloads: `required` is enforced, `default` is written back.
    Add,
    /// `update` payloads: partial; absent fields skip all value checks.
    Update,
    /// Query documents: absent fields skip all value checks.
    Query,
}

/// Inclusive numeric bounds: `[min]` or `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: Option<f64>,
}

impl Bounds {
    fn parse(rule: &str, field: &str, value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            RuleError::invalid_shape(format!(
                "\"{rule}\" for field \"{field}\" must be [min] or [min, max]"
            ))
        })?;
        let numbers: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
        if numbers.len() != items.len() || numbers.is_empty() || numbers.len() > 2 {
            return Err(RuleError::invalid_shape(format!(
                "\"{rule}\" for field \"{field}\" must be [min] or [min, max]"
            )));
        }
        Ok(Self {
            min: numbers[0],
            max: numbers.get(1).copied(),
        })
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }

    fn describe(&self) -> String {
        match self.max {
            Some(max) => format!(">= {} and <= {}", self.min, max),
            None => format!(">= {}", self.min),
        }
    }
}

/// A cross-collection reference: `"/collection/key"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsRef {
    pub collection: String,
    pub key: String,
}

impl ExistsRef {
    fn parse(field: &str, value: &Value) -> Result<Self> {
        let text = value.as_str().unwrap_or_default();
        let mut segments = text.strip_prefix('/').unwrap_or("").splitn(2, '/');
        match (segments.next(), segments.next()) {
            (Some(collection), Some(key)) if !collection.is_empty() && !key.is_empty() => {
                Ok(Self {
                    collection: collection.to_string(),
                    key: key.to_string(),
                })
            }
            _ => Err(RuleError::invalid_shape(format!(
                "\"exists\" for field \"{field}\" must look like \"/collection/key\""
            ))),
        }
    }
}

/// The compiled rules for a single field.
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    required: bool,
    default: Option<Value>,
    one_of: Option<Vec<Value>>,
    length: Option<Bounds>,
    number: Option<Bounds>,
    pattern: Option<Regex>,
    exists: Option<ExistsRef>,
    unique: bool,
    condition: Option<String>,
}

impl FieldRule {
    fn parse(field: &str, config: &Value) -> Result<Self> {
        // A bare string is shorthand for {condition: "<string>"}.
        if let Some(condition) = config.as_str() {
            return Ok(Self {
                condition: Some(condition.to_string()),
                ..Self::default()
            });
        }
        let map = config.as_object().ok_or_else(|| {
            RuleError::invalid_shape(format!(
                "rules for field \"{field}\" must be a string or an object"
            ))
        })?;

        let mut rule = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "required" => {
                    rule.required = value.as_bool().ok_or_else(|| {
                        RuleError::invalid_shape(format!(
                            "\"required\" for field \"{field}\" must be a boolean"
                        ))
                    })?;
                }
                "default" => rule.default = Some(value.clone()),
                "in" => {
                    rule.one_of = Some(
                        value
                            .as_array()
                            .ok_or_else(|| {
                                RuleError::invalid_shape(format!(
                                    "\"in\" for field \"{field}\" must be a sequence"
                                ))
                            })?
                            .clone(),
                    );
                }
                "length" => rule.length = Some(Bounds::parse("length", field, value)?),
                "number" => rule.number = Some(Bounds::parse("number", field, value)?),
                "match" => {
                    let pattern = value.as_str().ok_or_else(|| {
                        RuleError::invalid_shape(format!(
                            "\"match\" for field \"{field}\" must be a regex string"
                        ))
                    })?;
                    rule.pattern = Some(Regex::new(pattern).map_err(|e| {
                        RuleError::invalid_shape(format!(
                            "\"match\" for field \"{field}\" is not a valid regex: {e}"
                        ))
                    })?);
                }
                "exists" => rule.exists = Some(ExistsRef::parse(field, value)?),
                "unique" => rule.unique = truthy(value),
                "condition" => {
                    let condition = value.as_str().ok_or_else(|| {
                        RuleError::invalid_shape(format!(
                            "\"condition\" for field \"{field}\" must be a string"
                        ))
                    })?;
                    rule.condition = Some(condition.to_string());
                }
                unknown => return Err(RuleError::unknown_rule(field, unknown)),
            }
        }
        Ok(rule)
    }
}

/// An ordered set of field rules, as written in a `data` or `query` config.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    rules: Vec<(String, FieldRule)>,
}

impl FieldRules {
    /// Parse a `field -> field-rule` mapping. Unknown rule keys are fatal.
    pub fn parse(config: &JsonMap) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.len());
        for (field, value) in config {
            rules.push((field.clone(), FieldRule::parse(field, value)?));
        }
        Ok(Self { rules })
    }

    /// Names of the configured fields, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    /// Returns `true` when no fields are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every configured field against `values`.
    ///
    /// Returns the first non-match message, or `None` when all fields pass.
    /// In [`FieldMode::Add`], defaults are written into both `values` and
    /// the request's own `data` payload.
    pub async fn check(
        &self,
        ctx: &mut ValidationContext<'_>,
        values: &mut JsonMap,
        mode: FieldMode,
    ) -> Result<Option<String>> {
        let accessor = Arc::clone(ctx.accessor);
        let collection = ctx.request.collection.clone();

        for (field, rule) in &self.rules {
            let present = values.get(field).is_some_and(|v| !v.is_null());

            let value = if present {
                values.get(field).cloned().unwrap_or(Value::Null)
            } else {
                match (mode, &rule.default) {
                    (FieldMode::Add, Some(default)) => {
                        values.insert(field.clone(), default.clone());
                        if let Some(data) =
                            ctx.request.data.as_mut().and_then(Value::as_object_mut)
                        {
                            data.insert(field.clone(), default.clone());
                        }
                        default.clone()
                    }
                    (FieldMode::Add, None) if rule.required => {
                        return Ok(Some(format!("{field} is required")));
                    }
                    // Absent and not required: nothing to check.
                    _ => continue,
                }
            };

            if let Some(one_of) = &rule.one_of
                && !one_of.iter().any(|candidate| value_eq(candidate, &value))
            {
                let csv = one_of
                    .iter()
                    .map(|candidate| match candidate {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                return Ok(Some(format!("{field} should equal to one of [{csv}]")));
            }

            if let Some(bounds) = &rule.length {
                let len = value.as_str().map(|s| s.chars().count() as f64);
                if !len.is_some_and(|len| bounds.contains(len)) {
                    return Ok(Some(format!(
                        "length of {field} should {}",
                        bounds.describe()
                    )));
                }
            }

            if let Some(bounds) = &rule.number {
                if !value.as_f64().is_some_and(|n| bounds.contains(n)) {
                    return Ok(Some(format!("{field} should {}", bounds.describe())));
                }
            }

            if let Some(pattern) = &rule.pattern {
                let ok = value.as_str().is_some_and(|s| pattern.is_match(s));
                if !ok {
                    return Ok(Some(format!("{field} had invalid format")));
                }
            }

            if let Some(exists) = &rule.exists {
                let mut lookup = JsonMap::new();
                lookup.insert(exists.key.clone(), value.clone());
                if accessor.get(&exists.collection, &lookup).await?.is_none() {
                    return Ok(Some(format!("{field} not exists")));
                }
            }

            if rule.unique {
                let mut lookup = JsonMap::new();
                lookup.insert(field.clone(), value.clone());
                if accessor.get(&collection, &lookup).await?.is_some() {
                    return Ok(Some(format!("{field} already exists")));
                }
            }

            if let Some(condition) = &rule.condition {
                let mut bindings = ctx.injections.clone();
                bindings.insert("$value".to_string(), value.clone());
                match ctx.expr.eval_truthy(condition, &bindings) {
                    Ok(true) => {}
                    Ok(false) => return Ok(Some(CONDITION_FALSE.to_string())),
                    Err(e) => return Ok(Some(e.to_string())),
                }
            }
        }
        Ok(None)
    }
}

/// Relevant field mode for an action's payload.
#[must_use]
pub fn mode_for(action: Action) -> FieldMode {
    if action == Action::Add {
        FieldMode::Add
    } else {
        FieldMode::Update
    }
}
