//! Validator registry.
//!
//! Maps validator names to handlers. The four built-ins (`condition`,
//! `data`, `query`, `multi`) are seeded at construction in their fixed
//! evaluation order; custom validators append behind them in registration
//! order. That combined order is the order processors run within a variant.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::validators::{
    ConditionConfig, DataConfig, MultiConfig, Processor, QueryConfig, Validator,
};

/// Names of the built-in validators, in evaluation order.
pub const BUILTIN_VALIDATORS: [&str; 4] = ["condition", "data", "query", "multi"];

/// Registry of validator names and handlers.
#[derive(Default)]
pub struct ValidatorRegistry {
    custom: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Create a registry seeded with the built-in validators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom validator behind the built-ins.
    ///
    /// Fails with `InvalidHandler` when the validator reports an empty name
    /// and `DuplicateValidator` when the name is already taken.
    pub fn register(&mut self, validator: Arc<dyn Validator>) -> Result<()> {
        let name = validator.name().to_string();
        if name.is_empty() {
            return Err(RuleError::invalid_handler("validator name must be non-empty"));
        }
        if self.contains(&name) {
            return Err(RuleError::duplicate_validator(name));
        }
        self.custom.push(validator);
        Ok(())
    }

    /// Look up a custom validator handler by name.
    ///
    /// Built-in names resolve through [`materialize`](Self::materialize)
    /// rather than a handler object.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn Validator>> {
        self.custom.iter().find(|v| v.name() == name)
    }

    /// Returns `true` if `name` is a registered validator.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        BUILTIN_VALIDATORS.contains(&name) || self.lookup(name).is_some()
    }

    /// All registered names, built-ins first, in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        BUILTIN_VALIDATORS
            .into_iter()
            .chain(self.custom.iter().map(|v| v.name()))
    }

    /// Total number of registered validators.
    #[must_use]
    pub fn len(&self) -> usize {
        BUILTIN_VALIDATORS.len() + self.custom.len()
    }

    /// Returns `false`; the built-ins are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Materialize a processor for `name` from an optional raw config.
    ///
    /// Built-in configs are parsed and validated here, at compile time;
    /// custom validators get a chance to reject their config via
    /// [`Validator::compile`] and otherwise carry it raw.
    pub fn materialize(&self, name: &str, config: Option<&Value>) -> Result<Processor> {
        match name {
            "condition" => Ok(Processor::Condition(
                config.map(ConditionConfig::parse).transpose()?,
            )),
            "data" => Ok(Processor::Data(config.map(DataConfig::parse).transpose()?)),
            "query" => Ok(Processor::Query(config.map(QueryConfig::parse).transpose()?)),
            "multi" => Ok(Processor::Multi(config.map(MultiConfig::parse).transpose()?)),
            custom => {
                let handler = self.lookup(custom).ok_or_else(|| {
                    RuleError::invalid_handler(format!("validator \"{custom}\" is not registered"))
                })?;
                if let Some(config) = config {
                    handler.compile(config)?;
                }
                Ok(Processor::Custom {
                    name: custom.to_string(),
                    handler: Arc::clone(handler),
                    config: config.cloned(),
                })
            }
        }
    }
}
