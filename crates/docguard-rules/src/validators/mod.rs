//! Built-in validators and the open validator interface.
//!
//! Each validator is a named asynchronous predicate over (config,
//! request-context). Returning `Some(message)` is a **non-match** signal --
//! ordinary control flow that lets the matcher fall through to the next
//! rule variant. Returning an error is a fault and aborts validation.

pub mod condition;
pub mod data;
pub mod multi;
pub mod query;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ValidationContext;
use crate::error::Result;

pub use self::condition::ConditionConfig;
pub use self::data::DataConfig;
pub use self::multi::MultiConfig;
pub use self::query::QueryConfig;

/// A custom validator registered alongside the built-ins.
#[async_trait]
pub trait Validator: Send + Sync {
    /// The name rule variants use to reference this validator.
    fn name(&self) -> &str;

    /// Validate a raw config at rule compile time.
    fn compile(&self, config: &Value) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Check one request. `None` config means "not configured" and must be
    /// treated as a no-op.
    async fn check(
        &self,
        config: Option<&Value>,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<Option<String>>;
}

/// A compiled (name, handler, config) triple inside a rule variant.
///
/// The built-ins carry their parsed configs; custom validators carry the
/// raw config value. `None` always means the variant did not configure the
/// validator.
pub enum Processor {
    Condition(Option<ConditionConfig>),
    Data(Option<DataConfig>),
    Query(Option<QueryConfig>),
    Multi(Option<MultiConfig>),
    Custom {
        name: String,
        handler: Arc<dyn Validator>,
        config: Option<Value>,
    },
}

impl Processor {
    /// The validator name this processor runs under.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Condition(_) => "condition",
            Self::Data(_) => "data",
            Self::Query(_) => "query",
            Self::Multi(_) => "multi",
            Self::Custom { name, .. } => name,
        }
    }

    /// Returns `true` when the variant configured this validator.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        match self {
            Self::Condition(config) => config.is_some(),
            Self::Data(config) => config.is_some(),
            Self::Query(config) => config.is_some(),
            Self::Multi(config) => config.is_some(),
            Self::Custom { config, .. } => config.is_some(),
        }
    }

    /// Run this processor against one request.
    pub async fn check(&self, ctx: &mut ValidationContext<'_>) -> Result<Option<String>> {
        match self {
            Self::Condition(None) | Self::Data(None) | Self::Query(None) => Ok(None),
            Self::Condition(Some(config)) => config.check(ctx),
            Self::Data(Some(config)) => config.check(ctx).await,
            Self::Query(Some(config)) => config.check(ctx).await,
            // The multi validator computes a per-action default, so it runs
            // even without a config.
            Self::Multi(config) => Ok(multi::check(config.as_ref(), ctx)),
            Self::Custom {
                handler, config, ..
            } => handler.check(config.as_ref(), ctx).await,
        }
    }
}

impl Clone for Processor {
    fn clone(&self) -> Self {
        match self {
            Self::Condition(config) => Self::Condition(config.clone()),
            Self::Data(config) => Self::Data(config.clone()),
            Self::Query(config) => Self::Query(config.clone()),
            Self::Multi(config) => Self::Multi(config.clone()),
            Self::Custom {
                name,
                handler,
                config,
            } => Self::Custom {
                name: name.clone(),
                handler: Arc::clone(handler),
                config: config.clone(),
            },
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name())
            .field("configured", &self.is_configured())
            .finish()
    }
}
