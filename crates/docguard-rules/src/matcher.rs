//! The rule engine and matching algorithm.
//!
//! [`RuleEngine`] owns the validator registry, the compiled permission
//! table, the expression runtime and the accessor handle. Validation walks
//! the rule variants of the request's (collection, action) cell in source
//! order; within a variant, processors run in registration order and the
//! first non-match ends the variant. A variant whose processors all pass
//! matches the request and short-circuits the walk; otherwise the collected
//! non-matches come back as the denial.
//!
//! `load`/`add`/`set`/`register` swap a fresh table snapshot under a lock,
//! so in-flight validations always observe a consistent compiled table.

use std::sync::{Arc, RwLock};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use docguard_core::{Action, DataRequest, Injections};
use docguard_db::DynAccessor;

use crate::compiler::{
    CompiledVariant, PermissionTable, SCHEMA_PERMISSION, compile_collection, compile_source,
};
use crate::context::ValidationContext;
use crate::error::{Result, RuleError};
use crate::expr::ExprRuntime;
use crate::registry::ValidatorRegistry;
use crate::source::{CollectionSource, RuleSource};
use crate::validators::Validator;

// =============================================================================
// Validate Result
// =============================================================================

/// What produced a validation error: a structural pre-validator failure
/// (serialized as `0`) or a named validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request failed before any validator ran.
    Structural,
    /// The named validator reported a non-match.
    Validator(String),
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Structural => serializer.serialize_u64(0),
            Self::Validator(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) if n.as_u64() == Some(0) => Ok(Self::Structural),
            Value::String(name) => Ok(Self::Validator(name)),
            other => Err(D::Error::custom(format!(
                "error kind must be 0 or a validator name, found {other}"
            ))),
        }
    }
}

/// One reason a request was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateError {
    /// The validator that rejected, or `0` for structural failures.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// The literal non-match message.
    pub error: String,
}

impl ValidateError {
    /// Create a structural (pre-validator) error.
    #[must_use]
    pub fn structural(error: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Structural,
            error: error.into(),
        }
    }

    /// Create a validator non-match error.
    #[must_use]
    pub fn validator(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validator(name.into()),
            error: error.into(),
        }
    }
}

/// The variant a request matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedVariant {
    /// Collection the rules belong to.
    pub collection: String,
    /// Permission name the variants were selected under.
    pub permission: String,
    /// Index of the matching variant in source order.
    pub variant: usize,
}

/// Outcome of validating one request: matched or denied, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The request matched a rule variant and may proceed.
    Matched(MatchedVariant),
    /// No variant matched; the non-matches accumulate in discovery order.
    Denied(Vec<ValidateError>),
}

impl Validation {
    /// Returns `true` if the request matched.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Returns `true` if the request was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// The matched variant, if any.
    #[must_use]
    pub fn matched(&self) -> Option<&MatchedVariant> {
        match self {
            Self::Matched(variant) => Some(variant),
            Self::Denied(_) => None,
        }
    }

    /// The denial errors; empty when the request matched.
    #[must_use]
    pub fn errors(&self) -> &[ValidateError] {
        match self {
            Self::Matched(_) => &[],
            Self::Denied(errors) => errors,
        }
    }
}

// =============================================================================
// Rule Engine
// =============================================================================

/// The policy engine: compiled rules plus everything needed to evaluate
/// them.
///
/// Construct one engine per process (or per tenant); engines are fully
/// isolated from each other.
pub struct RuleEngine {
    registry: RwLock<ValidatorRegistry>,
    table: RwLock<Arc<PermissionTable>>,
    expr: ExprRuntime,
    accessor: DynAccessor,
}

impl RuleEngine {
    /// Create an engine with the built-in validators and no rules.
    #[must_use]
    pub fn new(accessor: DynAccessor) -> Self {
        Self {
            registry: RwLock::new(ValidatorRegistry::new()),
            table: RwLock::new(Arc::new(PermissionTable::new())),
            expr: ExprRuntime::new(),
            accessor,
        }
    }

    /// Compile `source` and replace the whole permission table.
    ///
    /// On error no state changes; the previous table stays live.
    pub fn load(&self, source: &RuleSource) -> Result<()> {
        let table = {
            let registry = self.registry.read().unwrap();
            compile_source(source, &registry)?
        };
        *self.table.write().unwrap() = Arc::new(table);
        tracing::debug!(collections = table_len(self), "rule source loaded");
        Ok(())
    }

    /// Compile and insert rules for a new collection.
    ///
    /// Fails with `CollectionExists` when the collection already has rules.
    pub fn add_collection(&self, collection: &str, rules: &CollectionSource) -> Result<()> {
        if self.snapshot().contains(collection) {
            return Err(RuleError::collection_exists(collection));
        }
        self.set_collection(collection, rules)
    }

    /// Compile and insert or replace rules for a collection.
    pub fn set_collection(&self, collection: &str, rules: &CollectionSource) -> Result<()> {
        let compiled = {
            let registry = self.registry.read().unwrap();
            compile_collection(collection, rules, &registry)?
        };
        let mut guard = self.table.write().unwrap();
        let mut table = (**guard).clone();
        table.set(collection.to_string(), compiled);
        *guard = Arc::new(table);
        Ok(())
    }

    /// Register a custom validator.
    ///
    /// Affects rules compiled after this call; already-compiled variants
    /// keep the validator set they were compiled with.
    pub fn register_validator(&self, validator: Arc<dyn Validator>) -> Result<()> {
        self.registry.write().unwrap().register(validator)
    }

    /// Names of all collections with compiled rules.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        self.snapshot().collections().map(str::to_string).collect()
    }

    /// Returns `true` if `collection` has compiled rules.
    #[must_use]
    pub fn has_collection(&self, collection: &str) -> bool {
        self.snapshot().contains(collection)
    }

    /// The accessor this engine consults for `exists`/`unique` lookups.
    #[must_use]
    pub fn accessor(&self) -> &DynAccessor {
        &self.accessor
    }

    /// The shared expression runtime.
    #[must_use]
    pub fn expr(&self) -> &ExprRuntime {
        &self.expr
    }

    fn snapshot(&self) -> Arc<PermissionTable> {
        Arc::clone(&self.table.read().unwrap())
    }

    /// Validate a request against the compiled rules.
    ///
    /// The request is borrowed mutably so field defaults can be written
    /// into its `data` payload. Accessor failures and cancellation are
    /// faults; everything else comes back as a [`Validation`].
    pub async fn validate(
        &self,
        request: &mut DataRequest,
        injections: &Injections,
    ) -> Result<Validation> {
        let table = self.snapshot();

        let Some(collection) = table.collection(&request.collection) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "collection \"{}\" not found",
                request.collection
            ))]));
        };

        let Ok(action) = Action::from_token(&request.action) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "action \"{}\" invalid",
                request.action
            ))]));
        };

        let permission = action.permission_name();
        let Some(variants) = collection.variants(permission) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "{} {} don't has any rules",
                request.collection, permission
            ))]));
        };

        self.run_variants(permission, action, variants, request, injections)
            .await
    }

    /// Validate a request against the collection's `$schema`
    /// pseudo-permission.
    ///
    /// `$schema` is never selected by an action; this explicit call is the
    /// only way to evaluate it.
    pub async fn validate_schema(
        &self,
        request: &mut DataRequest,
        injections: &Injections,
    ) -> Result<Validation> {
        let table = self.snapshot();

        let Some(collection) = table.collection(&request.collection) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "collection \"{}\" not found",
                request.collection
            ))]));
        };

        let Ok(action) = Action::from_token(&request.action) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "action \"{}\" invalid",
                request.action
            ))]));
        };

        let Some(variants) = collection.variants(SCHEMA_PERMISSION) else {
            return Ok(Validation::Denied(vec![ValidateError::structural(format!(
                "{} {SCHEMA_PERMISSION} don't has any rules",
                request.collection
            ))]));
        };

        self.run_variants(SCHEMA_PERMISSION, action, variants, request, injections)
            .await
    }

    async fn run_variants(
        &self,
        permission: &str,
        action: Action,
        variants: &[CompiledVariant],
        request: &mut DataRequest,
        injections: &Injections,
    ) -> Result<Validation> {
        let collection = request.collection.clone();
        let mut errors = Vec::new();

        for (index, variant) in variants.iter().enumerate() {
            let mut ctx = ValidationContext {
                request: &mut *request,
                action,
                injections,
                accessor: &self.accessor,
                expr: &self.expr,
            };

            let mut failure = None;
            for processor in variant.processors() {
                if let Some(message) = processor.check(&mut ctx).await? {
                    failure = Some(ValidateError::validator(processor.name(), message));
                    break;
                }
            }

            match failure {
                None => {
                    tracing::debug!(
                        collection = %collection,
                        permission = %permission,
                        variant = index,
                        "rule variant matched"
                    );
                    return Ok(Validation::Matched(MatchedVariant {
                        collection,
                        permission: permission.to_string(),
                        variant: index,
                    }));
                }
                Some(error) => {
                    tracing::trace!(
                        collection = %collection,
                        permission = %permission,
                        variant = index,
                        validator = ?error.kind,
                        error = %error.error,
                        "rule variant did not match"
                    );
                    errors.push(error);
                }
            }
        }

        Ok(Validation::Denied(errors))
    }
}

fn table_len(engine: &RuleEngine) -> usize {
    engine.snapshot().collections().count()
}

// =============================================================================
// Tests
// =============================================================================
