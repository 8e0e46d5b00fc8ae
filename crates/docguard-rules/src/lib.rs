//! Declarative rule engine for the DocGuard data-access gateway.
//!
//! This crate implements the permission language that decides whether a
//! [`DataRequest`](docguard_core::DataRequest) may reach the database:
//!
//! - Rule sources (`collection -> action -> permission-config`) loaded from
//!   JSON or YAML
//! - A compiler that normalizes the shorthand shapes and materializes an
//!   immutable permission table
//! - Built-in validators (`condition`, `data`, `query`, `multi`) plus an
//!   open registry for custom ones
//! - A sandboxed expression language for rule conditions
//! - The matcher that walks rule variants first-wins and reports exact
//!   non-match messages
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docguard_rules::{RuleEngine, RuleSource};
//!
//! let engine = RuleEngine::new(accessor);
//! engine.load(&RuleSource::from_json(r#"{
//!     "posts": {
//!         "read": true,
//!         "update": [
//!             {"condition": "$admin == 1"},
//!             {"data": {"author_id": "$userid == $value"}}
//!         ]
//!     }
//! }"#)?)?;
//!
//! let outcome = engine.validate(&mut request, &injections).await?;
//! if outcome.is_matched() {
//!     // Forward the request to the accessor.
//! }
//! ```

pub mod compiler;
pub mod context;
pub mod error;
pub mod expr;
pub mod fields;
pub mod matcher;
pub mod registry;
pub mod source;
pub mod validators;

pub use compiler::{
    CollectionPermissions, CompiledVariant, PermissionTable, SCHEMA_PERMISSION,
};
pub use context::ValidationContext;
pub use error::{Result, RuleError};
pub use expr::{ExprError, ExprRuntime};
pub use matcher::{ErrorKind, MatchedVariant, RuleEngine, ValidateError, Validation};
pub use registry::{BUILTIN_VALIDATORS, ValidatorRegistry};
pub use source::{CollectionSource, PermissionConfig, RuleSource};
pub use validators::{Processor, Validator};
