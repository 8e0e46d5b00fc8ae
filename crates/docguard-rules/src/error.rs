//! Rule engine error types.
//!
//! Compile-time problems (unknown validators, malformed rule shapes,
//! duplicate registrations) are fatal to the caller of `load`/`add`/`set`/
//! `register` and leave no partial state behind. At request time the only
//! faults are accessor failures and cancellation; everything else a
//! validator reports is a non-match, which is ordinary control flow.

use thiserror::Error;

use docguard_db::AccessorError;

/// Errors raised while compiling rules or validating requests.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule variant references a validator that is not registered.
    #[error("Unknown validator \"{name}\" in rules for {collection}.{action}")]
    UnknownValidator {
        /// Collection the offending rules belong to.
        collection: String,
        /// Action (permission name) the offending variant is under.
        action: String,
        /// The unrecognized validator name.
        name: String,
    },

    /// A field rule uses a key the field-rule language does not define.
    #[error("Unknown rule \"{rule}\" for field \"{field}\"")]
    UnknownRule {
        /// The field the rule was attached to.
        field: String,
        /// The unrecognized rule key.
        rule: String,
    },

    /// `add` was called for a collection that already has rules.
    #[error("Collection \"{collection}\" already has rules")]
    CollectionExists {
        /// The duplicate collection name.
        collection: String,
    },

    /// A validator was registered under a name that is already taken.
    #[error("Validator \"{name}\" is already registered")]
    DuplicateValidator {
        /// The duplicate validator name.
        name: String,
    },

    /// The registered handler is unusable (e.g. an empty name).
    #[error("Invalid validator handler: {message}")]
    InvalidHandler {
        /// Description of the problem.
        message: String,
    },

    /// A rule's shape does not match what its validator expects.
    #[error("Invalid rule shape: {message}")]
    InvalidShape {
        /// Description of the shape problem.
        message: String,
    },

    /// A rule source document failed to parse or load.
    #[error("Invalid rule source: {message}")]
    InvalidSource {
        /// Description of the parse or IO problem.
        message: String,
    },

    /// An `exists`/`unique` lookup failed; a fault, not a non-match.
    #[error(transparent)]
    Accessor(#[from] AccessorError),

    /// The request was cancelled mid-validation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl RuleError {
    /// Creates a new `UnknownValidator` error.
    #[must_use]
    pub fn unknown_validator(
        collection: impl Into<String>,
        action: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::UnknownValidator {
            collection: collection.into(),
            action: action.into(),
            name: name.into(),
        }
    }

    /// Creates a new `UnknownRule` error.
    #[must_use]
    pub fn unknown_rule(field: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::UnknownRule {
            field: field.into(),
            rule: rule.into(),
        }
    }

    /// Creates a new `CollectionExists` error.
    #[must_use]
    pub fn collection_exists(collection: impl Into<String>) -> Self {
        Self::CollectionExists {
            collection: collection.into(),
        }
    }

    /// Creates a new `DuplicateValidator` error.
    #[must_use]
    pub fn duplicate_validator(name: impl Into<String>) -> Self {
        Self::DuplicateValidator { name: name.into() }
    }

    /// Creates a new `InvalidHandler` error.
    #[must_use]
    pub fn invalid_handler(message: impl Into<String>) -> Self {
        Self::InvalidHandler {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidShape` error.
    #[must_use]
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidSource` error.
    #[must_use]
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource {
            message: message.into(),
        }
    }

    /// Returns `true` if this error was raised at rule compile time.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownValidator { .. }
                | Self::UnknownRule { .. }
                | Self::CollectionExists { .. }
                | Self::DuplicateValidator { .. }
                | Self::InvalidHandler { .. }
                | Self::InvalidShape { .. }
                | Self::InvalidSource { .. }
        )
    }
}

/// Convenience result type for rule engine operations
pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuleError::unknown_validator("posts", "update", "sanitize");
        assert_eq!(
            err.to_string(),
            "Unknown validator \"sanitize\" in rules for posts.update"
        );

        let err = RuleError::unknown_rule("title", "maxlen");
        assert_eq!(err.to_string(), "Unknown rule \"maxlen\" for field \"title\"");

        let err = RuleError::collection_exists("posts");
        assert_eq!(err.to_string(), "Collection \"posts\" already has rules");
    }

    #[test]
    fn test_compile_error_classification() {
        assert!(RuleError::duplicate_validator("data").is_compile_error());
        assert!(RuleError::invalid_shape("bad").is_compile_error());
        assert!(!RuleError::Cancelled.is_compile_error());
        assert!(!RuleError::from(AccessorError::backend("down")).is_compile_error());
    }

    #[test]
    fn test_accessor_error_passes_through() {
        let err = RuleError::from(AccessorError::backend("connection refused"));
        assert_eq!(err.to_string(), "Backend error: connection refused");
    }
}
