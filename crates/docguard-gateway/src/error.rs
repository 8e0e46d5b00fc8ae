use thiserror::Error;

use docguard_db::AccessorError;
use docguard_rules::{RuleError, ValidateError};

/// Errors surfaced by the gateway's `execute` call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No rule variant matched the request.
    #[error("Permission denied for {collection} {action}")]
    PermissionDenied {
        /// Target collection of the rejected request.
        collection: String,
        /// Raw action token of the rejected request.
        action: String,
        /// The engine's non-match errors, in discovery order.
        errors: Vec<ValidateError>,
    },

    /// The request was structurally unusable after validation.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The rule engine faulted (compile error, accessor failure,
    /// cancellation).
    #[error(transparent)]
    Engine(#[from] RuleError),

    /// The accessor failed while executing the validated request.
    #[error(transparent)]
    Accessor(#[from] AccessorError),
}

impl GatewayError {
    /// Creates a new `PermissionDenied` error.
    #[must_use]
    pub fn permission_denied(
        collection: impl Into<String>,
        action: impl Into<String>,
        errors: Vec<ValidateError>,
    ) -> Self {
        Self::PermissionDenied {
            collection: collection.into(),
            action: action.into(),
            errors,
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a rule denial.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// The denial errors, when this is a `PermissionDenied`.
    #[must_use]
    pub fn denial_errors(&self) -> Option<&[ValidateError]> {
        match self {
            Self::PermissionDenied { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Convenience result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
