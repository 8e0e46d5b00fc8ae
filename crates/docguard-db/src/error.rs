use thiserror::Error;

/// Errors raised by document-database accessors.
#[derive(Debug, Error)]
pub enum AccessorError {
    /// The backend failed to execute the operation.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The query document could not be interpreted by the backend.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of why the query is invalid.
        message: String,
    },

    /// The data payload could not be applied by the backend.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of why the data is invalid.
        message: String,
    },

    /// The operation was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,
}

impl AccessorError {
    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidQuery` error.
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Returns `true` if the error stems from caller input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery { .. } | Self::InvalidData { .. })
    }
}

/// Convenience result type for accessor operations
pub type Result<T> = std::result::Result<T, AccessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccessorError::backend("connection refused");
        assert_eq!(err.to_string(), "Backend error: connection refused");

        let err = AccessorError::invalid_query("$near is not supported");
        assert_eq!(err.to_string(), "Invalid query: $near is not supported");

        assert_eq!(AccessorError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AccessorError::invalid_query("bad").is_client_error());
        assert!(AccessorError::invalid_data("bad").is_client_error());
        assert!(!AccessorError::backend("down").is_client_error());
        assert!(!AccessorError::Cancelled.is_client_error());
    }
}
