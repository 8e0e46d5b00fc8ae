use thiserror::Error;

/// Core error types for DocGuard request handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid action token: {0}")]
    InvalidAction(String),

    #[error("Invalid sort direction: {0}")]
    InvalidDirection(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidAction error
    pub fn invalid_action(token: impl Into<String>) -> Self {
        Self::InvalidAction(token.into())
    }

    /// Create a new InvalidDirection error
    pub fn invalid_direction(token: impl Into<String>) -> Self {
        Self::InvalidDirection(token.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_action("database.mangleDocument");
        assert_eq!(
            err.to_string(),
            "Invalid action token: database.mangleDocument"
        );

        let err = CoreError::invalid_direction("sideways");
        assert_eq!(err.to_string(), "Invalid sort direction: sideways");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err =
            serde_json::from_str::<serde_json::Value>("{ not json }").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::JsonError(_)));
    }
}
