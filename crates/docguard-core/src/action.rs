//! Database actions and their wire tokens.
//!
//! Every data request names its operation with one of six fixed wire tokens
//! (`database.queryDocument`, `database.addDocument`, ...). The token strings
//! are part of the external contract and are matched case-sensitively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The operation a data request performs against a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// `database.queryDocument` - read documents.
    #[serde(rename = "database.queryDocument")]
    Read,
    /// `database.addDocument` - insert one or more documents.
    #[serde(rename = "database.addDocument")]
    Add,
    /// `database.updateDocument` - modify matching documents.
    #[serde(rename = "database.updateDocument")]
    Update,
    /// `database.deleteDocument` - remove matching documents.
    #[serde(rename = "database.deleteDocument")]
    Remove,
    /// `database.countDocument` - count matching documents.
    #[serde(rename = "database.countDocument")]
    Count,
    /// `database.watchDocument` - subscribe to collection changes.
    #[serde(rename = "database.watchDocument")]
    Watch,
}

impl Action {
    /// All actions, in the order they appear on the wire contract.
    pub const ALL: [Action; 6] = [
        Action::Read,
        Action::Add,
        Action::Update,
        Action::Remove,
        Action::Count,
        Action::Watch,
    ];

    /// Resolve an action from its exact wire token.
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "database.queryDocument" => Ok(Self::Read),
            "database.addDocument" => Ok(Self::Add),
            "database.updateDocument" => Ok(Self::Update),
            "database.deleteDocument" => Ok(Self::Remove),
            "database.countDocument" => Ok(Self::Count),
            "database.watchDocument" => Ok(Self::Watch),
            other => Err(CoreError::invalid_action(other)),
        }
    }

    /// The wire token for this action.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::Read => "database.queryDocument",
            Self::Add => "database.addDocument",
            Self::Update => "database.updateDocument",
            Self::Remove => "database.deleteDocument",
            Self::Count => "database.countDocument",
            Self::Watch => "database.watchDocument",
        }
    }

    /// The permission name this action selects in a compiled rule table.
    #[must_use]
    pub fn permission_name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Count => "count",
            Self::Watch => "watch",
        }
    }

    /// Returns `true` for actions that carry a `data` payload.
    #[must_use]
    pub fn writes_data(&self) -> bool {
        matches!(self, Self::Add | Self::Update)
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_token(action.token()).unwrap(), action);
        }
    }

    #[test]
    fn test_exact_tokens() {
        assert_eq!(Action::Read.token(), "database.queryDocument");
        assert_eq!(Action::Add.token(), "database.addDocument");
        assert_eq!(Action::Update.token(), "database.updateDocument");
        assert_eq!(Action::Remove.token(), "database.deleteDocument");
        assert_eq!(Action::Count.token(), "database.countDocument");
        assert_eq!(Action::Watch.token(), "database.watchDocument");
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        assert!(Action::from_token("database.QueryDocument").is_err());
        assert!(Action::from_token("database.querydocument").is_err());
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = Action::from_token("database.mergeDocument").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid action token: database.mergeDocument"
        );
    }

    #[test]
    fn test_permission_names() {
        assert_eq!(Action::Read.permission_name(), "read");
        assert_eq!(Action::Add.permission_name(), "add");
        assert_eq!(Action::Update.permission_name(), "update");
        assert_eq!(Action::Remove.permission_name(), "remove");
        assert_eq!(Action::Count.permission_name(), "count");
        assert_eq!(Action::Watch.permission_name(), "watch");
    }

    #[test]
    fn test_serde_uses_wire_tokens() {
        let json = serde_json::to_string(&Action::Update).unwrap();
        assert_eq!(json, "\"database.updateDocument\"");

        let action: Action = serde_json::from_str("\"database.countDocument\"").unwrap();
        assert_eq!(action, Action::Count);
    }

    #[test]
    fn test_writes_data() {
        assert!(Action::Add.writes_data());
        assert!(Action::Update.writes_data());
        assert!(!Action::Read.writes_data());
        assert!(!Action::Watch.writes_data());
    }
}
