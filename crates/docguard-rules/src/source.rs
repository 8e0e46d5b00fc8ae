//! Raw rule sources.
//!
//! A rule source is the user-authored `collection -> action ->
//! permission-config` tree, loaded from JSON or YAML. Permission configs
//! come in four shapes (boolean, string, single variant, sequence of
//! variants); [`PermissionConfig`] models them as an algebraic variant and
//! normalization collapses them to a uniform sequence at compile time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docguard_core::JsonMap;

use crate::error::{Result, RuleError};

/// The raw rules of a single collection: permission name to raw config.
pub type CollectionSource = HashMap<String, Value>;

/// A complete raw rule tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSource(pub HashMap<String, CollectionSource>);

impl RuleSource {
    /// Parse a rule source from a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| RuleError::invalid_source(format!("JSON parse error: {e}")))
    }

    /// Parse a rule source from a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| RuleError::invalid_source(format!("YAML parse error: {e}")))
    }

    /// Load a rule source from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RuleError::invalid_source(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Err(RuleError::invalid_source(format!(
                "unsupported rule file extension: {}",
                path.display()
            ))),
        }
    }

    /// Build a rule source from an in-memory JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| RuleError::invalid_source(format!("invalid rule tree: {e}")))
    }

    /// Collection names present in the source.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The raw rules of `collection`, if present.
    #[must_use]
    pub fn get(&self, collection: &str) -> Option<&CollectionSource> {
        self.0.get(collection)
    }
}

/// The four accepted shapes of a permission config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionConfig {
    /// Shorthand for `[{condition: <bool>}]`.
    Flag(bool),
    /// Shorthand for `[{condition: "<string>"}]`.
    Expr(String),
    /// A single rule variant.
    Variant(JsonMap),
    /// Ordered rule variants, matched first-wins.
    Variants(Vec<JsonMap>),
}

impl PermissionConfig {
    /// Interpret a raw config value.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|_| {
            RuleError::invalid_shape(format!(
                "permission config must be a boolean, string, object or sequence of objects, \
                 found {value}"
            ))
        })
    }

    /// Collapse the shorthand shapes to a uniform sequence of variants.
    #[must_use]
    pub fn into_variants(self) -> Vec<JsonMap> {
        match self {
            Self::Flag(flag) => {
                let mut variant = JsonMap::new();
                variant.insert("condition".to_string(), Value::Bool(flag));
                vec![variant]
            }
            Self::Expr(expr) => {
                let mut variant = JsonMap::new();
                variant.insert("condition".to_string(), Value::String(expr));
                vec![variant]
            }
            Self::Variant(variant) => vec![variant],
            Self::Variants(variants) => variants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let source = RuleSource::from_json(
            r#"{"categories": {"update": {"condition": true}, "read": true}}"#,
        )
        .unwrap();
        assert_eq!(source.collections().collect::<Vec<_>>(), vec!["categories"]);
        assert!(source.get("categories").unwrap().contains_key("update"));
    }

    #[test]
    fn test_from_yaml() {
        let source = RuleSource::from_yaml(
            "posts:\n  add:\n    data:\n      title:\n        required: true\n  read: true\n",
        )
        .unwrap();
        let posts = source.get("posts").unwrap();
        assert_eq!(posts["read"], json!(true));
        assert_eq!(posts["add"]["data"]["title"]["required"], json!(true));
    }

    #[test]
    fn test_parse_errors_are_invalid_source() {
        assert!(matches!(
            RuleSource::from_json("{").unwrap_err(),
            RuleError::InvalidSource { .. }
        ));
        assert!(matches!(
            RuleSource::from_yaml(": : :").unwrap_err(),
            RuleError::InvalidSource { .. }
        ));
    }

    #[test]
    fn test_permission_config_shapes() {
        let config = PermissionConfig::from_value(&json!(true)).unwrap();
        assert_eq!(config, PermissionConfig::Flag(true));

        let config = PermissionConfig::from_value(&json!("$admin")).unwrap();
        assert_eq!(config, PermissionConfig::Expr("$admin".to_string()));

        let config = PermissionConfig::from_value(&json!({"condition": true})).unwrap();
        assert!(matches!(config, PermissionConfig::Variant(_)));

        let config =
            PermissionConfig::from_value(&json!([{"condition": true}, {"data": {}}])).unwrap();
        assert!(matches!(config, PermissionConfig::Variants(ref v) if v.len() == 2));

        assert!(PermissionConfig::from_value(&json!(42)).is_err());
        assert!(PermissionConfig::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_shorthand_normalization() {
        let variants = PermissionConfig::Flag(false).into_variants();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0]["condition"], json!(false));

        let variants = PermissionConfig::Expr("$userid == 1".to_string()).into_variants();
        assert_eq!(variants[0]["condition"], json!("$userid == 1"));
    }
}
