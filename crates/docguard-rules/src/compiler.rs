//! Rule compilation.
//!
//! Turns a raw rule tree into the immutable permission table the matcher
//! walks. Compilation validates everything the rule language can get wrong
//! (unknown validators, unknown field rules, malformed shapes) so request
//! time never sees a malformed rule, and materializes a processor for
//! **every** registered validator in every variant; validators the author
//! did not mention carry no config and no-op.

use std::collections::HashMap;

use serde_json::Value;

use docguard_core::JsonMap;

use crate::error::{Result, RuleError};
use crate::registry::ValidatorRegistry;
use crate::source::{CollectionSource, PermissionConfig, RuleSource};
use crate::validators::Processor;

/// Key under which `$schema` pseudo-permissions compile.
pub const SCHEMA_PERMISSION: &str = "$schema";

/// One compiled rule variant: a processor per registered validator, in
/// registration order.
#[derive(Debug, Clone)]
pub struct CompiledVariant {
    processors: Vec<Processor>,
}

impl CompiledVariant {
    /// The processors of this variant, in evaluation order.
    #[must_use]
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }
}

/// All compiled permissions of one collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionPermissions {
    permissions: HashMap<String, Vec<CompiledVariant>>,
}

impl CollectionPermissions {
    /// The ordered variants compiled under `permission`, if any.
    #[must_use]
    pub fn variants(&self, permission: &str) -> Option<&[CompiledVariant]> {
        self.permissions.get(permission).map(Vec::as_slice)
    }

    /// Permission names with compiled rules.
    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.permissions.keys().map(String::as_str)
    }
}

/// The compiled, immutable form of a rule set.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    collections: HashMap<String, CollectionPermissions>,
}

impl PermissionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled permissions of `collection`, if present.
    #[must_use]
    pub fn collection(&self, collection: &str) -> Option<&CollectionPermissions> {
        self.collections.get(collection)
    }

    /// Returns `true` if `collection` has compiled rules.
    #[must_use]
    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    /// Names of all compiled collections.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Replace (or insert) one collection's compiled permissions.
    pub(crate) fn set(&mut self, collection: String, permissions: CollectionPermissions) {
        self.collections.insert(collection, permissions);
    }
}

/// Compile a whole rule source into a fresh permission table.
pub fn compile_source(source: &RuleSource, registry: &ValidatorRegistry) -> Result<PermissionTable> {
    let mut table = PermissionTable::new();
    for (collection, rules) in &source.0 {
        let compiled = compile_collection(collection, rules, registry)?;
        table.set(collection.clone(), compiled);
    }
    Ok(table)
}

/// Compile the raw rules of one collection.
pub fn compile_collection(
    collection: &str,
    rules: &CollectionSource,
    registry: &ValidatorRegistry,
) -> Result<CollectionPermissions> {
    let mut permissions = HashMap::with_capacity(rules.len());
    for (permission, config) in rules {
        let variants = if permission == SCHEMA_PERMISSION {
            // $schema compiles as if it were {data: <source>}.
            let mut variant = JsonMap::new();
            variant.insert("data".to_string(), config.clone());
            vec![compile_variant(collection, permission, &variant, registry)?]
        } else {
            compile_permission(collection, permission, config, registry)?
        };
        permissions.insert(permission.clone(), variants);
    }
    Ok(CollectionPermissions { permissions })
}

fn compile_permission(
    collection: &str,
    permission: &str,
    config: &Value,
    registry: &ValidatorRegistry,
) -> Result<Vec<CompiledVariant>> {
    PermissionConfig::from_value(config)?
        .into_variants()
        .iter()
        .map(|variant| compile_variant(collection, permission, variant, registry))
        .collect()
}

fn compile_variant(
    collection: &str,
    permission: &str,
    variant: &JsonMap,
    registry: &ValidatorRegistry,
) -> Result<CompiledVariant> {
    for name in variant.keys() {
        if !registry.contains(name) {
            return Err(RuleError::unknown_validator(collection, permission, name));
        }
    }

    let mut processors = Vec::with_capacity(registry.len());
    for name in registry.names() {
        processors.push(registry.materialize(name, variant.get(name))?);
    }
    Ok(CompiledVariant { processors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(value: Value) -> RuleSource {
        RuleSource::from_value(value).unwrap()
    }

    #[test]
    fn test_compile_materializes_every_registered_validator() {
        let registry = ValidatorRegistry::new();
        let table = compile_source(
            &source(json!({"categories": {"update": {"condition": true}}})),
            &registry,
        )
        .unwrap();

        let variants = table
            .collection("categories")
            .unwrap()
            .variants("update")
            .unwrap();
        assert_eq!(variants.len(), 1);

        let names: Vec<_> = variants[0].processors().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["condition", "data", "query", "multi"]);
        assert!(variants[0].processors()[0].is_configured());
        assert!(!variants[0].processors()[1].is_configured());
    }

    #[test]
    fn test_boolean_and_string_shorthand() {
        let registry = ValidatorRegistry::new();
        let table = compile_source(
            &source(json!({"posts": {"read": true, "remove": "$admin"}})),
            &registry,
        )
        .unwrap();

        let posts = table.collection("posts").unwrap();
        assert_eq!(posts.variants("read").unwrap().len(), 1);
        assert!(posts.variants("read").unwrap()[0].processors()[0].is_configured());
        assert_eq!(posts.variants("remove").unwrap().len(), 1);
    }

    #[test]
    fn test_variant_sequences_keep_order() {
        let registry = ValidatorRegistry::new();
        let table = compile_source(
            &source(json!({"posts": {"update": [
                {"condition": "$admin"},
                {"data": {"author_id": "$userid == $value"}}
            ]}})),
            &registry,
        )
        .unwrap();

        let variants = table.collection("posts").unwrap().variants("update").unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants[0].processors()[0].is_configured());
        assert!(!variants[0].processors()[1].is_configured());
        assert!(!variants[1].processors()[0].is_configured());
        assert!(variants[1].processors()[1].is_configured());
    }

    #[test]
    fn test_unknown_validator_is_fatal() {
        let registry = ValidatorRegistry::new();
        let err = compile_source(
            &source(json!({"posts": {"update": {"sanitize": true}}})),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnknownValidator { ref name, .. } if name == "sanitize"
        ));
    }

    #[test]
    fn test_unknown_field_rule_is_fatal() {
        let registry = ValidatorRegistry::new();
        let err = compile_source(
            &source(json!({"posts": {"add": {"data": {"title": {"maxlen": 10}}}}})),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::UnknownRule { .. }));
    }

    #[test]
    fn test_schema_compiles_as_data_rules() {
        let registry = ValidatorRegistry::new();
        let table = compile_source(
            &source(json!({"posts": {"$schema": {"title": {"required": true}}}})),
            &registry,
        )
        .unwrap();

        let variants = table
            .collection("posts")
            .unwrap()
            .variants(SCHEMA_PERMISSION)
            .unwrap();
        assert_eq!(variants.len(), 1);
        // The schema source lands in the data slot.
        assert!(!variants[0].processors()[0].is_configured());
        assert!(variants[0].processors()[1].is_configured());
    }

    #[test]
    fn test_malformed_permission_config_is_fatal() {
        let registry = ValidatorRegistry::new();
        let err = compile_source(&source(json!({"posts": {"read": 42}})), &registry).unwrap_err();
        assert!(matches!(err, RuleError::InvalidShape { .. }));
    }
}
