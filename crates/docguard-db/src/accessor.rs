//! The `DataAccessor` trait and its option/outcome types.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use docguard_core::{JsonMap, SortSpec};

use crate::error::Result;

/// Options applied to a read.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Sort order, applied in sequence (first spec is most significant).
    pub order: Vec<SortSpec>,
    /// Number of matching documents to skip.
    pub offset: u64,
    /// Maximum number of documents to return; 0 means unbounded.
    pub limit: u64,
    /// Field projection: field name to 0 (exclude) or 1 (include).
    pub projection: Option<HashMap<String, u8>>,
}

/// Options applied to an update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Update every matching document rather than the first.
    pub multi: bool,
    /// Insert a document when nothing matches.
    pub upsert: bool,
    /// Merge with operators instead of replacing the document.
    pub merge: bool,
}

/// Result of an update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Number of documents the query matched.
    pub matched: u64,
    /// Number of documents actually modified.
    pub modified: u64,
    /// Id of the document inserted by an upsert, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Value>,
}

/// The kind of change observed by a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

/// A single change delivered to watch subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection the change occurred in.
    pub collection: String,
    /// What happened to the document.
    pub kind: ChangeKind,
    /// The document after the change; `None` for removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    /// The `_id` of the affected document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Value>,
}

impl ChangeEvent {
    /// Create a "document created" event.
    pub fn created(collection: impl Into<String>, document: Value) -> Self {
        let document_id = document.get("_id").cloned();
        Self {
            collection: collection.into(),
            kind: ChangeKind::Created,
            document: Some(document),
            document_id,
        }
    }

    /// Create a "document updated" event.
    pub fn updated(collection: impl Into<String>, document: Value) -> Self {
        let document_id = document.get("_id").cloned();
        Self {
            collection: collection.into(),
            kind: ChangeKind::Updated,
            document: Some(document),
            document_id,
        }
    }

    /// Create a "document removed" event.
    pub fn removed(collection: impl Into<String>, document_id: Option<Value>) -> Self {
        Self {
            collection: collection.into(),
            kind: ChangeKind::Removed,
            document: None,
            document_id,
        }
    }
}

/// The document-database surface consumed by the gateway.
///
/// [`get`](DataAccessor::get) is the single method the rule engine couples
/// to; everything else is driven only by the entry facade.
#[async_trait]
pub trait DataAccessor: Send + Sync {
    /// Fetch a single document matching `query`, or `None`.
    async fn get(&self, collection: &str, query: &JsonMap) -> Result<Option<Value>>;

    /// Insert `data` (a document, or a sequence of documents) and return the
    /// inserted documents with their assigned ids.
    async fn add(&self, collection: &str, data: &Value) -> Result<Vec<Value>>;

    /// Read documents matching `query`, honoring `options`.
    async fn read(
        &self,
        collection: &str,
        query: &JsonMap,
        options: &FindOptions,
    ) -> Result<Vec<Value>>;

    /// Update documents matching `query` with `data`.
    async fn update(
        &self,
        collection: &str,
        query: &JsonMap,
        data: &Value,
        options: &UpdateOptions,
    ) -> Result<UpdateOutcome>;

    /// Remove documents matching `query`; the first match only unless
    /// `multi`. Returns the number of removed documents.
    async fn remove(&self, collection: &str, query: &JsonMap, multi: bool) -> Result<u64>;

    /// Count documents matching `query`.
    async fn count(&self, collection: &str, query: &JsonMap) -> Result<u64>;

    /// Subscribe to changes in `collection`.
    fn watch(&self, collection: &str) -> Result<broadcast::Receiver<ChangeEvent>>;
}

/// Type alias for a shareable accessor instance
pub type DynAccessor = Arc<dyn DataAccessor>;
