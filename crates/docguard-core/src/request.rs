//! The uniform data-request model.
//!
//! Every caller-facing operation arrives as a [`DataRequest`]: a collection
//! name, a raw action token, and optional payload fields. Only `collection`
//! and `action` are required; everything else defaults to its absent form so
//! requests deserialize from minimal JSON bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;

/// A JSON object, the payload shape shared by queries, documents and rules.
pub type JsonMap = serde_json::Map<String, Value>;

/// Per-request bindings exposed to the expression sandbox.
///
/// Keys conventionally start with `$` (e.g. `$userid`), but the prefix is
/// opaque to the engine.
pub type Injections = HashMap<String, Value>;

/// Sort direction tokens, matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

/// One entry of a request's `order` sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A uniform data request as submitted by an untrusted caller.
///
/// `query` and `data` are kept as raw [`Value`]s rather than objects: the
/// rule engine's validators report shape problems (`query must be an
/// object`, ...) as non-matches instead of rejecting the request at the
/// parsing boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Target collection name.
    pub collection: String,

    /// Raw action token (e.g. `database.queryDocument`).
    pub action: String,

    /// Selection criteria for read/update/remove/count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    /// Document payload: a mapping, or a sequence of mappings for multi
    /// insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Sort order applied to reads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<SortSpec>,

    /// Number of documents to skip.
    #[serde(default)]
    pub offset: u64,

    /// Maximum number of documents to return; 0 selects the engine default.
    #[serde(default)]
    pub limit: u64,

    /// Field projection: field name to 0 (exclude) or 1 (include).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<HashMap<String, u8>>,

    /// Whether the request may affect more than one document.
    #[serde(default)]
    pub multi: bool,

    /// Insert when an update matches nothing.
    #[serde(default)]
    pub upsert: bool,

    /// Update merges with operators instead of replacing the document.
    #[serde(default)]
    pub merge: bool,

    /// Opaque correlation id supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl DataRequest {
    /// Create a minimal request for `action` against `collection`.
    pub fn new(collection: impl Into<String>, action: Action) -> Self {
        Self {
            collection: collection.into(),
            action: action.token().to_string(),
            query: None,
            data: None,
            order: Vec::new(),
            offset: 0,
            limit: 0,
            projection: None,
            multi: false,
            upsert: false,
            merge: false,
            request_id: None,
        }
    }

    /// Set the query document.
    #[must_use]
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Set the data payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the `multi` flag.
    #[must_use]
    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Set the `merge` flag.
    #[must_use]
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Set the `upsert` flag.
    #[must_use]
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// The query as an object, if it is one.
    #[must_use]
    pub fn query_object(&self) -> Option<&JsonMap> {
        self.query.as_ref().and_then(Value::as_object)
    }

    /// The data payload as an object, if it is one.
    #[must_use]
    pub fn data_object(&self) -> Option<&JsonMap> {
        self.data.as_ref().and_then(Value::as_object)
    }
}
