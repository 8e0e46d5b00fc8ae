//! The in-memory accessor.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use docguard_core::{JsonMap, SortDirection};
use docguard_db::{
    AccessorError, ChangeEvent, DataAccessor, FindOptions, Result, UpdateOptions, UpdateOutcome,
};

use crate::query;

/// Buffer size for per-collection watch channels.
const CHANNEL_CAPACITY: usize = 256;

/// In-memory document store implementing the accessor port.
///
/// Collections are created lazily on first write. Cloning documents on the
/// way in and out keeps callers from aliasing stored state.
#[derive(Default)]
pub struct MemoryAccessor {
    collections: DashMap<String, Vec<Value>>,
    channels: DashMap<String, broadcast::Sender<ChangeEvent>>,
}

impl MemoryAccessor {
    /// Create an empty accessor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `docs` into `collection` directly, assigning ids where absent.
    ///
    /// Intended for test fixtures; no change events are published.
    pub fn seed(&self, collection: impl Into<String>, docs: Vec<Value>) {
        let mut docs = docs;
        for doc in &mut docs {
            Self::ensure_id(doc);
        }
        self.collections.entry(collection.into()).or_default().extend(docs);
    }

    /// Number of documents currently stored in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    /// Returns `true` if `collection` holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn ensure_id(doc: &mut Value) {
        if let Some(map) = doc.as_object_mut()
            && !map.contains_key("_id")
        {
            map.insert("_id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }

    fn publish(&self, collection: &str, event: ChangeEvent) {
        if let Some(sender) = self.channels.get(collection) {
            // No subscribers is not an error
            let _ = sender.send(event);
        }
    }

    fn project(doc: &Value, projection: &HashMap<String, u8>) -> Value {
        let Some(map) = doc.as_object() else {
            return doc.clone();
        };
        let include = projection.values().any(|v| *v == 1);
        let mut out = JsonMap::new();
        if include {
            for (field, flag) in projection {
                if *flag == 1
                    && let Some(value) = map.get(field)
                {
                    out.insert(field.clone(), value.clone());
                }
            }
            if projection.get("_id") != Some(&0)
                && let Some(id) = map.get("_id")
            {
                out.insert("_id".to_string(), id.clone());
            }
        } else {
            for (field, value) in map {
                if projection.get(field) != Some(&0) {
                    out.insert(field.clone(), value.clone());
                }
            }
        }
        Value::Object(out)
    }

    fn sort(docs: &mut [Value], order: &[docguard_core::SortSpec]) {
        docs.sort_by(|a, b| {
            for spec in order {
                let left = query::get_path(a, &spec.field);
                let right = query::get_path(b, &spec.field);
                let ordering = match (left, right) {
                    (Some(l), Some(r)) => {
                        query::compare(l, r).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                let ordering = match spec.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    /// Build the base document an upsert inserts: the equality fields of the
    /// query, with operator conditions skipped.
    fn upsert_base(query_doc: &JsonMap) -> Value {
        let mut base = JsonMap::new();
        for (key, value) in query_doc {
            if key.starts_with('$') {
                continue;
            }
            let is_operator_cond = value
                .as_object()
                .is_some_and(|m| m.keys().any(|k| k.starts_with('$')));
            if !is_operator_cond {
                base.insert(key.clone(), value.clone());
            }
        }
        Value::Object(base)
    }

    fn apply_update_to(doc: &mut Value, data: &JsonMap) {
        if query::has_update_operator(data) {
            query::apply_operators(doc, data);
        } else {
            // Replacement keeps the identity of the stored document.
            let id = doc.get("_id").cloned();
            *doc = Value::Object(data.clone());
            if let (Some(id), Some(map)) = (id, doc.as_object_mut()) {
                map.insert("_id".to_string(), id);
            }
        }
    }
}

#[async_trait]
impl DataAccessor for MemoryAccessor {
    async fn get(&self, collection: &str, query_doc: &JsonMap) -> Result<Option<Value>> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.iter().find(|doc| query::matches(doc, query_doc)).cloned()
        }))
    }

    async fn add(&self, collection: &str, data: &Value) -> Result<Vec<Value>> {
        let mut incoming = match data {
            Value::Object(_) => vec![data.clone()],
            Value::Array(items) => {
                if items.iter().any(|item| !item.is_object()) {
                    return Err(AccessorError::invalid_data(
                        "multi insert requires a sequence of documents",
                    ));
                }
                items.clone()
            }
            _ => {
                return Err(AccessorError::invalid_data("data must be a document"));
            }
        };

        for doc in &mut incoming {
            Self::ensure_id(doc);
        }

        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(incoming.iter().cloned());

        tracing::debug!(collection = %collection, count = incoming.len(), "inserted documents");
        for doc in &incoming {
            self.publish(collection, ChangeEvent::created(collection, doc.clone()));
        }
        Ok(incoming)
    }

    async fn read(
        &self,
        collection: &str,
        query_doc: &JsonMap,
        options: &FindOptions,
    ) -> Result<Vec<Value>> {
        let mut found: Vec<Value> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query::matches(doc, query_doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !options.order.is_empty() {
            Self::sort(&mut found, &options.order);
        }

        let offset = options.offset.min(found.len() as u64) as usize;
        let mut found = found.split_off(offset);
        if options.limit > 0 {
            found.truncate(options.limit as usize);
        }

        if let Some(projection) = &options.projection {
            found = found.iter().map(|doc| Self::project(doc, projection)).collect();
        }
        Ok(found)
    }

    async fn update(
        &self,
        collection: &str,
        query_doc: &JsonMap,
        data: &Value,
        options: &UpdateOptions,
    ) -> Result<UpdateOutcome> {
        let Some(data_map) = data.as_object() else {
            return Err(AccessorError::invalid_data("update data must be a document"));
        };

        let mut updated_docs = Vec::new();
        let mut matched = 0;
        let mut modified = 0;

        if let Some(mut docs) = self.collections.get_mut(collection) {
            for doc in docs.iter_mut() {
                if !query::matches(doc, query_doc) {
                    continue;
                }
                matched += 1;
                let before = doc.clone();
                Self::apply_update_to(doc, data_map);
                if *doc != before {
                    modified += 1;
                    updated_docs.push(doc.clone());
                }
                if !options.multi {
                    break;
                }
            }
        }

        if matched == 0 && options.upsert {
            let mut doc = Self::upsert_base(query_doc);
            Self::apply_update_to(&mut doc, data_map);
            Self::ensure_id(&mut doc);
            let upserted_id = doc.get("_id").cloned();
            self.collections
                .entry(collection.to_string())
                .or_default()
                .push(doc.clone());
            self.publish(collection, ChangeEvent::created(collection, doc));
            return Ok(UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted_id,
            });
        }

        for doc in updated_docs {
            self.publish(collection, ChangeEvent::updated(collection, doc));
        }
        Ok(UpdateOutcome {
            matched,
            modified,
            upserted_id: None,
        })
    }

    async fn remove(&self, collection: &str, query_doc: &JsonMap, multi: bool) -> Result<u64> {
        let mut removed = Vec::new();
        if let Some(mut docs) = self.collections.get_mut(collection) {
            let mut index = 0;
            while index < docs.len() {
                if query::matches(&docs[index], query_doc) {
                    removed.push(docs.remove(index));
                    if !multi {
                        break;
                    }
                } else {
                    index += 1;
                }
            }
        }

        tracing::debug!(collection = %collection, count = removed.len(), "removed documents");
        for doc in &removed {
            self.publish(
                collection,
                ChangeEvent::removed(collection, doc.get("_id").cloned()),
            );
        }
        Ok(removed.len() as u64)
    }

    async fn count(&self, collection: &str, query_doc: &JsonMap) -> Result<u64> {
        Ok(self.collections.get(collection).map_or(0, |docs| {
            docs.iter().filter(|doc| query::matches(doc, query_doc)).count() as u64
        }))
    }

    fn watch(&self, collection: &str) -> Result<broadcast::Receiver<ChangeEvent>> {
        let sender = self
            .channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }
}
