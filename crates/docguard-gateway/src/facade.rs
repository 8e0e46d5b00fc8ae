//! The gateway facade.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use docguard_core::{Action, DataRequest, Injections, JsonMap};
use docguard_db::{ChangeEvent, DynAccessor, FindOptions, UpdateOptions, UpdateOutcome};
use docguard_rules::{RuleEngine, Validation};

use crate::error::{GatewayError, Result};
use crate::injector::Injector;

/// Read limit applied when a request leaves `limit` at 0.
pub const DEFAULT_READ_LIMIT: u64 = 100;

/// Result of executing a validated request.
pub enum ExecuteOutcome {
    /// Documents returned by a read.
    Documents(Vec<Value>),
    /// Documents inserted by an add, with their assigned ids.
    Inserted(Vec<Value>),
    /// Counters reported by an update.
    Updated(UpdateOutcome),
    /// Number of documents removed.
    Removed(u64),
    /// Number of matching documents.
    Count(u64),
    /// Live change subscription for a watch.
    Changes(broadcast::Receiver<ChangeEvent>),
}

impl ExecuteOutcome {
    /// The documents of a read outcome.
    #[must_use]
    pub fn documents(&self) -> Option<&[Value]> {
        match self {
            Self::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    /// The count of a count outcome.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ExecuteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Documents(docs) => f.debug_tuple("Documents").field(docs).finish(),
            Self::Inserted(docs) => f.debug_tuple("Inserted").field(docs).finish(),
            Self::Updated(outcome) => f.debug_tuple("Updated").field(outcome).finish(),
            Self::Removed(n) => f.debug_tuple("Removed").field(n).finish(),
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Changes(_) => f.debug_tuple("Changes").finish(),
        }
    }
}

/// The programmable guard between untrusted callers and the database.
pub struct Gateway {
    engine: Arc<RuleEngine>,
    accessor: DynAccessor,
    injectors: Vec<Arc<dyn Injector>>,
}

impl Gateway {
    /// Create a gateway over `engine` and `accessor`.
    ///
    /// The engine and the gateway usually share one accessor so that
    /// `exists`/`unique` lookups observe the same data the request will be
    /// executed against.
    #[must_use]
    pub fn new(engine: Arc<RuleEngine>, accessor: DynAccessor) -> Self {
        Self {
            engine,
            accessor,
            injectors: Vec::new(),
        }
    }

    /// Append an injector. Injectors run in registration order; later ones
    /// win on key collisions.
    #[must_use]
    pub fn with_injector(mut self, injector: Arc<dyn Injector>) -> Self {
        self.injectors.push(injector);
        self
    }

    /// The rule engine behind this gateway.
    #[must_use]
    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    /// Resolve the injection map for `request`.
    fn resolve_injections(&self, request: &DataRequest) -> Injections {
        let mut injections = Injections::new();
        for injector in &self.injectors {
            injections.extend(injector.inject(request));
        }
        injections
    }

    /// Validate and execute one request.
    ///
    /// The request is borrowed mutably because validation may write field
    /// defaults into its `data` payload before it reaches the accessor.
    pub async fn execute(&self, request: &mut DataRequest) -> Result<ExecuteOutcome> {
        let injections = self.resolve_injections(request);

        match self.engine.validate(request, &injections).await? {
            Validation::Matched(matched) => {
                tracing::debug!(
                    collection = %request.collection,
                    action = %request.action,
                    variant = matched.variant,
                    "request permitted"
                );
            }
            Validation::Denied(errors) => {
                tracing::debug!(
                    collection = %request.collection,
                    action = %request.action,
                    errors = errors.len(),
                    "request denied"
                );
                return Err(GatewayError::permission_denied(
                    request.collection.clone(),
                    request.action.clone(),
                    errors,
                ));
            }
        }

        // Validation guarantees the token resolves.
        let action = Action::from_token(&request.action)
            .map_err(|e| GatewayError::invalid_request(e.to_string()))?;

        match action {
            Action::Read => {
                let query = self.query_document(request)?;
                let options = FindOptions {
                    order: request.order.clone(),
                    offset: request.offset,
                    limit: if request.limit == 0 {
                        DEFAULT_READ_LIMIT
                    } else {
                        request.limit
                    },
                    projection: request.projection.clone(),
                };
                let docs = self.accessor.read(&request.collection, &query, &options).await?;
                Ok(ExecuteOutcome::Documents(docs))
            }
            Action::Add => {
                let data = request
                    .data
                    .as_ref()
                    .ok_or_else(|| GatewayError::invalid_request("data is required"))?;
                let inserted = self.accessor.add(&request.collection, data).await?;
                Ok(ExecuteOutcome::Inserted(inserted))
            }
            Action::Update => {
                let query = self.query_document(request)?;
                let data = request
                    .data
                    .as_ref()
                    .ok_or_else(|| GatewayError::invalid_request("data is required"))?;
                let options = UpdateOptions {
                    multi: request.multi,
                    upsert: request.upsert,
                    merge: request.merge,
                };
                let outcome = self
                    .accessor
                    .update(&request.collection, &query, data, &options)
                    .await?;
                Ok(ExecuteOutcome::Updated(outcome))
            }
            Action::Remove => {
                let query = self.query_document(request)?;
                let removed = self
                    .accessor
                    .remove(&request.collection, &query, request.multi)
                    .await?;
                Ok(ExecuteOutcome::Removed(removed))
            }
            Action::Count => {
                let query = self.query_document(request)?;
                let count = self.accessor.count(&request.collection, &query).await?;
                Ok(ExecuteOutcome::Count(count))
            }
            Action::Watch => {
                let receiver = self.accessor.watch(&request.collection)?;
                Ok(ExecuteOutcome::Changes(receiver))
            }
        }
    }

    /// The request's query as an object; absent queries select everything.
    fn query_document(&self, request: &DataRequest) -> Result<JsonMap> {
        match &request.query {
            None => Ok(JsonMap::new()),
            Some(query) => query
                .as_object()
                .cloned()
                .ok_or_else(|| GatewayError::invalid_request("query must be an object")),
        }
    }
}
