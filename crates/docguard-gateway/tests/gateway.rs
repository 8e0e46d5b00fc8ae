//! End-to-end tests: rules + injectors + in-memory accessor.

use std::sync::Arc;

use serde_json::{Value, json};

use docguard_core::{Action, DataRequest, Injections};
use docguard_db::{ChangeKind, DataAccessor};
use docguard_db_memory::MemoryAccessor;
use docguard_gateway::{DEFAULT_READ_LIMIT, ExecuteOutcome, FnInjector, Gateway, GatewayError};
use docguard_rules::{ErrorKind, RuleEngine, RuleSource};

fn rules() -> RuleSource {
    RuleSource::from_value(json!({
        "categories": {
            "read": true,
            "add": {"data": {
                "name": {"required": true, "unique": true},
                "status": {"default": "active", "in": ["active", "hidden"]}
            }},
            "remove": "$role == 'admin'"
        },
        "posts": {
            "read": {"query": ["author_id", "status"]},
            "add": {"data": {
                "title": {"required": true, "length": [3, 80]},
                "cate_id": {"exists": "/categories/_id"},
                "author_id": "$userid == $value"
            }},
            "update": [
                {"condition": "$role == 'admin'"},
                {"data": {"author_id": "$userid == $value"}}
            ],
            "count": true,
            "watch": true
        }
    }))
    .unwrap()
}

fn gateway() -> (Gateway, Arc<MemoryAccessor>) {
    let accessor = Arc::new(MemoryAccessor::new());
    accessor.seed(
        "categories",
        vec![json!({"_id": "c1", "name": "rust", "status": "active"})],
    );
    accessor.seed(
        "posts",
        vec![
            json!({"_id": "p1", "title": "Hello", "author_id": 7, "cate_id": "c1", "status": "open"}),
            json!({"_id": "p2", "title": "World", "author_id": 8, "cate_id": "c1", "status": "open"}),
        ],
    );

    let engine = Arc::new(RuleEngine::new(accessor.clone()));
    engine.load(&rules()).unwrap();

    let gateway = Gateway::new(engine, accessor.clone()).with_injector(Arc::new(
        FnInjector::new(|request: &DataRequest| {
            // A transport layer would derive these from the session; tests
            // smuggle them through the request id as "userid:role".
            let mut injections = Injections::new();
            if let Some((userid, role)) = request
                .request_id
                .as_deref()
                .and_then(|id| id.split_once(':'))
            {
                let userid: i64 = userid.parse().unwrap_or(0);
                injections.insert("$userid".to_string(), json!(userid));
                injections.insert("$role".to_string(), json!(role));
            }
            injections
        }),
    ));
    (gateway, accessor)
}

fn as_caller(mut request: DataRequest, userid: i64, role: &str) -> DataRequest {
    request.request_id = Some(format!("{userid}:{role}"));
    request
}

#[tokio::test]
async fn test_read_returns_documents() {
    let (gateway, _) = gateway();
    let mut request =
        DataRequest::new("posts", Action::Read).with_query(json!({"author_id": 7}));

    let outcome = gateway.execute(&mut request).await.unwrap();
    let docs = outcome.documents().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["title"], "Hello");
}

#[tokio::test]
async fn test_read_rejects_unlisted_query_fields() {
    let (gateway, _) = gateway();
    let mut request =
        DataRequest::new("posts", Action::Read).with_query(json!({"secret": 1}));

    let err = gateway.execute(&mut request).await.unwrap_err();
    let errors = err.denial_errors().unwrap();
    assert_eq!(errors[0].kind, ErrorKind::Validator("query".to_string()));
    assert_eq!(errors[0].error, "the field 'secret' is NOT allowed]");
}

#[tokio::test]
async fn test_add_validates_and_applies_defaults() {
    let (gateway, accessor) = gateway();
    let mut request = as_caller(
        DataRequest::new("categories", Action::Add).with_data(json!({"name": "tokio"})),
        7,
        "user",
    );

    let outcome = gateway.execute(&mut request).await.unwrap();
    let ExecuteOutcome::Inserted(docs) = outcome else {
        panic!("expected an insert outcome");
    };
    // The default was written into the stored document.
    assert_eq!(docs[0]["status"], "active");
    assert_eq!(accessor.len("categories"), 2);
}

#[tokio::test]
async fn test_add_enforces_unique() {
    let (gateway, _) = gateway();
    let mut request = DataRequest::new("categories", Action::Add)
        .with_data(json!({"name": "rust"}));

    let err = gateway.execute(&mut request).await.unwrap_err();
    assert_eq!(err.denial_errors().unwrap()[0].error, "name already exists");
}

#[tokio::test]
async fn test_add_enforces_cross_collection_exists() {
    let (gateway, _) = gateway();
    let mut request = as_caller(
        DataRequest::new("posts", Action::Add).with_data(json!({
            "title": "Brand new",
            "cate_id": "missing",
            "author_id": 7
        })),
        7,
        "user",
    );

    let err = gateway.execute(&mut request).await.unwrap_err();
    assert_eq!(err.denial_errors().unwrap()[0].error, "cate_id not exists");
}

#[tokio::test]
async fn test_update_owner_via_injections() {
    let (gateway, accessor) = gateway();

    // Author 7 may update their own post through the second variant.
    let mut request = as_caller(
        DataRequest::new("posts", Action::Update)
            .with_query(json!({"_id": "p1"}))
            .with_data(json!({"author_id": 7, "title": "Hello again"})),
        7,
        "user",
    );
    let outcome = gateway.execute(&mut request).await.unwrap();
    let ExecuteOutcome::Updated(outcome) = outcome else {
        panic!("expected an update outcome");
    };
    assert_eq!(outcome.matched, 1);

    let doc = accessor
        .get("posts", json!({"_id": "p1"}).as_object().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["title"], "Hello again");

    // Author 7 may not touch someone else's post.
    let mut request = as_caller(
        DataRequest::new("posts", Action::Update)
            .with_query(json!({"_id": "p2"}))
            .with_data(json!({"author_id": 8, "title": "Hijacked"})),
        7,
        "user",
    );
    let err = gateway.execute(&mut request).await.unwrap_err();
    assert!(err.is_permission_denied());

    // Admins go through the first variant regardless of ownership.
    let mut request = as_caller(
        DataRequest::new("posts", Action::Update)
            .with_query(json!({"_id": "p2"}))
            .with_data(json!({"status": "closed"})),
        1,
        "admin",
    );
    gateway.execute(&mut request).await.unwrap();
}

#[tokio::test]
async fn test_update_with_merge_operators() {
    let (gateway, accessor) = gateway();
    let mut request = as_caller(
        DataRequest::new("posts", Action::Update)
            .with_query(json!({"_id": "p1"}))
            .with_data(json!({"$set": {"author_id": 7, "status": "closed"}}))
            .with_merge(true),
        7,
        "user",
    );

    gateway.execute(&mut request).await.unwrap();
    let doc = accessor
        .get("posts", json!({"_id": "p1"}).as_object().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["status"], "closed");
    // Merge kept the other fields.
    assert_eq!(doc["title"], "Hello");
}

#[tokio::test]
async fn test_remove_requires_admin_role() {
    let (gateway, accessor) = gateway();

    let mut request = as_caller(
        DataRequest::new("categories", Action::Remove).with_query(json!({"_id": "c1"})),
        7,
        "user",
    );
    let err = gateway.execute(&mut request).await.unwrap_err();
    let errors = err.denial_errors().unwrap();
    assert_eq!(errors[0].kind, ErrorKind::Validator("condition".to_string()));
    assert_eq!(errors[0].error, "condition evaluted to false");

    let mut request = as_caller(
        DataRequest::new("categories", Action::Remove).with_query(json!({"_id": "c1"})),
        1,
        "admin",
    );
    let outcome = gateway.execute(&mut request).await.unwrap();
    let ExecuteOutcome::Removed(removed) = outcome else {
        panic!("expected a remove outcome");
    };
    assert_eq!(removed, 1);
    assert!(accessor.is_empty("categories"));
}

#[tokio::test]
async fn test_count() {
    let (gateway, _) = gateway();
    let mut request =
        DataRequest::new("posts", Action::Count).with_query(json!({"status": "open"}));

    let outcome = gateway.execute(&mut request).await.unwrap();
    assert_eq!(outcome.count(), Some(2));
}

#[tokio::test]
async fn test_watch_delivers_changes() {
    let (gateway, _) = gateway();

    let mut request = DataRequest::new("posts", Action::Watch);
    let outcome = gateway.execute(&mut request).await.unwrap();
    let ExecuteOutcome::Changes(mut receiver) = outcome else {
        panic!("expected a watch outcome");
    };

    // A permitted add shows up on the subscription.
    let mut request = as_caller(
        DataRequest::new("posts", Action::Add).with_data(json!({
            "title": "Streamed",
            "cate_id": "c1",
            "author_id": 7
        })),
        7,
        "user",
    );
    gateway.execute(&mut request).await.unwrap();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Created);
    assert_eq!(event.document.as_ref().unwrap()["title"], "Streamed");
}

#[tokio::test]
async fn test_unknown_collection_is_denied() {
    let (gateway, _) = gateway();
    let mut request = DataRequest::new("ghosts", Action::Read);

    let err = gateway.execute(&mut request).await.unwrap_err();
    let errors = err.denial_errors().unwrap();
    assert_eq!(errors[0].kind, ErrorKind::Structural);
    assert_eq!(errors[0].error, "collection \"ghosts\" not found");
}

#[tokio::test]
async fn test_multi_remove_denied_by_default() {
    let (gateway, _) = gateway();
    let mut request = as_caller(
        DataRequest::new("categories", Action::Remove)
            .with_query(json!({}))
            .with_multi(true),
        1,
        "admin",
    );

    let err = gateway.execute(&mut request).await.unwrap_err();
    assert_eq!(
        err.denial_errors().unwrap()[0].error,
        "multi operation denied"
    );
}

#[tokio::test]
async fn test_read_limit_defaults() {
    let accessor = Arc::new(MemoryAccessor::new());
    let many: Vec<Value> = (0..150).map(|i| json!({"n": i})).collect();
    accessor.seed("posts", many);

    let engine = Arc::new(RuleEngine::new(accessor.clone()));
    engine
        .load(&RuleSource::from_value(json!({"posts": {"read": true}})).unwrap())
        .unwrap();
    let gateway = Gateway::new(engine, accessor);

    // limit 0 selects the engine default.
    let mut request = DataRequest::new("posts", Action::Read);
    let outcome = gateway.execute(&mut request).await.unwrap();
    assert_eq!(outcome.documents().unwrap().len(), DEFAULT_READ_LIMIT as usize);

    // An explicit limit is honored.
    let mut request = DataRequest::new("posts", Action::Read);
    request.limit = 10;
    let outcome = gateway.execute(&mut request).await.unwrap();
    assert_eq!(outcome.documents().unwrap().len(), 10);
}

#[tokio::test]
async fn test_denial_shape_matches_wire_contract() {
    let (gateway, _) = gateway();
    let mut request = DataRequest::new("posts", Action::Add).with_data(json!({}));

    let err = gateway.execute(&mut request).await.unwrap_err();
    let GatewayError::PermissionDenied { errors, .. } = err else {
        panic!("expected a permission denial");
    };
    let wire = serde_json::to_value(&errors).unwrap();
    assert_eq!(wire, json!([{"type": "data", "error": "data is empty"}]));
}
