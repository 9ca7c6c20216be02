//! Integration tests for the HTTP API.
//!
//! Requests go through the full router with `oneshot`; real-time pushes are
//! observed by subscribing directly on the shared broadcaster.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use namecast::{
    build_router, AppState, BroadcastConfig, Broadcaster, DispatcherHandle, Record, RecordStore,
    Store, StoreError, SubscriberHandle,
};

// --- Fixtures ---

struct TestApp {
    state: AppState,
    _dispatcher: DispatcherHandle,
}

impl TestApp {
    fn new() -> Self {
        Self::with_store(Arc::new(Store::in_memory().unwrap()))
    }

    fn with_store(store: Arc<dyn RecordStore>) -> Self {
        let (broadcaster, dispatcher) = Broadcaster::start(&BroadcastConfig::default()).unwrap();
        Self {
            state: AppState::new(store, broadcaster),
            _dispatcher: dispatcher,
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn subscribe(&self) -> SubscriberHandle {
        self.state.broadcaster().subscribe()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn add(&self, name: &str) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, "/api/hello", json!({ "name": name })))
            .await
    }

    async fn list(&self) -> Vec<Record> {
        let (status, body) = self.send(empty_request(Method::GET, "/api/all")).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }
}

/// Persistence that always fails.
struct BrokenStore;

fn broken() -> StoreError {
    StoreError::Io(std::io::Error::other("disk unavailable"))
}

impl RecordStore for BrokenStore {
    fn insert(&self, _name: &str) -> namecast::Result<Record> {
        Err(broken())
    }
    fn list(&self) -> namecast::Result<Vec<Record>> {
        Err(broken())
    }
    fn rename(&self, _old: &str, _new: &str) -> namecast::Result<usize> {
        Err(broken())
    }
    fn clear(&self) -> namecast::Result<usize> {
        Err(broken())
    }
}

/// Writes succeed, every read fails.
struct WriteOnlyStore(Store);

impl RecordStore for WriteOnlyStore {
    fn insert(&self, name: &str) -> namecast::Result<Record> {
        self.0.insert(name)
    }
    fn list(&self) -> namecast::Result<Vec<Record>> {
        Err(broken())
    }
    fn rename(&self, old: &str, new: &str) -> namecast::Result<usize> {
        self.0.rename(old, new)
    }
    fn clear(&self) -> namecast::Result<usize> {
        self.0.clear()
    }
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn raw_request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

async fn next_push(handle: &mut SubscriberHandle) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), handle.recv())
        .await
        .expect("no push within 2s")
        .expect("subscriber dropped");
    serde_json::from_str(frame.as_str()).unwrap()
}

async fn assert_no_push(handle: &mut SubscriberHandle) {
    let result = tokio::time::timeout(Duration::from_millis(100), handle.recv()).await;
    assert!(result.is_err(), "unexpected push: {:?}", result);
}

// --- Greeting ---

#[tokio::test]
async fn test_message_returns_greeting() {
    let app = TestApp::new();

    let (status, body) = app.send(empty_request(Method::GET, "/api/message")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "text": namecast::api::DEFAULT_GREETING }));
}

#[tokio::test]
async fn test_custom_greeting() {
    let app = TestApp::new();
    let router = build_router(app.state.clone().with_greeting("hello"));

    let response = router
        .oneshot(empty_request(Method::GET, "/api/message"))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["text"], "hello");
}

#[tokio::test]
async fn test_message_wrong_method() {
    let app = TestApp::new();

    let (status, body) = app.send(empty_request(Method::POST, "/api/message")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["message"], "Method not allowed");
}

// --- Add / List ---

#[tokio::test]
async fn test_add_then_list() {
    let app = TestApp::new();

    let (status, body) = app.add("Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Name saved successfully" }));

    let records = app.list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.0, 1);
    assert_eq!(records[0].name, "Ada");
    assert!(!records[0].created_at.is_empty());
}

#[tokio::test]
async fn test_list_empty_is_array() {
    let app = TestApp::new();

    let (status, body) = app.send(empty_request(Method::GET, "/api/all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_row_shape() {
    let app = TestApp::new();
    app.add("Ada").await;

    let (_, body) = app.send(empty_request(Method::GET, "/api/all")).await;
    let row = body[0].as_object().unwrap();
    let mut keys: Vec<_> = row.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["created_at", "id", "name"]);
}

#[tokio::test]
async fn test_add_accepts_any_content_type() {
    let app = TestApp::new();

    let (status, _) = app
        .send(raw_request(Method::POST, "/api/hello", r#"{"name":"Ada"}"#))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.list().await.len(), 1);
}

#[tokio::test]
async fn test_add_invalid_body() {
    let app = TestApp::new();
    let mut sub = app.subscribe();

    for body in ["not json", "", "{}", r#"{"name": 42}"#] {
        let (status, response) = app.send(raw_request(Method::POST, "/api/hello", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(response["message"], "Invalid request body");
    }

    assert!(app.list().await.is_empty());
    assert_no_push(&mut sub).await;
}

#[tokio::test]
async fn test_add_wrong_method() {
    let app = TestApp::new();

    let (status, _) = app.send(empty_request(Method::GET, "/api/hello")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// --- Update ---

#[tokio::test]
async fn test_update_on_empty_store_is_not_found() {
    let app = TestApp::new();
    let mut sub = app.subscribe();

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/update",
            json!({ "oldName": "Ada", "newName": "Grace" }),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Name not found");
    assert_no_push(&mut sub).await;
}

#[tokio::test]
async fn test_update_missing_name_leaves_store_unchanged() {
    let app = TestApp::new();
    app.add("Ada").await;
    let before = app.list().await;

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/update",
            json!({ "oldName": "Nobody", "newName": "Grace" }),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.list().await, before);
}

#[tokio::test]
async fn test_update_renames_every_match() {
    let app = TestApp::new();
    app.add("Ada").await;
    app.add("Alan").await;
    app.add("Ada").await;

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/update",
            json!({ "oldName": "Ada", "newName": "Grace" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Name updated successfully" }));

    let names: Vec<_> = app.list().await.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Grace", "Alan", "Grace"]);
}

#[tokio::test]
async fn test_update_invalid_body() {
    let app = TestApp::new();

    let (status, _) = app
        .send(json_request(Method::PUT, "/api/update", json!({ "oldName": "Ada" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_wrong_method() {
    let app = TestApp::new();

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/update",
            json!({ "oldName": "Ada", "newName": "Grace" }),
        ))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// --- Delete ---

#[tokio::test]
async fn test_delete_then_list_is_empty() {
    let app = TestApp::new();
    app.add("Ada").await;
    app.add("Grace").await;

    let (status, body) = app.send(empty_request(Method::DELETE, "/api/delete")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "All names deleted" }));

    assert!(app.list().await.is_empty());
}

#[tokio::test]
async fn test_delete_wrong_method() {
    let app = TestApp::new();
    app.add("Ada").await;

    let (status, _) = app.send(empty_request(Method::GET, "/api/delete")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.list().await.len(), 1);
}

// --- Broadcast After Mutation ---

#[tokio::test]
async fn test_each_mutation_pushes_full_list_once() {
    let app = TestApp::new();
    let mut first = app.subscribe();
    let mut second = app.subscribe();

    app.add("Ada").await;
    for sub in [&mut first, &mut second] {
        let push = next_push(sub).await;
        assert_eq!(push.as_array().unwrap().len(), 1);
        assert_eq!(push[0]["name"], "Ada");
        assert_eq!(push[0]["id"], 1);
    }

    app.send(json_request(
        Method::PUT,
        "/api/update",
        json!({ "oldName": "Ada", "newName": "Grace" }),
    ))
    .await;
    for sub in [&mut first, &mut second] {
        let push = next_push(sub).await;
        assert_eq!(push[0]["name"], "Grace");
    }

    app.send(empty_request(Method::DELETE, "/api/delete")).await;
    for sub in [&mut first, &mut second] {
        assert_eq!(next_push(sub).await, json!([]));
        assert_no_push(sub).await;
    }
}

#[tokio::test]
async fn test_push_matches_list() {
    let app = TestApp::new();
    let mut sub = app.subscribe();

    app.add("Ada").await;
    let push = next_push(&mut sub).await;

    let (_, listed) = app.send(empty_request(Method::GET, "/api/all")).await;
    assert_eq!(push, listed);
}

#[tokio::test]
async fn test_reads_do_not_push() {
    let app = TestApp::new();
    let mut sub = app.subscribe();

    app.send(empty_request(Method::GET, "/api/all")).await;
    app.send(empty_request(Method::GET, "/api/message")).await;

    assert_no_push(&mut sub).await;
}

// --- Store Failures ---

#[tokio::test]
async fn test_store_failure_is_500() {
    let app = TestApp::with_store(Arc::new(BrokenStore));
    let mut sub = app.subscribe();

    let (status, body) = app.add("Ada").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Database error");

    let (status, _) = app.send(empty_request(Method::GET, "/api/all")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/update",
            json!({ "oldName": "Ada", "newName": "Grace" }),
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = app.send(empty_request(Method::DELETE, "/api/delete")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert_no_push(&mut sub).await;
}

#[tokio::test]
async fn test_failed_read_back_still_succeeds_without_push() {
    let app = TestApp::with_store(Arc::new(WriteOnlyStore(Store::in_memory().unwrap())));
    let mut sub = app.subscribe();

    let (status, body) = app.add("Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Name saved successfully");

    assert_no_push(&mut sub).await;
    assert_eq!(app.state.broadcaster().stats().snapshots_published, 0);
}

// --- CORS / Routing ---

#[tokio::test]
async fn test_preflight_has_no_body() {
    let app = TestApp::new();

    for uri in ["/api/hello", "/api/update", "/api/delete", "/api/all", "/api/message"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "uri {}", uri);

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
            assert!(methods.contains(method), "{} missing from {}", method, methods);
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn test_simple_request_carries_cors_header() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/all")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
}

#[tokio::test]
async fn test_unknown_api_route() {
    let app = TestApp::new();

    let (status, body) = app.send(empty_request(Method::GET, "/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_reports_subscribers() {
    let app = TestApp::new();
    let _sub = app.subscribe();
    app.add("Ada").await;

    let (status, body) = app.send(empty_request(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["subscribers"], 1);
    assert_eq!(body["snapshots_published"], 1);
}

#[tokio::test]
async fn test_oversized_body_is_invalid_request() {
    let app = TestApp::new();
    let mut sub = app.subscribe();

    let name = "a".repeat(3 * 1024 * 1024);
    let (status, body) = app.add(&name).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");
    assert!(app.list().await.is_empty());
    assert_no_push(&mut sub).await;
}

// --- Concurrent Writers ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_publish_in_order() {
    const WRITERS: usize = 16;

    let app = TestApp::new();
    let mut first = app.subscribe();
    let mut second = app.subscribe();

    let writers: Vec<_> = (0..WRITERS)
        .map(|i| {
            let router = app.router();
            tokio::spawn(async move {
                let request = json_request(
                    Method::POST,
                    "/api/hello",
                    json!({ "name": format!("writer-{}", i) }),
                );
                router.oneshot(request).await.unwrap().status()
            })
        })
        .collect();

    for writer in writers {
        assert_eq!(writer.await.unwrap(), StatusCode::OK);
    }

    let (_, listed) = app.send(empty_request(Method::GET, "/api/all")).await;

    for sub in [&mut first, &mut second] {
        let mut frames = Vec::new();
        while frames.len() < WRITERS {
            frames.push(next_push(sub).await);
        }

        // One frame per write, each one row longer than the last
        let sizes: Vec<_> = frames.iter().map(|f| f.as_array().unwrap().len()).collect();
        assert_eq!(sizes, (1..=WRITERS).collect::<Vec<_>>());
        assert_eq!(frames.last(), Some(&listed));
        assert_no_push(sub).await;
    }
}

#[tokio::test]
async fn test_slow_subscriber_keeps_latest_snapshot() {
    const WRITES: usize = 40;

    let app = TestApp::new();
    let mut slow = app.subscribe();

    for i in 0..WRITES {
        let (status, _) = app.add(&format!("name-{}", i)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let broadcaster = app.state.broadcaster();
    tokio::time::timeout(Duration::from_secs(2), async {
        while broadcaster.stats().snapshots_dispatched < WRITES as u64 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // More writes than the outbox holds, yet still connected
    assert!(broadcaster.registry().contains(slow.id));
    assert_eq!(broadcaster.stats().subscribers_dropped, 0);

    let mut latest = None;
    while let Ok(frame) = slow.try_recv() {
        latest = Some(frame);
    }
    let latest: Value = serde_json::from_str(latest.unwrap().as_str()).unwrap();
    assert_eq!(latest.as_array().unwrap().len(), WRITES);
    assert!(slow.skipped() > 0);

    app.add("late").await;
    let push = next_push(&mut slow).await;
    assert_eq!(push.as_array().unwrap().len(), WRITES + 1);
}
