//! End-to-end tests of the HTTP routes, driven in-process with warp's test client

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use warp::http::StatusCode;

use remoclip::auth::TOKEN_HEADER;
use remoclip::clipboard::{select_backend_with, BackendKind, ClipboardError, PrivateBackend};
use remoclip::server::{routes, ClipboardService, ServiceSettings};
use remoclip::store::{Action, EventFilter, EventStore};

struct TestServer {
    service: Arc<ClipboardService>,
    token: Option<String>,
}

impl TestServer {
    async fn new(settings: ServiceSettings) -> Self {
        let store = Arc::new(EventStore::open_in_memory().await.unwrap());
        Self::with_store(settings, store)
    }

    fn with_store(settings: ServiceSettings, store: Arc<EventStore>) -> Self {
        let token = settings.security_token.clone();
        let service = Arc::new(ClipboardService::new(
            settings,
            store,
            Arc::new(PrivateBackend::default()),
        ));
        Self { service, token }
    }

    fn store(&self) -> &Arc<EventStore> {
        self.service.store()
    }

    async fn call(&self, method: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let token = self.token.as_deref().map(str::as_bytes);
        self.call_with_token(method, path, token, body.to_string())
            .await
    }

    async fn call_with_token(
        &self,
        method: &str,
        path: &str,
        token: Option<&[u8]>,
        body: String,
    ) -> (StatusCode, Value) {
        let mut request = warp::test::request()
            .method(method)
            .path(path)
            .header("content-type", "application/json")
            .body(body);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.reply(&routes(Arc::clone(&self.service))).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), body)
    }

    async fn copy(&self, content: &str) {
        let (status, body) = self
            .call("POST", "/copy", json!({"hostname": "laptop", "content": content}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    async fn history(&self, body: Value) -> Vec<Value> {
        let (status, body) = self.call("GET", "/history", body).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["history"].as_array().unwrap().clone()
    }
}

fn deletions_enabled() -> ServiceSettings {
    ServiceSettings {
        security_token: None,
        allow_deletions: true,
    }
}

#[tokio::test]
async fn test_copy_then_paste() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("multi\nline  ").await;

    let (status, body) = server.call("GET", "/paste", json!({"hostname": "desk"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"content": "multi\nline  "}));
}

#[tokio::test]
async fn test_history_entry_shape() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("hello").await;

    let history = server.history(json!({"hostname": "desk"})).await;
    assert_eq!(history.len(), 1);

    let entry = history[0].as_object().unwrap();
    let mut keys: Vec<&str> = entry.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["action", "content", "hostname", "id", "timestamp"]);
    assert_eq!(entry["action"], "copy");
    assert_eq!(entry["hostname"], "laptop");
    assert!(entry["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_history_never_lists_audit_events() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("a").await;

    for _ in 0..3 {
        let history = server.history(json!({"hostname": "desk"})).await;
        assert!(history.iter().all(|e| e["action"] != "history"));
        assert_eq!(history.len(), 1);
    }

    let all = server.store().query(EventFilter::default()).await.unwrap();
    assert_eq!(
        all.iter().filter(|e| e.action == Action::History).count(),
        3
    );
}

#[tokio::test]
async fn test_limit_returns_newest() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("hello").await;
    server.copy("world").await;

    let history = server
        .history(json!({"hostname": "desk", "limit": 1}))
        .await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], "world");
}

#[tokio::test]
async fn test_copy_history_paste_by_id() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("x").await;
    server.copy("y").await;

    let history = server.history(json!({"hostname": "desk"})).await;
    let x_id = history
        .iter()
        .find(|e| e["content"] == "x")
        .map(|e| e["id"].clone())
        .unwrap();

    let (status, body) = server
        .call("GET", "/paste", json!({"hostname": "desk", "id": x_id}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "x");

    let (_, live) = server.call("GET", "/paste", json!({"hostname": "desk"})).await;
    assert_eq!(live["content"], "y");
}

#[tokio::test]
async fn test_history_event_ids_are_not_found() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("x").await;
    server.history(json!({"hostname": "desk"})).await;

    let audit_id = server.store().query(EventFilter::default()).await.unwrap()[0].id;

    for (method, path) in [("GET", "/paste"), ("GET", "/history")] {
        let (status, body) = server
            .call(method, path, json!({"hostname": "desk", "id": audit_id}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "history entry not found"}));
    }
}

#[tokio::test]
async fn test_delete_disabled_is_forbidden() {
    let server = TestServer::new(ServiceSettings::default()).await;
    server.copy("x").await;

    for body in [json!({"hostname": "desk", "id": 1}), json!({"id": 999}), json!({})] {
        let (status, body) = server.call("DELETE", "/history", body).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "history deletions are disabled"}));
    }
}

#[tokio::test]
async fn test_delete_enabled_succeeds_once() {
    let server = TestServer::new(deletions_enabled()).await;
    server.copy("secret").await;
    let id = server.history(json!({"hostname": "desk"})).await[0]["id"].clone();

    let (status, body) = server
        .call("DELETE", "/history", json!({"hostname": "desk", "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "deleted"}));

    let (status, _) = server
        .call("DELETE", "/history", json!({"hostname": "desk", "id": id}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let history = server.history(json!({"hostname": "desk"})).await;
    assert!(history.iter().all(|e| e["id"] != id));
    assert_eq!(history[0]["action"], "delete");
    assert_eq!(history[0]["content"], "secret");
}

#[tokio::test]
async fn test_delete_rejects_audit_ids_and_bad_input() {
    let server = TestServer::new(deletions_enabled()).await;
    server.history(json!({"hostname": "desk"})).await;
    let audit_id = server.store().query(EventFilter::default()).await.unwrap()[0].id;

    let (status, _) = server
        .call("DELETE", "/history", json!({"hostname": "desk", "id": audit_id}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .call("DELETE", "/history", json!({"hostname": "desk"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "JSON payload must include 'id'"}));
}

#[tokio::test]
async fn test_bad_token_precedes_missing_hostname() {
    let server = TestServer::new(ServiceSettings {
        security_token: Some("s3cret".to_string()),
        allow_deletions: false,
    })
    .await;

    for token in [None, Some(&b"wrong"[..]), Some(&b"s3cret "[..]), Some(&b"\xffbad"[..])] {
        let (status, body) = server
            .call_with_token("POST", "/copy", token, "{}".to_string())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "invalid token"}));
    }

    let (status, body) = server
        .call_with_token("POST", "/copy", Some(&b"s3cret"[..]), "{}".to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "JSON payload must include 'hostname'"}));
}

#[tokio::test]
async fn test_non_ascii_token_authenticates() {
    let server = TestServer::new(ServiceSettings {
        security_token: Some("sécret".to_string()),
        allow_deletions: false,
    })
    .await;

    let (status, body) = server
        .call("POST", "/copy", json!({"hostname": "h", "content": "x"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = server
        .call_with_token("POST", "/copy", Some(&b"s\xe9cret"[..]), "{}".to_string())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "invalid token"}));
}

#[tokio::test]
async fn test_malformed_body_is_missing_hostname() {
    let server = TestServer::new(ServiceSettings::default()).await;

    for body in ["", "not json", "[1,2,3]", "\"text\""] {
        let (status, response) = server
            .call_with_token("GET", "/paste", None, body.to_string())
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({"error": "JSON payload must include 'hostname'"}));
    }
}

#[tokio::test]
async fn test_invalid_integers_are_rejected_before_logging() {
    let server = TestServer::new(ServiceSettings::default()).await;

    let cases = [
        (json!({"hostname": "h", "limit": "ten"}), "limit must be an integer"),
        (json!({"hostname": "h", "limit": 0}), "limit must be positive"),
        (json!({"hostname": "h", "id": -2}), "id must be positive"),
    ];
    for (body, message) in cases {
        let (status, response) = server.call("GET", "/history", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], message);
    }

    assert!(server
        .store()
        .query(EventFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unknown_route_keeps_error_shape() {
    let server = TestServer::new(ServiceSettings::default()).await;

    let (status, body) = server.call("GET", "/clipboard", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "not found"}));

    let (status, body) = server.call("PUT", "/copy", json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "method not allowed"}));
}

#[tokio::test]
async fn test_unavailable_system_clipboard_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        EventStore::open(&temp_dir.path().join("remoclip.sqlite"))
            .await
            .unwrap(),
    );
    store.append("old", Action::Copy, "persisted").await.unwrap();

    let selection = select_backend_with(BackendKind::System, &store, || {
        Err(ClipboardError::Unavailable("no display".to_string()))
    })
    .await
    .unwrap();
    assert!(selection.fell_back());
    assert_eq!(selection.kind, BackendKind::Private);

    let service = Arc::new(ClipboardService::new(
        ServiceSettings::default(),
        Arc::clone(&store),
        selection.backend,
    ));
    let server = TestServer {
        service,
        token: None,
    };

    let (_, body) = server.call("GET", "/paste", json!({"hostname": "h"})).await;
    assert_eq!(body["content"], "persisted");

    server.copy("fresh").await;
    let (_, body) = server.call("GET", "/paste", json!({"hostname": "h"})).await;
    assert_eq!(body["content"], "fresh");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_history_limit_is_min_of_limit_and_count(copies in 0usize..12, limit in 1u32..16) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let server = TestServer::new(ServiceSettings::default()).await;
            for i in 0..copies {
                server.copy(&format!("entry {}", i)).await;
            }
            // Audit events from earlier queries must not count
            server.history(json!({"hostname": "h"})).await;

            let history = server
                .history(json!({"hostname": "h", "limit": limit}))
                .await;
            let expected = copies.min(limit as usize);
            prop_assert_eq!(history.len(), expected);

            let ids: Vec<i64> = history.iter().map(|e| e["id"].as_i64().unwrap()).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] > w[1]));
            if expected > 0 {
                prop_assert_eq!(&history[0]["content"], &json!(format!("entry {}", copies - 1)));
            }
            Ok(())
        })?;
    }
}
