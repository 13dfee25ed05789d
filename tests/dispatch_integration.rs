//! Dispatcher integration tests against a wiremock collector
//!
//! Verifies the wire bodies the collector expects, the reduced-payload
//! retry after a timeout, the final flush fallback chain, and backup
//! recovery semantics.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cryptique::config::{CollectorConfig, SessionConfig};
use cryptique::dispatch::{self, Dispatcher, EventPayload};
use cryptique::page::PageContext;
use cryptique::session::{Session, SessionManager};
use cryptique::storage::{keys, MemoryStore, StorageScope};

fn collector_config(server: &MockServer, timeout_secs: u64) -> CollectorConfig {
    CollectorConfig {
        api_url: format!("{}/api/sdk/track", server.uri()),
        site_id: "site-1".to_string(),
        send_timeout_secs: timeout_secs,
    }
}

fn sample_session() -> (Session, PageContext) {
    let session_store: Arc<dyn StorageScope> = Arc::new(MemoryStore::new());
    let user_store: Arc<dyn StorageScope> = Arc::new(MemoryStore::new());
    let page = PageContext::new("https://example.com/?utm_source=foo")
        .unwrap()
        .with_title("Home");
    let manager = SessionManager::open(
        "site-1",
        &page,
        session_store,
        user_store,
        SessionConfig::default(),
    )
    .unwrap();
    manager.record_page_visit(&page).unwrap();
    (manager.snapshot().unwrap(), page)
}

#[tokio::test]
async fn event_send_posts_payload_and_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sdk/track"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    let (session, page) = sample_session();
    let payload = EventPayload::assemble("PAGEVIEW", json!({"pageTitle": "Home"}), &session, &page);

    dispatcher.send_event(&payload, &session).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["payload"]["type"], "PAGEVIEW");
    assert_eq!(body["payload"]["siteId"], "site-1");
    assert_eq!(body["payload"]["eventData"]["source"], "foo");
    assert_eq!(body["sessionData"]["sessionId"], session.session_id);
    assert_eq!(body["sessionData"]["pageVisits"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn timed_out_event_retries_with_reduced_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(&collector_config(&server, 1)).unwrap();
    let (session, page) = sample_session();
    let payload = EventPayload::assemble("PAGEVIEW", json!({}), &session, &page);

    // Both the send and its retry time out; the error surfaces to the
    // caller, who logs it.
    assert!(dispatcher.send_event(&payload, &session).await.is_err());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let full: serde_json::Value = requests[0].body_json().unwrap();
    assert!(full.get("sessionData").is_some());

    let retry: serde_json::Value = requests[1].body_json().unwrap();
    assert!(retry.get("sessionData").is_none());
    assert_eq!(retry["payload"]["sessionId"], session.session_id);
    assert!(retry["payload"].get("eventData").is_none());
}

#[tokio::test]
async fn http_error_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    let (session, page) = sample_session();
    let payload = EventPayload::assemble("PAGEVIEW", json!({}), &session, &page);

    assert!(dispatcher.send_event(&payload, &session).await.is_err());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn snapshot_body_is_session_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    let (session, _) = sample_session();

    dispatcher.send_snapshot(&session).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert!(body.get("payload").is_none());
    assert_eq!(body["sessionData"]["sessionId"], session.session_id);
}

#[tokio::test]
async fn final_flush_falls_back_to_minimal_snapshot() {
    let server = MockServer::start().await;

    // The full snapshot carries isFirstPage; reject it to force the
    // fallback path.
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"sessionData": {"isFirstPage": true}})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    let (session, _) = sample_session();

    dispatcher.final_flush(&session).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let fallback: serde_json::Value = requests[1].body_json().unwrap();
    assert!(fallback["sessionData"].get("isFirstPage").is_none());
    assert!(fallback["sessionData"].get("pageVisits").is_none());
    assert_eq!(fallback["sessionData"]["sessionId"], session.session_id);
    assert_eq!(fallback["sessionData"]["country"], "Unknown");
}

#[tokio::test]
async fn recover_pending_sends_and_clears_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    store
        .set(keys::LAST_SESSION, &json!({"sessionId": "old-1"}).to_string())
        .unwrap();

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    assert!(dispatch::recover_pending(&store, &dispatcher).await.unwrap());

    // Delivered and cleared.
    assert!(store.get(keys::LAST_SESSION).unwrap().is_none());
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["sessionData"]["sessionId"], "old-1");
}

#[tokio::test]
async fn recover_pending_keeps_backup_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    store
        .set(keys::LAST_SESSION, &json!({"sessionId": "old-2"}).to_string())
        .unwrap();

    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();
    assert!(dispatch::recover_pending(&store, &dispatcher).await.is_err());

    // The backup survives for the next attempt.
    assert!(store.get(keys::LAST_SESSION).unwrap().is_some());
}

#[tokio::test]
async fn recover_pending_without_backup_is_a_noop() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let dispatcher = Dispatcher::new(&collector_config(&server, 5)).unwrap();

    assert!(!dispatch::recover_pending(&store, &dispatcher).await.unwrap());
    assert!(server.received_requests().await.unwrap().is_empty());
}
