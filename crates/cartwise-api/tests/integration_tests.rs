//! Integration tests for the Cartwise API.
//!
//! Each test builds its own in-memory state with a scripted generation
//! engine and drives the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use cartwise_api::create_router;
use cartwise_api::error::ErrorBody;
use cartwise_api::handlers::{HealthResponse, MessagesResponse, SessionResponse};
use cartwise_api::state::AppState;
use cartwise_chat::{ChatError, GenerationEngine, GenerationOptions, PromptMessage, TokenStream};
use cartwise_core::config::CartwiseConfig;
use cartwise_core::types::{Category, Color, Product, Role};
use cartwise_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

struct EchoEngine;

#[async_trait]
impl GenerationEngine for EchoEngine {
    async fn generate(
        &self,
        messages: Vec<PromptMessage>,
        _options: &GenerationOptions,
    ) -> Result<TokenStream, ChatError> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let tokens = vec![Ok("You said: ".to_string()), Ok(last)];
        Ok(futures::stream::iter(tokens).boxed())
    }
}

fn make_state() -> AppState {
    let mut config = CartwiseConfig::default();
    config.chat.max_message_length = 200;
    AppState::new(config, Database::in_memory().unwrap(), Arc::new(EchoEngine))
}

fn seed_catalog(state: &AppState) {
    for (name, price) in [("Court Classic", 399.0), ("Street Low", 299.0)] {
        state
            .products
            .upsert(&Product {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: String::new(),
                category: Category::Shoes,
                color: Color::Red,
                brand: None,
                price,
                original_price: None,
                rating: 4.5,
                review_count: 12,
                image_ref: String::new(),
                stock: 4,
                active: true,
            })
            .unwrap();
    }
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn open_session(state: &AppState) -> Uuid {
    let resp = create_router(state.clone())
        .oneshot(post_json("/sessions", r#"{"userId":"shopper-1"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: SessionResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    body.session.id
}

/// Parse an SSE body into `(event name, JSON data)` pairs.
fn parse_sse(body: &[u8]) -> Vec<(String, Value)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((name?, data?))
        })
        .collect()
}

async fn chat(state: &AppState, session_id: Uuid, message: &str) -> axum::response::Response {
    let body = serde_json::json!({ "message": message }).to_string();
    create_router(state.clone())
        .oneshot(post_json(&format!("/sessions/{}/chat", session_id), &body))
        .await
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_catalog_size() {
    let state = make_state();
    seed_catalog(&state);
    let resp = create_router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.catalog_size, 2);
}

#[tokio::test]
async fn test_health_waits_for_database_off_the_runtime() {
    let state = make_state();
    let database = state.database.clone();
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let holder = std::thread::spawn(move || {
        database.with_conn(|_| {
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        })
    });
    locked_rx.recv().unwrap();

    let request = tokio::spawn(
        create_router(state).oneshot(Request::get("/health").body(Body::empty()).unwrap()),
    );

    // The single runtime thread stays free while the handler waits on the lock.
    let started = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(started.elapsed() < Duration::from_millis(300));

    let resp = request.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    holder.join().unwrap().unwrap();
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_create_session_uses_default_persona() {
    let state = make_state();
    let resp = create_router(state)
        .oneshot(post_json("/sessions", r#"{"userId":"shopper-1"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: SessionResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.session.user_id, "shopper-1");
    assert_eq!(body.session.persona_id, "friendly");
    assert!(body.greeting.contains("Mia"));
}

#[tokio::test]
async fn test_create_session_with_persona() {
    let state = make_state();
    let resp = create_router(state)
        .oneshot(post_json(
            "/sessions",
            r#"{"userId":"shopper-2","personaId":"expert"}"#,
        ))
        .await
        .unwrap();

    let body: SessionResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.session.persona_id, "expert");
}

#[tokio::test]
async fn test_create_session_requires_user_id() {
    let state = make_state();
    let resp = create_router(state)
        .oneshot(post_json("/sessions", r#"{"userId":"  "}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(err.error, "bad_request");
}

#[tokio::test]
async fn test_messages_of_unknown_session_is_404() {
    let state = make_state();
    let resp = create_router(state)
        .oneshot(
            Request::get(format!("/sessions/{}/messages", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_messages_with_malformed_id_is_400() {
    let state = make_state();
    let resp = create_router(state)
        .oneshot(
            Request::get("/sessions/not-a-uuid/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_streams_frames_and_records_transcript() {
    let state = make_state();
    let session_id = open_session(&state).await;

    let resp = chat(&state, session_id, "hello").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let frames = parse_sse(&body_bytes(resp).await);
    let names: Vec<&str> = frames.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["start", "content-delta", "content-delta", "complete", "end"]
    );
    for (name, data) in &frames {
        assert_eq!(data["type"], name.as_str());
        assert_eq!(data["sessionId"], session_id.to_string());
    }
    assert_eq!(frames[3].1["content"], "You said: hello");

    let resp = create_router(state.clone())
        .oneshot(
            Request::get(format!("/sessions/{}/messages", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let transcript: MessagesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(transcript.messages.len(), 2);
    assert_eq!(transcript.messages[0].role, Role::User);
    assert_eq!(transcript.messages[1].content, "You said: hello");
}

#[tokio::test]
async fn test_chat_with_shopping_intent_sends_products() {
    let state = make_state();
    seed_catalog(&state);
    let session_id = open_session(&state).await;

    let frames = parse_sse(&body_bytes(chat(&state, session_id, "red shoes under 500").await).await);
    let names: Vec<&str> = frames.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["start", "content-delta", "content-delta", "products", "complete", "end"]
    );

    let products = &frames[3].1;
    assert_eq!(products["products"].as_array().unwrap().len(), 2);
    assert_eq!(products["summaryText"], "Here are 2 picks for Red Shoes under 500.");
    assert_eq!(products["searchQuery"], "shoes red under 500");
}

#[tokio::test]
async fn test_chat_rejects_invalid_messages_before_streaming() {
    let state = make_state();
    let session_id = open_session(&state).await;

    let resp = chat(&state, session_id, "   ").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = chat(&state, session_id, &"a".repeat(201)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = chat(&state, Uuid::new_v4(), "hello").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Rejected messages are not recorded.
    let transcript = state.conversations.list_messages(session_id).unwrap();
    assert!(transcript.is_empty());
}
