//! Integration tests for the HTTP API
//!
//! These tests drive the full router in-process:
//! 1. Request parsing and error formatting
//! 2. Call placement through a scripted provider
//! 3. SSE progress streaming
//! 4. Email drafting without a model configured

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use crm_actions_backend::api::router;
use crm_actions_backend::calls::types::{CallSnapshot, CreateCall};
use crm_actions_backend::calls::{
    CallDefaults, CallHandle, CallOrchestrator, CallProvider, CallStatus, PollPolicy,
};
use crm_actions_backend::error::AppError;
use crm_actions_backend::llm::{EmailDrafter, GeminiClient};
use crm_actions_backend::state::AppState;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

/// Provider that answers every poll from one shared script
#[derive(Default)]
struct StubProvider {
    script: Mutex<VecDeque<Result<CallStatus, String>>>,
    created: Mutex<Vec<CreateCall>>,
    polls: AtomicU32,
}

impl StubProvider {
    fn scripted(steps: Vec<Result<CallStatus, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl CallProvider for StubProvider {
    async fn create(&self, call: &CreateCall) -> Result<CallHandle, AppError> {
        self.created.lock().unwrap().push(call.clone());
        Ok(CallHandle::new("call_test"))
    }

    async fn get(&self, _handle: &CallHandle) -> Result<CallSnapshot, AppError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(CallStatus::InProgress));

        match step {
            Ok(CallStatus::Ended) => Ok(CallSnapshot {
                transcript: Some("AI: Is Tuesday good?\nUser: Tuesday works.".to_string()),
                summary: Some("Meeting set for Tuesday.".to_string()),
                ended_reason: Some("assistant-ended-call".to_string()),
                ..CallSnapshot::with_status(CallStatus::Ended)
            }),
            Ok(status) => Ok(CallSnapshot::with_status(status)),
            Err(msg) => Err(AppError::Provider(msg)),
        }
    }
}

fn full_defaults() -> CallDefaults {
    CallDefaults {
        customer_number: Some("+15550100".to_string()),
        phone_number_id: Some("pn_1".to_string()),
        assistant_id: Some("asst_1".to_string()),
    }
}

fn app_with(
    provider: Arc<StubProvider>,
    defaults: CallDefaults,
    shutdown: watch::Receiver<bool>,
) -> Router {
    let policy = PollPolicy {
        interval: Duration::from_secs(3),
        max_wait: Duration::from_secs(60),
        max_attempts: None,
    };
    let calls = CallOrchestrator::new(provider, defaults, policy);
    let gemini = GeminiClient::new(reqwest::Client::new(), None, "gemini-test", "http://127.0.0.1:9");
    let drafter = EmailDrafter::new(gemini, "the test team");
    router(AppState::new(calls, drafter, shutdown))
}

fn app(provider: Arc<StubProvider>) -> (Router, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    (app_with(provider, full_defaults(), rx), tx)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _tx) = app(StubProvider::scripted(vec![]));
    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test(start_paused = true)]
async fn test_place_call_returns_final_outcome() {
    let provider = StubProvider::scripted(vec![
        Ok(CallStatus::Ringing),
        Ok(CallStatus::InProgress),
        Ok(CallStatus::Ended),
    ]);
    let (app, _tx) = app(provider.clone());

    let response = app
        .oneshot(post_json(
            "/api/call",
            json!({
                "customer_number": "+15550142",
                "variables": {
                    "contact_name": "Emily Rodriguez",
                    "time_window": "Tuesday morning",
                    "region": "EMEA"
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["call_id"], "call_test");
    assert_eq!(body["status"], "ended");
    assert_eq!(body["polls"], 3);
    assert_eq!(body["summary"], "Meeting set for Tuesday.");
    assert_eq!(body["transcript"][0]["speaker"], "assistant");
    assert_eq!(body["transcript"][1]["text"], "Tuesday works.");

    let created = provider.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].customer_number, "+15550142");
    assert_eq!(created[0].assistant_id, "asst_1");
    assert_eq!(
        created[0].variables.contact_name.as_deref(),
        Some("Emily Rodriguez")
    );
    assert_eq!(created[0].variables.extra["region"], "EMEA");
}

#[tokio::test]
async fn test_place_call_without_number_is_client_error() {
    let provider = StubProvider::scripted(vec![]);
    let (_tx, rx) = watch::channel(false);
    let defaults = CallDefaults {
        customer_number: None,
        ..full_defaults()
    };
    let app = app_with(provider.clone(), defaults, rx);

    let response = app.oneshot(post_json("/api/call", json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Configuration error"));
    assert!(provider.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_place_call_rejects_malformed_body() {
    let provider = StubProvider::scripted(vec![]);
    let (app, _tx) = app(provider.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/call")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    assert!(provider.created.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_is_bad_gateway() {
    let provider = StubProvider::scripted(vec![
        Ok(CallStatus::InProgress),
        Err("upstream unavailable".to_string()),
    ]);
    let (app, _tx) = app(provider.clone());

    let response = app.oneshot(post_json("/api/call", json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(provider.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_polling() {
    let provider = StubProvider::scripted(vec![]);
    let (app, tx) = app(provider);
    tx.send(true).unwrap();

    let response = app.oneshot(post_json("/api/call", json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Cancelled"));
}

#[tokio::test(start_paused = true)]
async fn test_stream_reports_progress_then_result() {
    let provider = StubProvider::scripted(vec![
        Ok(CallStatus::Queued),
        Ok(CallStatus::InProgress),
        Ok(CallStatus::Ended),
    ]);
    let (app, _tx) = app(provider);

    let response = app
        .oneshot(post_json("/api/call/stream", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    let text = body_text(response).await;
    let events: Vec<&str> = text
        .split("\n\n")
        .filter_map(|chunk| chunk.strip_prefix("data: "))
        .collect();

    assert_eq!(events.len(), 6);
    let submitted: Value = serde_json::from_str(events[0]).unwrap();
    assert_eq!(submitted["event"], "submitted");
    assert_eq!(submitted["call_id"], "call_test");

    let statuses: Vec<String> = events[1..4]
        .iter()
        .map(|e| serde_json::from_str::<Value>(e).unwrap())
        .map(|v| {
            assert_eq!(v["event"], "status");
            v["status"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(statuses, vec!["queued", "in-progress", "ended"]);

    let completed: Value = serde_json::from_str(events[4]).unwrap();
    assert_eq!(completed["event"], "completed");
    assert_eq!(completed["result"]["status"], "ended");
    assert_eq!(events[5], "[DONE]");
}

#[tokio::test(start_paused = true)]
async fn test_stream_reports_poll_failure_as_error_event() {
    let provider = StubProvider::scripted(vec![
        Ok(CallStatus::Queued),
        Err("upstream unavailable".to_string()),
    ]);
    let (app, _tx) = app(provider.clone());

    let response = app
        .oneshot(post_json("/api/call/stream", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    let events: Vec<&str> = text
        .split("\n\n")
        .filter_map(|chunk| chunk.strip_prefix("data: "))
        .collect();

    assert_eq!(events.len(), 4);
    let kinds: Vec<String> = events[..3]
        .iter()
        .map(|e| serde_json::from_str::<Value>(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["submitted", "status", "error"]);

    let error: Value = serde_json::from_str(events[2]).unwrap();
    assert_eq!(error["status"], 502);
    assert!(error["error"].as_str().unwrap().contains("upstream unavailable"));
    assert_eq!(events[3], "[DONE]");
    assert_eq!(provider.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_submission_error_is_plain_response() {
    let provider = StubProvider::scripted(vec![]);
    let (_tx, rx) = watch::channel(false);
    let defaults = CallDefaults {
        assistant_id: None,
        ..full_defaults()
    };
    let app = app_with(provider, defaults, rx);

    let response = app
        .oneshot(post_json("/api/call/stream", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_draft_email_uses_template_without_model() {
    let (app, _tx) = app(StubProvider::scripted(vec![]));

    let response = app
        .oneshot(post_json(
            "/api/email/draft",
            json!({ "deal_id": "deal-1", "subtype": "followup" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["source"], "template");
    assert_eq!(body["subject"], "Following up on our conversation");
}

#[tokio::test]
async fn test_draft_email_rejects_unknown_subtype() {
    let (app, _tx) = app(StubProvider::scripted(vec![]));

    let response = app
        .oneshot(post_json("/api/email/draft", json!({ "subtype": "fax" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
