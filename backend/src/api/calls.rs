//! Call API handlers
//!
//! `POST /api/call` places a call and answers once the call has finished.
//! `POST /api/call/stream` does the same but streams every observed status
//! via SSE (Server-Sent Events) while the call is in progress.

use crate::api::json_body;
use crate::calls::{CallRequest, CallResult, PollUpdate};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;
use tokio::sync::mpsc;

/// SSE stream termination signal
pub const SSE_DONE_SIGNAL: &str = "[DONE]";

/// Event sent on the call progress stream
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CallEvent {
    /// The provider accepted the call
    Submitted {
        /// Provider call id
        call_id: String,
    },
    /// A poll observed a status
    Status(PollUpdate),
    /// The call reached a terminal status
    Completed {
        /// Final outcome
        result: CallResult,
    },
    /// Polling failed; no result will follow
    Error {
        /// Error message
        error: String,
        /// HTTP status the error maps to
        status: u16,
    },
}

impl CallEvent {
    fn to_sse(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(e) => format!("data: [ERROR] {}\n\n", e),
        }
    }
}

impl From<AppError> for CallEvent {
    fn from(e: AppError) -> Self {
        CallEvent::Error {
            status: e.status_code().as_u16(),
            error: e.to_string(),
        }
    }
}

/// POST /api/call - Place a call and wait for its outcome
///
/// # Returns
/// * `Ok(Json<CallResult>)` - Terminal status, transcript and summary
/// * `Err(AppError)` - Missing configuration, provider failure, timeout or
///   shutdown
pub async fn place_call(
    State(state): State<AppState>,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<CallResult>, AppError> {
    let request = json_body(payload)?;
    let mut cancel = state.cancel_signal();
    let result = state.calls.place_call(request, &mut cancel).await?;
    Ok(Json(result))
}

/// POST /api/call/stream - Place a call and stream its progress
///
/// Submission errors are returned as a normal error response. Once the call
/// is placed the response switches to SSE: one `submitted` event, a
/// `status` event per poll, then `completed` or `error`, then `[DONE]`.
/// Dropping the connection stops the polling (the call itself carries on
/// at the provider).
pub async fn place_call_stream(
    State(state): State<AppState>,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    use async_stream::stream;

    let request = json_body(payload)?;
    let handle = state.calls.submit(request).await?;
    let orchestrator = state.calls.clone();
    let mut cancel = state.cancel_signal();

    let stream = stream! {
        yield CallEvent::Submitted { call_id: handle.to_string() }.to_sse();

        let (tx, mut rx) = mpsc::unbounded_channel::<PollUpdate>();
        let poll = orchestrator.await_completion_with(&handle, &mut cancel, move |update| {
            // Receiver lives as long as this stream.
            let _ = tx.send(update);
        });
        tokio::pin!(poll);

        loop {
            let next = tokio::select! {
                biased;
                Some(update) = rx.recv() => Progress::Update(update),
                outcome = &mut poll => Progress::Finished(outcome),
            };

            match next {
                Progress::Update(update) => {
                    yield CallEvent::Status(update).to_sse();
                }
                Progress::Finished(outcome) => {
                    while let Ok(update) = rx.try_recv() {
                        yield CallEvent::Status(update).to_sse();
                    }
                    let event = match outcome {
                        Ok(result) => CallEvent::Completed { result },
                        Err(e) => CallEvent::from(e),
                    };
                    yield event.to_sse();
                    yield format!("data: {}\n\n", SSE_DONE_SIGNAL);
                    break;
                }
            }
        }
    };

    let body_stream = futures_util::StreamExt::map(stream, Ok::<_, std::io::Error>);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}

enum Progress {
    Update(PollUpdate),
    Finished(Result<CallResult, AppError>),
}
