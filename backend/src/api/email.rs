//! Email API handlers

use crate::api::json_body;
use crate::error::AppError;
use crate::llm::{DraftRequest, DraftedEmail};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

/// POST /api/email/draft - Draft a deal email
///
/// Uses Gemini when `GEMINI_API_KEY` is set, otherwise a fixed template.
/// A model answer that doesn't fit the `{subject, contents}` schema is
/// reported as an error rather than replaced by the template.
pub async fn draft_email(
    State(state): State<AppState>,
    payload: Result<Json<DraftRequest>, JsonRejection>,
) -> Result<Json<DraftedEmail>, AppError> {
    let request = json_body(payload)?;
    let draft = state.drafter.draft(request).await?;
    Ok(Json(draft))
}
