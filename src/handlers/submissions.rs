// src/handlers/submissions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    access::Actor,
    error::AppError,
    models::submission::AnswerPayload,
    services::lifecycle,
    state::AppState,
};

/// The caller's own submissions.
pub async fn list_own(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = lifecycle::list_own(&state, &actor, Utc::now()).await?;
    Ok(Json(submissions))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = lifecycle::view(&state, &actor, id, Utc::now()).await?;
    Ok(Json(view))
}

/// Saves one answer. Re-sending replaces the previous answer.
pub async fn answer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<AnswerPayload>,
) -> Result<impl IntoResponse, AppError> {
    let saved = lifecycle::record_answer(&state, &actor, id, question_id, payload, Utc::now()).await?;
    Ok(Json(saved))
}

/// Scores and freezes the submission. A repeated call answers 409 with the
/// frozen result.
pub async fn complete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = lifecycle::complete(&state, &actor, id, Utc::now()).await?;
    Ok(Json(submission))
}
