// src/handlers/quizzes.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    access::Actor,
    error::AppError,
    models::{question::CreateQuestionRequest, quiz::UpdateQuizRequest},
    services::{authoring, lifecycle, results},
    state::AppState,
};

/// Author view with the answer key, or the student view without it.
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = authoring::view_quiz(&state, &actor, id).await?;
    Ok(Json(view))
}

pub async fn update_quiz(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = authoring::update_quiz(&state, &actor, id, payload, Utc::now()).await?;
    Ok(Json(quiz))
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = authoring::activate(&state, &actor, id).await?;
    Ok(Json(quiz))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = authoring::deactivate(&state, &actor, id).await?;
    Ok(Json(quiz))
}

/// Adds a question together with its options.
pub async fn add_question(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = authoring::add_question(&state, &actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    authoring::delete_question(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Starts an attempt: 201 for a new submission, 200 when resuming one.
pub async fn start(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = lifecycle::start(&state, &actor, id, Utc::now()).await?;
    let status = if outcome.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

pub async fn quiz_results(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = results::quiz_summary(&state, &actor, id, Utc::now()).await?;
    Ok(Json(summary))
}
