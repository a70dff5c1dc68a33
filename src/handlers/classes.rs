// src/handlers/classes.rs

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
    models::{
        class::{CreateClassRequest, EnrollRequest},
        quiz::CreateQuizRequest,
    },
    services::{authoring, classes, results},
    state::AppState,
};

pub async fn create_class(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let class = classes::create_class(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// Classes visible to the caller.
pub async fn list_classes(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let list = classes::list_classes(&state, &actor).await?;
    Ok(Json(list))
}

pub async fn get_class(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let class = classes::view_class(&state, &actor, id).await?;
    Ok(Json(class))
}

pub async fn enroll(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let class = classes::enroll(&state, &actor, &payload.class_code, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn list_students(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let roster = classes::roster(&state, &actor, id).await?;
    Ok(Json(roster))
}

pub async fn remove_student(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    classes::remove_student(&state, &actor, id, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates an inactive quiz draft in the class.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = authoring::create_quiz(&state, &actor, id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = authoring::list_class_quizzes(&state, &actor, id).await?;
    Ok(Json(quizzes))
}

pub async fn class_results(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = results::class_summary(&state, &actor, id, Utc::now()).await?;
    Ok(Json(summary))
}
