// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    access::Actor,
    error::AppError,
    models::{
        audit_log::AuditLogFilter,
        user::{
            DeleteOutcome, ResetPasswordRequest, SetActiveRequest, StudentListParams,
            UpdateRoleRequest, UpdateUserRequest, UserListParams,
        },
    },
    services::{dashboard, users},
    state::AppState,
};

/// Lists all users, optionally filtered by role.
/// Admin only.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let users = users::list_users(&state, &actor, params.role).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get_user(&state, &actor, id).await?;
    Ok(Json(user))
}

/// Edits username, email and names; `is_active` is optional.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = users::update_user(&state, &actor, id, payload).await?;
    Ok(Json(user))
}

/// Active professors with their class counts.
pub async fn list_professors(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let professors = users::list_professors(&state, &actor).await?;
    Ok(Json(professors))
}

/// Active students, optionally for one class (`?class_id=`).
/// Admins and professors.
pub async fn list_students(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<StudentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let students = users::list_students(&state, &actor, params.class_id).await?;
    Ok(Json(students))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let stats = dashboard::stats(&state, &actor, Utc::now()).await?;
    Ok(Json(stats))
}

/// Changes another user's role.
pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::update_role(&state, &actor, id, payload.role).await?;
    Ok(Json(user))
}

/// Activates or deactivates a user.
pub async fn set_active(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::set_active(&state, &actor, id, payload.is_active).await?;
    Ok(Json(user))
}

/// Deletes a user. Users with history are deactivated instead (200 with
/// the outcome); a real deletion answers 204 No Content.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    match users::delete_user(&state, &actor, id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT.into_response()),
        outcome @ DeleteOutcome::Deactivated => {
            Ok(Json(json!({ "outcome": outcome })).into_response())
        }
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    users::reset_password(&state, &actor, id, &payload.new_password).await?;
    Ok(Json(json!({ "message": "Password reset" })))
}

/// Newest audit entries first.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<impl IntoResponse, AppError> {
    let logs = users::list_audit_logs(&state, &actor, &filter).await?;
    Ok(Json(logs))
}
