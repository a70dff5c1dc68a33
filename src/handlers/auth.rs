// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    access::Actor,
    audit::RequestContext,
    error::AppError,
    models::user::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
    services::users,
    state::AppState,
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it. The first account
/// ever created is made admin. Returns 201 Created and the user object
/// (excluding password).
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ctx = RequestContext::from_headers(&headers);
    let user = users::register(&state, payload, &ctx).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// `username` may be either the username or the email address.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ctx = RequestContext::from_headers(&headers);
    let response = users::login(&state, payload, &ctx, Utc::now()).await?;

    Ok(Json(response))
}

/// Returns the authenticated user. Doubles as token verification.
pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::me(&state, &actor).await?;
    Ok(Json(user))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    users::logout(&state, &actor).await;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    users::change_password(&state, &actor, payload).await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

/// Updates the caller's own name and email.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = users::update_profile(&state, &actor, payload).await?;
    Ok(Json(user))
}
