// src/services/users.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::{
    access::{Actor, Permission},
    audit::{AuditEvent, RequestContext, record_quietly},
    error::AppError,
    models::{
        audit_log::{AuditLog, AuditLogFilter},
        user::{
            ChangePasswordRequest, DeleteOutcome, LoginRequest, NewUser, ProfessorSummary,
            RegisterRequest, Role, StudentEntry, UpdateProfileRequest, UpdateUserRequest, User,
            UserDetails,
        },
    },
    services::authoring::owned_class,
    state::AppState,
    store::{ClassScope, StoreError},
    utils::{
        hash::{check_password_strength, hash_password, verify_password},
        jwt::sign_jwt,
    },
};

const TABLE: &str = "users";
const AUDIT_LOG_LIMIT: i64 = 200;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub user: User,
}

async fn load_user(state: &AppState, id: i64) -> Result<User, AppError> {
    state.store.find_user(id).await?.ok_or(AppError::NotFound)
}

/// Self-registration. The very first account becomes admin.
pub async fn register(
    state: &AppState,
    req: RegisterRequest,
    ctx: &RequestContext,
) -> Result<User, AppError> {
    check_password_strength(&req.password, state.config.password_min_length)?;
    let password_hash = hash_password(&req.password)?;

    let user = state
        .store
        .create_user(NewUser {
            username: req.username.trim().to_lowercase(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                AppError::Conflict("Username or email already exists".to_string())
            }
            other => {
                tracing::error!("Failed to register user: {}", other);
                AppError::from(other)
            }
        })?;

    if user.role == Role::Admin {
        tracing::info!("Bootstrapped first user '{}' as admin", user.username);
    }
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(user.id), "REGISTER", TABLE)
            .record(user.id)
            .after(json!({ "username": user.username, "role": user.role })),
        ctx,
    )
    .await;
    Ok(user)
}

/// Authenticates by username or email and issues a bearer token.
pub async fn login(
    state: &AppState,
    req: LoginRequest,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> Result<LoginResponse, AppError> {
    let user = state
        .store
        .find_user_by_login(&req.username.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid credentials".to_string()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }
    if !user.is_active {
        return Err(AppError::AuthError("Account is deactivated".to_string()));
    }

    state.store.touch_last_login(user.id, now).await?;
    let token = sign_jwt(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(user.id), "LOGIN", TABLE).record(user.id),
        ctx,
    )
    .await;

    Ok(LoginResponse {
        token,
        token_type: "Bearer",
        user: User {
            last_login: Some(now),
            ..user
        },
    })
}

pub async fn me(state: &AppState, actor: &Actor) -> Result<User, AppError> {
    load_user(state, actor.id()).await
}

/// Tokens are stateless; logging out only leaves an audit trail.
pub async fn logout(state: &AppState, actor: &Actor) {
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "LOGOUT", TABLE).record(actor.id()),
        &actor.ctx,
    )
    .await;
}

pub async fn change_password(
    state: &AppState,
    actor: &Actor,
    req: ChangePasswordRequest,
) -> Result<(), AppError> {
    let user = load_user(state, actor.id()).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::AuthError("Current password is incorrect".to_string()));
    }
    check_password_strength(&req.new_password, state.config.password_min_length)?;

    let password_hash = hash_password(&req.new_password)?;
    state.store.update_password(user.id, &password_hash).await?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(user.id), "PASSWORD_CHANGE", TABLE).record(user.id),
        &actor.ctx,
    )
    .await;
    Ok(())
}

/// Lets any user fix their own name and email.
pub async fn update_profile(
    state: &AppState,
    actor: &Actor,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    let user = load_user(state, actor.id()).await?;
    let details = UserDetails {
        username: user.username.clone(),
        email: req.email.trim().to_lowercase(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
    };

    let updated = state
        .store
        .update_user_details(user.id, details)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Conflict("Email already taken".to_string()),
            other => AppError::from(other),
        })?
        .ok_or(AppError::NotFound)?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(user.id), "PROFILE_UPDATE", TABLE)
            .record(user.id)
            .before(json!({
                "first_name": user.first_name,
                "last_name": user.last_name,
                "email": user.email,
            }))
            .after(json!({
                "first_name": updated.first_name,
                "last_name": updated.last_name,
                "email": updated.email,
            })),
        &actor.ctx,
    )
    .await;
    Ok(updated)
}

pub async fn list_users(
    state: &AppState,
    actor: &Actor,
    role: Option<Role>,
) -> Result<Vec<User>, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    Ok(state.store.list_users(role).await?)
}

pub async fn get_user(state: &AppState, actor: &Actor, user_id: i64) -> Result<User, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    load_user(state, user_id).await
}

/// Admin edit of account details, optionally toggling the active flag.
pub async fn update_user(
    state: &AppState,
    actor: &Actor,
    user_id: i64,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    if user_id == actor.id() && req.is_active == Some(false) {
        return Err(AppError::ValidationError(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let user = load_user(state, user_id).await?;
    let details = UserDetails {
        username: req.username.trim().to_lowercase(),
        email: req.email.trim().to_lowercase(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
    };

    let mut updated = state
        .store
        .update_user_details(user.id, details)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                AppError::Conflict("Username or email already exists".to_string())
            }
            other => AppError::from(other),
        })?
        .ok_or(AppError::NotFound)?;

    if let Some(active) = req.is_active.filter(|a| *a != user.is_active) {
        state.store.set_user_active(user.id, active).await?;
        updated.is_active = active;
    }

    tracing::info!("User {} updated by admin {}", user.id, actor.id());
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "USER_UPDATE", TABLE)
            .record(user.id)
            .before(serde_json::to_value(&user)?)
            .after(serde_json::to_value(&updated)?),
        &actor.ctx,
    )
    .await;
    Ok(updated)
}

/// Active professors with the number of active classes they own.
pub async fn list_professors(
    state: &AppState,
    actor: &Actor,
) -> Result<Vec<ProfessorSummary>, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    let professors = state.store.list_users(Some(Role::Professor)).await?;

    let mut out = Vec::with_capacity(professors.len());
    for professor in professors.into_iter().filter(|p| p.is_active) {
        let class_count = state
            .store
            .list_classes(ClassScope::OwnedBy(professor.id))
            .await?
            .iter()
            .filter(|c| c.is_active)
            .count() as i64;
        out.push(ProfessorSummary {
            professor,
            class_count,
        });
    }
    Ok(out)
}

/// Active students. With a class, only that class's roster, which the
/// caller must own.
pub async fn list_students(
    state: &AppState,
    actor: &Actor,
    class_id: Option<i64>,
) -> Result<Vec<StudentEntry>, AppError> {
    actor.caps.require(Permission::Author)?;

    let Some(class_id) = class_id else {
        return Ok(state
            .store
            .list_users(Some(Role::Student))
            .await?
            .into_iter()
            .filter(|u| u.is_active)
            .map(|student| StudentEntry {
                student,
                enrolled_at: None,
                enrollment_active: None,
            })
            .collect());
    };

    let class = owned_class(state, actor, class_id).await?;
    let mut out = Vec::new();
    for enrollment in state.store.list_enrollments(class.id).await? {
        if let Some(student) = state
            .store
            .find_user(enrollment.student_id)
            .await?
            .filter(|u| u.is_active && u.role == Role::Student)
        {
            out.push(StudentEntry {
                student,
                enrolled_at: Some(enrollment.enrolled_at),
                enrollment_active: Some(enrollment.is_active),
            });
        }
    }
    Ok(out)
}

pub async fn update_role(
    state: &AppState,
    actor: &Actor,
    user_id: i64,
    role: Role,
) -> Result<User, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    if user_id == actor.id() {
        return Err(AppError::ValidationError(
            "You cannot change your own role".to_string(),
        ));
    }
    let user = load_user(state, user_id).await?;
    state.store.update_user_role(user.id, role).await?;

    tracing::info!("User {} role changed {} -> {}", user.id, user.role, role);
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "ROLE_CHANGE", TABLE)
            .record(user.id)
            .before(json!({ "role": user.role }))
            .after(json!({ "role": role })),
        &actor.ctx,
    )
    .await;
    Ok(User { role, ..user })
}

pub async fn set_active(
    state: &AppState,
    actor: &Actor,
    user_id: i64,
    active: bool,
) -> Result<User, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    if user_id == actor.id() && !active {
        return Err(AppError::ValidationError(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let user = load_user(state, user_id).await?;
    state.store.set_user_active(user.id, active).await?;

    let action = if active { "USER_UPDATE" } else { "USER_DEACTIVATE" };
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), action, TABLE)
            .record(user.id)
            .before(json!({ "is_active": user.is_active }))
            .after(json!({ "is_active": active })),
        &actor.ctx,
    )
    .await;
    Ok(User {
        is_active: active,
        ..user
    })
}

/// Users that own classes or have enrollments or submissions are only
/// deactivated; everyone else is removed.
pub async fn delete_user(
    state: &AppState,
    actor: &Actor,
    user_id: i64,
) -> Result<DeleteOutcome, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    if user_id == actor.id() {
        return Err(AppError::ValidationError(
            "You cannot delete your own account".to_string(),
        ));
    }
    let user = load_user(state, user_id).await?;
    let before = serde_json::to_value(&user)?;

    let (outcome, action) = if state.store.user_has_dependents(user.id).await? {
        state.store.set_user_active(user.id, false).await?;
        (DeleteOutcome::Deactivated, "USER_DEACTIVATE")
    } else {
        state.store.delete_user(user.id).await?;
        (DeleteOutcome::Deleted, "USER_DELETE")
    };

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), action, TABLE)
            .record(user.id)
            .before(before),
        &actor.ctx,
    )
    .await;
    Ok(outcome)
}

pub async fn reset_password(
    state: &AppState,
    actor: &Actor,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    check_password_strength(new_password, state.config.password_min_length)?;
    let user = load_user(state, user_id).await?;

    let password_hash = hash_password(new_password)?;
    state.store.update_password(user.id, &password_hash).await?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "PASSWORD_RESET", TABLE).record(user.id),
        &actor.ctx,
    )
    .await;
    Ok(())
}

pub async fn list_audit_logs(
    state: &AppState,
    actor: &Actor,
    filter: &AuditLogFilter,
) -> Result<Vec<AuditLog>, AppError> {
    actor.caps.require(Permission::ViewAuditLog)?;
    Ok(state.store.list_audit_logs(filter, AUDIT_LOG_LIMIT).await?)
}
