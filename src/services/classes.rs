// src/services/classes.rs

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use serde_json::json;

use crate::{
    access::{Actor, Permission},
    audit::{AuditEvent, record_quietly},
    error::AppError,
    models::{
        class::{Class, CreateClassRequest, Enrollment, NewClass},
        user::User,
    },
    services::authoring::{ensure_enrolled, owned_class},
    state::AppState,
    store::{ClassScope, StoreError},
    utils::html::{clean_html, clean_optional},
};

const CODE_LENGTH: usize = 8;
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub student: User,
    pub enrolled_at: DateTime<Utc>,
    pub enrollment_active: bool,
}

/// Random uppercase alphanumeric enrollment code.
pub fn generate_class_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

pub async fn create_class(
    state: &AppState,
    actor: &Actor,
    req: CreateClassRequest,
) -> Result<Class, AppError> {
    actor.caps.require(Permission::Author)?;
    let name = clean_html(req.name.trim());
    let description = clean_optional(req.description.as_deref());

    // Codes are random; retry the rare collision with a fresh one.
    let mut attempt = 0;
    let class = loop {
        attempt += 1;
        let new_class = NewClass {
            name: name.clone(),
            description: description.clone(),
            professor_id: actor.id(),
            class_code: generate_class_code(),
        };
        match state.store.create_class(new_class).await {
            Ok(class) => break class,
            Err(StoreError::Conflict(_)) if attempt < CODE_ATTEMPTS => {
                tracing::debug!("Class code collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    };

    tracing::info!("Class {} created by user {}", class.id, actor.id());
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "CLASS_CREATE", "classes")
            .record(class.id)
            .after(json!({ "name": class.name, "class_code": class.class_code })),
        &actor.ctx,
    )
    .await;
    Ok(class)
}

/// Admins see every class, professors their own, students their enrollments.
pub async fn list_classes(state: &AppState, actor: &Actor) -> Result<Vec<Class>, AppError> {
    let scope = if actor.caps.bypasses_scope() {
        ClassScope::All
    } else if actor.caps.has(Permission::Author) {
        ClassScope::OwnedBy(actor.id())
    } else {
        ClassScope::EnrolledStudent(actor.id())
    };
    Ok(state.store.list_classes(scope).await?)
}

pub async fn view_class(state: &AppState, actor: &Actor, class_id: i64) -> Result<Class, AppError> {
    if actor.caps.has(Permission::Author) {
        return owned_class(state, actor, class_id).await;
    }
    let class = state
        .store
        .find_class(class_id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_enrolled(state, actor, &class).await?;
    Ok(class)
}

/// Students join with the code their professor hands out.
pub async fn enroll(
    state: &AppState,
    actor: &Actor,
    class_code: &str,
    now: DateTime<Utc>,
) -> Result<Class, AppError> {
    actor.caps.require(Permission::TakeQuizzes)?;
    let class = state
        .store
        .find_class_by_code(&class_code.trim().to_uppercase())
        .await?
        .filter(|c| c.is_active)
        .ok_or(AppError::NotFound)?;

    let existing = state.store.find_enrollment(class.id, actor.id()).await?;
    if existing.is_some_and(|e| e.is_active) {
        return Err(AppError::Conflict(
            "You are already enrolled in this class".to_string(),
        ));
    }

    let enrollment = state.store.enroll(class.id, actor.id(), now).await?;
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "ENROLL", "class_enrollments")
            .record(class.id)
            .after(json!({
                "class_id": enrollment.class_id,
                "student_id": enrollment.student_id,
            })),
        &actor.ctx,
    )
    .await;
    Ok(class)
}

/// Soft removal; the student's submissions are kept.
pub async fn remove_student(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    let class = owned_class(state, actor, class_id).await?;
    if !state
        .store
        .set_enrollment_active(class.id, student_id, false)
        .await?
    {
        return Err(AppError::NotFound);
    }

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "UNENROLL", "class_enrollments")
            .record(class.id)
            .before(json!({ "student_id": student_id, "is_active": true }))
            .after(json!({ "student_id": student_id, "is_active": false })),
        &actor.ctx,
    )
    .await;
    Ok(())
}

pub async fn roster(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
) -> Result<Vec<RosterEntry>, AppError> {
    let class = owned_class(state, actor, class_id).await?;
    let enrollments: Vec<Enrollment> = state.store.list_enrollments(class.id).await?;

    let mut entries = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        // Hard-deleted users have no enrollments, so a miss is skipped.
        if let Some(student) = state.store.find_user(enrollment.student_id).await? {
            entries.push(RosterEntry {
                student,
                enrolled_at: enrollment.enrolled_at,
                enrollment_active: enrollment.is_active,
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_are_uppercase_alphanumeric() {
        let code = generate_class_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
