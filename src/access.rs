// src/access.rs

//! Capability resolution.
//!
//! A user's role is turned into a typed permission set exactly once, when
//! the request is authenticated. Services only ever ask the resulting
//! `Capabilities`, never compare role strings themselves.

use crate::{
    audit::RequestContext,
    error::AppError,
    models::{
        class::Class,
        submission::Submission,
        user::{Role, User},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Ignore ownership and enrollment scoping.
    BypassScope,
    ManageUsers,
    ViewAuditLog,
    /// Create classes, quizzes and questions; view their results.
    Author,
    /// Enroll in classes and take quizzes.
    TakeQuizzes,
}

const ADMIN: &[Permission] = &[
    Permission::BypassScope,
    Permission::ManageUsers,
    Permission::ViewAuditLog,
    Permission::Author,
];
const PROFESSOR: &[Permission] = &[Permission::Author];
const STUDENT: &[Permission] = &[Permission::TakeQuizzes];

#[derive(Debug, Clone)]
pub struct Capabilities {
    pub user_id: i64,
    pub role: Role,
    permissions: &'static [Permission],
}

impl Capabilities {
    /// The one place where a role becomes a permission set.
    pub fn resolve(user: &User) -> Self {
        Self::for_role(user.id, user.role)
    }

    pub fn for_role(user_id: i64, role: Role) -> Self {
        let permissions = match role {
            Role::Admin => ADMIN,
            Role::Professor => PROFESSOR,
            Role::Student => STUDENT,
        };
        Self {
            user_id,
            role,
            permissions,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn bypasses_scope(&self) -> bool {
        self.has(Permission::BypassScope)
    }

    /// Authors may only touch classes they own; admins any class.
    pub fn ensure_owns_class(&self, class: &Class) -> Result<(), AppError> {
        self.require(Permission::Author)?;
        if self.bypasses_scope() || class.professor_id == self.user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Students may only act on their own submissions; admins any.
    pub fn ensure_owns_submission(&self, submission: &Submission) -> Result<(), AppError> {
        if self.bypasses_scope() || submission.student_id == self.user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// The authenticated caller of one request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub caps: Capabilities,
    pub ctx: RequestContext,
}

impl Actor {
    pub fn new(caps: Capabilities, ctx: RequestContext) -> Self {
        Self { caps, ctx }
    }

    pub fn id(&self) -> i64 {
        self.caps.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn class_owned_by(professor_id: i64) -> Class {
        Class {
            id: 7,
            name: "Algebra".into(),
            description: None,
            professor_id,
            class_code: "ALG123".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn admin_bypasses_ownership() {
        let admin = Capabilities::for_role(1, Role::Admin);
        assert!(admin.ensure_owns_class(&class_owned_by(99)).is_ok());
        assert!(admin.has(Permission::ManageUsers));
    }

    #[test]
    fn professor_only_owns_own_classes() {
        let prof = Capabilities::for_role(5, Role::Professor);
        assert!(prof.ensure_owns_class(&class_owned_by(5)).is_ok());
        assert!(matches!(
            prof.ensure_owns_class(&class_owned_by(6)),
            Err(AppError::Forbidden)
        ));
        assert!(!prof.has(Permission::ManageUsers));
    }

    #[test]
    fn student_cannot_author() {
        let student = Capabilities::for_role(9, Role::Student);
        assert!(matches!(
            student.ensure_owns_class(&class_owned_by(9)),
            Err(AppError::Forbidden)
        ));
        assert!(student.has(Permission::TakeQuizzes));
    }

    #[test]
    fn submission_ownership() {
        let submission = Submission {
            id: 1,
            student_id: 9,
            quiz_id: 2,
            started_at: Utc::now(),
            submitted_at: None,
            is_completed: false,
            total_score: 0,
            max_score: 1,
            time_taken_minutes: None,
        };
        assert!(Capabilities::for_role(9, Role::Student)
            .ensure_owns_submission(&submission)
            .is_ok());
        assert!(Capabilities::for_role(10, Role::Student)
            .ensure_owns_submission(&submission)
            .is_err());
        assert!(Capabilities::for_role(1, Role::Admin)
            .ensure_owns_submission(&submission)
            .is_ok());
    }
}
