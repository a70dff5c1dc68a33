// src/store/mod.rs

//! Persistence gateway.
//!
//! Every component receives a `&dyn Store` instead of reaching for a global
//! pool. Operations that must preserve a multi-row invariant (user bootstrap,
//! question + options, submission creation and finalization) are single
//! calls so each implementation can run them in one transaction.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    audit_log::{AuditLog, AuditLogFilter, NewAuditLog},
    class::{Class, Enrollment, NewClass},
    question::{NewQuestion, Question},
    quiz::{NewQuiz, Quiz, QuizChanges},
    stats::{ActivityCount, ClassStanding, DashboardCounts},
    submission::{AnswerPayload, Finalization, NewSubmission, StudentAnswer, Submission},
    user::{NewUser, Role, User, UserDetails},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    Conflict(String),
    /// Lock contention, serialization failure or a dropped connection.
    /// Safe to retry.
    Transient(String),
    Other(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "conflict: {}", msg),
            StoreError::Transient(msg) => write!(f, "transient failure: {}", msg),
            StoreError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation
                Some("23505") => StoreError::Conflict(db.message().to_string()),
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => {
                    StoreError::Transient(db.message().to_string())
                }
                _ => StoreError::Other(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::Transient(err.to_string())
            }
            _ => StoreError::Other(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which classes a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassScope {
    All,
    OwnedBy(i64),
    /// Classes where the student has an active enrollment.
    EnrolledStudent(i64),
}

#[async_trait]
pub trait Store: Send + Sync {
    // ---- users ----

    /// Inserts a user. The very first user becomes admin, everybody else a
    /// student; the check and insert are atomic.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    /// Looks a user up by username or email (both stored lowercased).
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
    /// Overwrites the editable columns. `StoreError::Conflict` when the
    /// username or email belongs to another user.
    async fn update_user_details(&self, id: i64, details: UserDetails)
    -> StoreResult<Option<User>>;
    async fn update_user_role(&self, id: i64, role: Role) -> StoreResult<bool>;
    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<bool>;
    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<bool>;
    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;
    /// True when the user owns classes, authored quizzes, or has enrollments
    /// or submissions.
    async fn user_has_dependents(&self, id: i64) -> StoreResult<bool>;
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;

    // ---- classes ----

    async fn create_class(&self, class: NewClass) -> StoreResult<Class>;
    async fn find_class(&self, id: i64) -> StoreResult<Option<Class>>;
    async fn find_class_by_code(&self, code: &str) -> StoreResult<Option<Class>>;
    async fn list_classes(&self, scope: ClassScope) -> StoreResult<Vec<Class>>;
    /// Creates the enrollment or reactivates a removed one.
    async fn enroll(&self, class_id: i64, student_id: i64, at: DateTime<Utc>)
    -> StoreResult<Enrollment>;
    async fn set_enrollment_active(
        &self,
        class_id: i64,
        student_id: i64,
        active: bool,
    ) -> StoreResult<bool>;
    async fn find_enrollment(&self, class_id: i64, student_id: i64)
    -> StoreResult<Option<Enrollment>>;
    async fn list_enrollments(&self, class_id: i64) -> StoreResult<Vec<Enrollment>>;

    // ---- quizzes ----

    /// Inserts an inactive draft.
    async fn create_quiz(&self, quiz: NewQuiz) -> StoreResult<Quiz>;
    async fn find_quiz(&self, id: i64) -> StoreResult<Option<Quiz>>;
    async fn list_quizzes(&self, class_id: i64) -> StoreResult<Vec<Quiz>>;
    async fn update_quiz(&self, id: i64, changes: QuizChanges) -> StoreResult<Option<Quiz>>;
    async fn set_quiz_active(&self, id: i64, active: bool) -> StoreResult<bool>;
    /// Inserts a question together with its options.
    async fn add_question(&self, question: NewQuestion) -> StoreResult<Question>;
    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>>;
    async fn delete_question(&self, id: i64) -> StoreResult<bool>;
    /// Questions of a quiz in display order, options included and sorted.
    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>>;

    // ---- submissions ----

    /// Fails with `StoreError::Conflict` when the student already has an
    /// in-progress submission for the quiz.
    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission>;
    async fn find_submission(&self, id: i64) -> StoreResult<Option<Submission>>;
    async fn find_open_submission(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> StoreResult<Option<Submission>>;
    async fn count_completed_submissions(&self, student_id: i64, quiz_id: i64)
    -> StoreResult<i64>;
    async fn list_submissions_for_student(&self, student_id: i64) -> StoreResult<Vec<Submission>>;
    async fn list_submissions_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Submission>>;
    /// Last write wins. Returns `None` without writing when the submission
    /// is already completed.
    async fn upsert_answer(
        &self,
        submission_id: i64,
        question_id: i64,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<StudentAnswer>>;
    async fn list_answers(&self, submission_id: i64) -> StoreResult<Vec<StudentAnswer>>;
    /// Answers belonging to completed submissions of the quiz.
    async fn list_completed_answers_for_quiz(&self, quiz_id: i64)
    -> StoreResult<Vec<StudentAnswer>>;
    /// Freezes score and verdicts if the submission is still open.
    /// Returns `false`, writing nothing, when it was already completed.
    async fn finalize_submission(&self, finalization: Finalization) -> StoreResult<bool>;

    // ---- dashboard ----

    /// Counts over active rows; `week_ago` bounds recent logins and
    /// `month_ago` recent registrations.
    async fn dashboard_counts(
        &self,
        week_ago: DateTime<Utc>,
        month_ago: DateTime<Utc>,
    ) -> StoreResult<DashboardCounts>;
    /// Audit entries since `since`, grouped by action, busiest first.
    async fn recent_activity(&self, since: DateTime<Utc>, limit: i64)
    -> StoreResult<Vec<ActivityCount>>;
    /// Active classes with completed submissions, best mean percentage first.
    async fn top_classes(&self, limit: i64) -> StoreResult<Vec<ClassStanding>>;

    // ---- audit ----

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()>;
    /// Newest first.
    async fn list_audit_logs(&self, filter: &AuditLogFilter, limit: i64)
    -> StoreResult<Vec<AuditLog>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }
}
