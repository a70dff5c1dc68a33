// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::{PublicQuestion, Question};

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub class_id: i64,
    pub professor_id: i64,
    pub title: String,
    pub description: Option<String>,

    /// No new attempt may start after this instant.
    pub deadline: DateTime<Utc>,

    /// Length of one attempt. Attempts past this are expired.
    pub time_limit_minutes: i32,

    /// Drafts are inactive; activation needs at least one question.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub class_id: i64,
    pub professor_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub time_limit_minutes: i32,
}

/// Partial update applied by `Store::update_quiz`.
#[derive(Debug, Clone, Default)]
pub struct QuizChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub time_limit_minutes: Option<i32>,
}

impl QuizChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.time_limit_minutes.is_none()
    }
}

/// DTO for creating a new quiz draft.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: i32,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
}

/// Author view: includes the answer key.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// Student view: questions without `is_correct`.
#[derive(Debug, Serialize)]
pub struct StudentQuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}
