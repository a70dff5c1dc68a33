// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'quiz_submissions' table: one student's attempt at one quiz.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub student_id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub total_score: i32,

    /// Frozen when the attempt starts.
    pub max_score: i32,
    pub time_taken_minutes: Option<i32>,
}

impl Submission {
    /// Score as a percentage of `max_score`, `None` when nothing was achievable.
    pub fn percentage(&self) -> Option<f64> {
        if self.max_score > 0 {
            Some(self.total_score as f64 / self.max_score as f64 * 100.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: i64,
    pub quiz_id: i64,
    pub started_at: DateTime<Utc>,
    pub max_score: i32,
}

/// Represents the 'student_answers' table. Unique per (submission, question).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub submission_id: i64,
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
    pub text_answer: Option<String>,

    /// `None` until the submission is finalized.
    pub is_correct: Option<bool>,
    pub points_awarded: i32,
    pub answered_at: DateTime<Utc>,
}

/// What a student sends for one question.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerPayload {
    #[serde(default)]
    pub selected_option_ids: Vec<i64>,
    pub text_answer: Option<String>,
}

/// Scoring result for one stored answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerVerdict {
    pub question_id: i64,
    /// `None` for answers whose question no longer exists.
    pub is_correct: Option<bool>,
    pub points_awarded: i32,
}

/// Everything `Store::finalize_submission` writes in one transaction.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub submission_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub total_score: i32,
    pub time_taken_minutes: i32,
    pub verdicts: Vec<AnswerVerdict>,
}

/// Lifecycle state derived from a row and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    InProgress,
    Expired,
    Completed,
}

/// One answer as shown back to the student.
#[derive(Debug, Serialize)]
pub struct AnswerView {
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
    pub text_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: i32,
    /// Only filled once the answer key may be revealed.
    pub correct_option_ids: Option<Vec<i64>>,
}

/// A submission with its answers, as returned by the API.
#[derive(Debug, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub state: SubmissionState,
    pub percentage: Option<f64>,
    pub answers: Vec<AnswerView>,
}
