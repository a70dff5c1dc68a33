// src/models/results.rs

use serde::Serialize;

/// Aggregate over the completed submissions of one quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub quiz_id: i64,
    pub title: String,
    pub completed_count: i64,
    pub mean_score: Option<f64>,
    pub mean_percentage: Option<f64>,
    pub questions: Vec<QuestionStat>,
}

/// How one question fared, "poll results" style.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionStat {
    pub question_id: i64,
    pub order_index: i32,
    pub question_text: String,
    pub answered_count: i64,
    pub correct_count: i64,
    /// correct_count / completed_count, 0 when nobody completed.
    pub fraction_correct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub class_id: i64,
    pub name: String,
    pub quiz_count: i64,
    pub completed_count: i64,
    pub mean_percentage: Option<f64>,
    pub quizzes: Vec<ClassQuizLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassQuizLine {
    pub quiz_id: i64,
    pub title: String,
    pub completed_count: i64,
    pub mean_percentage: Option<f64>,
}
