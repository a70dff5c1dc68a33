// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Text,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Text => "text",
        }
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "text" => Ok(QuestionType::Text),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Represents the 'questions' table, joined with its answer options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,

    /// Caller-supplied display position. Ties fall back to `id`.
    pub order_index: i32,

    /// Weight used when weighted scoring is enabled.
    pub points: i32,

    pub options: Vec<AnswerOption>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    /// Ids of the options flagged correct, ascending.
    pub fn correct_option_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Represents the 'answer_options' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub order_index: i32,
    pub is_correct: bool,
}

/// DTO for sending question to a student (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub order_index: i32,
    pub points: i32,
    /// Empty for text questions so accepted answers stay hidden.
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub option_text: String,
    pub order_index: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let options = match q.question_type {
            QuestionType::Text => Vec::new(),
            _ => q
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    option_text: o.option_text.clone(),
                    order_index: o.order_index,
                })
                .collect(),
        };

        PublicQuestion {
            id: q.id,
            question_text: q.question_text.clone(),
            question_type: q.question_type,
            order_index: q.order_index,
            points: q.points,
            options,
        }
    }
}

/// Sorts questions and their options ascending by order, then insertion.
pub fn sort_for_display(questions: &mut [Question]) {
    questions.sort_by_key(|q| (q.order_index, q.id));
    for q in questions.iter_mut() {
        q.options.sort_by_key(|o| (o.order_index, o.id));
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub order_index: i32,
    pub points: i32,
    pub options: Vec<NewAnswerOption>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAnswerOption {
    #[validate(length(min = 1, max = 500))]
    pub option_text: String,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for adding a question to a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub order_index: i32,
    #[validate(range(min = 1, max = 100))]
    pub points: Option<i32>,
    #[validate(nested)]
    #[serde(default)]
    pub options: Vec<NewAnswerOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: i64, order: i32, correct: bool) -> AnswerOption {
        AnswerOption {
            id,
            question_id: 1,
            option_text: format!("opt {}", id),
            order_index: order,
            is_correct: correct,
        }
    }

    fn question(id: i64, order: i32, kind: QuestionType, options: Vec<AnswerOption>) -> Question {
        Question {
            id,
            quiz_id: 1,
            question_text: format!("q {}", id),
            question_type: kind,
            order_index: order,
            points: 1,
            options,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn display_order_breaks_ties_by_insertion() {
        let mut qs = vec![
            question(3, 1, QuestionType::Text, vec![]),
            question(1, 2, QuestionType::Text, vec![]),
            question(2, 1, QuestionType::Text, vec![]),
        ];
        sort_for_display(&mut qs);
        let ids: Vec<i64> = qs.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn public_question_hides_answer_key() {
        let q = question(
            1,
            0,
            QuestionType::MultipleChoice,
            vec![option(10, 0, true), option(11, 1, false)],
        );
        let json = serde_json::to_value(PublicQuestion::from(&q)).unwrap();
        assert!(!json.to_string().contains("is_correct"));
        assert_eq!(json["options"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn public_text_question_has_no_options() {
        let q = question(1, 0, QuestionType::Text, vec![option(10, 0, true)]);
        assert!(PublicQuestion::from(&q).options.is_empty());
    }

    #[test]
    fn correct_option_ids_are_sorted() {
        let q = question(
            1,
            0,
            QuestionType::MultipleChoice,
            vec![option(12, 0, true), option(10, 1, true), option(11, 2, false)],
        );
        assert_eq!(q.correct_option_ids(), vec![10, 12]);
    }
}
