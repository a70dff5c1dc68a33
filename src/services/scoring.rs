// src/services/scoring.rs

//! Pure scoring rules. No I/O: the lifecycle feeds in the current questions
//! and the stored answers and writes the resulting scorecard back.

use std::{collections::HashMap, str::FromStr};

use crate::{
    config::QuizPolicy,
    models::{
        question::{Question, QuestionType},
        submission::{AnswerVerdict, StudentAnswer},
    },
};

/// How free-text answers are compared against accepted answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMatch {
    /// Trimmed and lowercased on both sides.
    #[default]
    CaseInsensitive,
    Exact,
}

impl FromStr for TextMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "case_insensitive" => Ok(TextMatch::CaseInsensitive),
            "exact" => Ok(TextMatch::Exact),
            other => Err(format!("unknown text match policy '{}'", other)),
        }
    }
}

impl TextMatch {
    fn matches(&self, given: &str, accepted: &str) -> bool {
        match self {
            TextMatch::Exact => given == accepted,
            TextMatch::CaseInsensitive => given.trim().to_lowercase() == accepted.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringRules {
    pub weighted: bool,
    pub text_match: TextMatch,
}

impl From<&QuizPolicy> for ScoringRules {
    fn from(policy: &QuizPolicy) -> Self {
        Self {
            weighted: policy.weighted_scoring,
            text_match: policy.text_match,
        }
    }
}

impl ScoringRules {
    pub fn points_for(&self, question: &Question) -> i32 {
        if self.weighted {
            question.points.max(0)
        } else {
            1
        }
    }

    /// Total achievable points for a question set.
    pub fn max_score(&self, questions: &[Question]) -> i32 {
        questions.iter().map(|q| self.points_for(q)).sum()
    }

    /// Full credit only for exactly the correct option set, or for a text
    /// answer matching one of the accepted answers.
    pub fn is_correct(&self, question: &Question, answer: &StudentAnswer) -> bool {
        match question.question_type {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                let correct = question.correct_option_ids();
                if correct.is_empty() {
                    return false;
                }
                let mut selected = answer.selected_option_ids.clone();
                selected.sort_unstable();
                selected.dedup();
                selected == correct
            }
            QuestionType::Text => match answer.text_answer.as_deref() {
                Some(given) if !given.trim().is_empty() => question
                    .options
                    .iter()
                    .filter(|o| o.is_correct)
                    .any(|o| self.text_match.matches(given, &o.option_text)),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub total_score: i32,
    pub verdicts: Vec<AnswerVerdict>,
}

/// Scores every stored answer against the current question set.
///
/// Answers to questions that no longer exist get a `None` verdict and no
/// points. The total never exceeds `max_score`, which was frozen at start.
pub fn score_answers(
    rules: &ScoringRules,
    questions: &[Question],
    answers: &[StudentAnswer],
    max_score: i32,
) -> Scorecard {
    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    let mut total = 0;
    let mut verdicts = Vec::with_capacity(answers.len());
    for answer in answers {
        let verdict = match by_id.get(&answer.question_id) {
            Some(question) => {
                let correct = rules.is_correct(question, answer);
                let points = if correct { rules.points_for(question) } else { 0 };
                total += points;
                AnswerVerdict {
                    question_id: answer.question_id,
                    is_correct: Some(correct),
                    points_awarded: points,
                }
            }
            None => AnswerVerdict {
                question_id: answer.question_id,
                is_correct: None,
                points_awarded: 0,
            },
        };
        verdicts.push(verdict);
    }

    Scorecard {
        total_score: total.min(max_score),
        verdicts,
    }
}
