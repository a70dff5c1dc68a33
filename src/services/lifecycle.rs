// src/services/lifecycle.rs

//! Submission lifecycle: start, answer, complete and the lazy auto-expiry
//! that runs on every access. Every operation takes the current time
//! explicitly so expiry is deterministic under test.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;

use crate::{
    access::{Actor, Permission},
    audit::{AuditEvent, RequestContext, record_quietly},
    error::AppError,
    models::{
        question::{Question, QuestionType},
        quiz::Quiz,
        submission::{
            AnswerPayload, AnswerView, Finalization, NewSubmission, StudentAnswer, Submission,
            SubmissionState, SubmissionView,
        },
    },
    services::{
        authoring::ensure_enrolled,
        scoring::{ScoringRules, score_answers},
    },
    state::AppState,
    store::StoreError,
    utils::retry::{RetryConfig, retry_transient},
};

const TABLE: &str = "quiz_submissions";

/// Result of `start`: `resumed` is true when an open attempt was returned.
#[derive(Debug, Serialize)]
pub struct StartOutcome {
    #[serde(flatten)]
    pub submission: Submission,
    pub resumed: bool,
}

fn time_limit(quiz: &Quiz) -> Duration {
    Duration::minutes(i64::from(quiz.time_limit_minutes))
}

/// In progress and past the quiz's time limit.
pub fn is_expired(submission: &Submission, quiz: &Quiz, now: DateTime<Utc>) -> bool {
    !submission.is_completed && now - submission.started_at >= time_limit(quiz)
}

pub fn state_of(submission: &Submission, quiz: &Quiz, now: DateTime<Utc>) -> SubmissionState {
    if submission.is_completed {
        SubmissionState::Completed
    } else if is_expired(submission, quiz, now) {
        SubmissionState::Expired
    } else {
        SubmissionState::InProgress
    }
}

async fn load_submission(state: &AppState, id: i64) -> Result<Submission, AppError> {
    state.store.find_submission(id).await?.ok_or(AppError::NotFound)
}

async fn load_quiz(state: &AppState, id: i64) -> Result<Quiz, AppError> {
    state.store.find_quiz(id).await?.ok_or(AppError::NotFound)
}

/// The owner of a submission keeps access only while actively enrolled in
/// the quiz's class. Admins act on any submission.
async fn ensure_participant(
    state: &AppState,
    actor: &Actor,
    submission: &Submission,
    quiz: &Quiz,
) -> Result<(), AppError> {
    actor.caps.ensure_owns_submission(submission)?;
    if actor.caps.bypasses_scope() {
        return Ok(());
    }
    let class = state
        .store
        .find_class(quiz.class_id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_enrolled(state, actor, &class).await
}

/// Scores the recorded answers and writes the result if the submission is
/// still open. Returns whether this call applied the write.
async fn finalize(
    state: &AppState,
    submission: &Submission,
    quiz: &Quiz,
    submitted_at: DateTime<Utc>,
    time_taken_minutes: i32,
) -> Result<bool, AppError> {
    let rules = ScoringRules::from(&state.config.quiz);
    let questions = state.store.list_questions(quiz.id).await?;
    let answers = state.store.list_answers(submission.id).await?;
    let card = score_answers(&rules, &questions, &answers, submission.max_score);

    let finalization = Finalization {
        submission_id: submission.id,
        submitted_at,
        total_score: card.total_score,
        time_taken_minutes,
        verdicts: card.verdicts,
    };

    let store = &state.store;
    let applied = retry_transient(RetryConfig::default(), || {
        store.finalize_submission(finalization.clone())
    })
    .await?;
    Ok(applied)
}

/// Finalizes an expired submission with the answers recorded so far.
/// Returns the current row, finalized or not.
pub async fn auto_expire(
    state: &AppState,
    actor_id: Option<i64>,
    ctx: &RequestContext,
    submission: Submission,
    quiz: &Quiz,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    if !is_expired(&submission, quiz, now) {
        return Ok(submission);
    }

    let submitted_at = submission.started_at + time_limit(quiz);
    let applied = finalize(state, &submission, quiz, submitted_at, quiz.time_limit_minutes).await?;
    let current = load_submission(state, submission.id).await?;

    if applied {
        tracing::info!(
            "Submission {} expired with score {}/{}",
            current.id,
            current.total_score,
            current.max_score
        );
        record_quietly(
            state.audit.as_ref(),
            AuditEvent::new(actor_id, "SUBMISSION_AUTO_EXPIRE", TABLE)
                .record(current.id)
                .after(json!({
                    "total_score": current.total_score,
                    "max_score": current.max_score,
                    "submitted_at": current.submitted_at,
                })),
            ctx,
        )
        .await;
    }
    Ok(current)
}

/// Starts (or resumes) the caller's attempt at a quiz.
pub async fn start(
    state: &AppState,
    actor: &Actor,
    quiz_id: i64,
    now: DateTime<Utc>,
) -> Result<StartOutcome, AppError> {
    actor.caps.require(Permission::TakeQuizzes)?;
    let student_id = actor.id();

    let quiz = load_quiz(state, quiz_id).await?;
    let class = state
        .store
        .find_class(quiz.class_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let enrolled = state
        .store
        .find_enrollment(class.id, student_id)
        .await?
        .is_some_and(|e| e.is_active);
    if !enrolled {
        return Err(AppError::NotEligible(
            "You are not enrolled in this class".to_string(),
        ));
    }

    // Reloads and retries land here.
    if let Some(open) = state.store.find_open_submission(student_id, quiz.id).await? {
        let current = auto_expire(state, Some(student_id), &actor.ctx, open, &quiz, now).await?;
        if !current.is_completed {
            return Ok(StartOutcome {
                submission: current,
                resumed: true,
            });
        }
    }

    if !class.is_active {
        return Err(AppError::NotEligible("This class is no longer active".to_string()));
    }
    if !quiz.is_active {
        return Err(AppError::NotEligible("This quiz is not open".to_string()));
    }
    if quiz.deadline_passed(now) {
        return Err(AppError::NotEligible("The quiz deadline has passed".to_string()));
    }

    let completed = state
        .store
        .count_completed_submissions(student_id, quiz.id)
        .await?;
    if completed > 0 && !state.config.quiz.allow_retakes {
        return Err(AppError::AlreadyAttempted);
    }

    let rules = ScoringRules::from(&state.config.quiz);
    let questions = state.store.list_questions(quiz.id).await?;
    if questions.is_empty() {
        return Err(AppError::NotEligible("This quiz has no questions".to_string()));
    }
    let new_submission = NewSubmission {
        student_id,
        quiz_id: quiz.id,
        started_at: now,
        max_score: rules.max_score(&questions),
    };

    let store = &state.store;
    let created = retry_transient(RetryConfig::default(), || {
        store.create_submission(new_submission.clone())
    })
    .await;

    match created {
        Ok(submission) => {
            tracing::info!(
                "Student {} started quiz {} (submission {})",
                student_id,
                quiz.id,
                submission.id
            );
            record_quietly(
                state.audit.as_ref(),
                AuditEvent::new(Some(student_id), "SUBMISSION_START", TABLE)
                    .record(submission.id)
                    .after(json!({
                        "quiz_id": quiz.id,
                        "max_score": submission.max_score,
                    })),
                &actor.ctx,
            )
            .await;
            Ok(StartOutcome {
                submission,
                resumed: false,
            })
        }
        // Lost a race against a concurrent start: hand back the winner.
        Err(StoreError::Conflict(_)) => {
            let winner = state
                .store
                .find_open_submission(student_id, quiz.id)
                .await?
                .ok_or(AppError::AlreadyInProgress)?;
            Ok(StartOutcome {
                submission: winner,
                resumed: true,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Checks a payload against the question type and normalizes it.
pub fn validate_answer(question: &Question, payload: &AnswerPayload) -> Result<AnswerPayload, AppError> {
    match question.question_type {
        QuestionType::Text => {
            let text = payload
                .text_answer
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    AppError::ValidationError("A text answer is required".to_string())
                })?;
            if !payload.selected_option_ids.is_empty() {
                return Err(AppError::ValidationError(
                    "Text questions do not take options".to_string(),
                ));
            }
            if text.chars().count() > 2000 {
                return Err(AppError::ValidationError("Answer is too long".to_string()));
            }
            Ok(AnswerPayload {
                selected_option_ids: Vec::new(),
                text_answer: Some(text.to_string()),
            })
        }
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let mut ids = payload.selected_option_ids.clone();
            ids.sort_unstable();
            ids.dedup();

            if ids.is_empty() {
                return Err(AppError::ValidationError(
                    "Select at least one option".to_string(),
                ));
            }
            if let Some(bad) = ids
                .iter()
                .find(|id| !question.options.iter().any(|o| o.id == **id))
            {
                return Err(AppError::ValidationError(format!(
                    "Option {} does not belong to this question",
                    bad
                )));
            }

            // Any non-empty subset is fine for multiple choice, so the payload
            // rule says nothing about how many options are correct.
            if question.question_type == QuestionType::TrueFalse && ids.len() != 1 {
                return Err(AppError::ValidationError(
                    "Select exactly one option".to_string(),
                ));
            }
            Ok(AnswerPayload {
                selected_option_ids: ids,
                text_answer: None,
            })
        }
    }
}

/// Records (or replaces) the answer to one question.
pub async fn record_answer(
    state: &AppState,
    actor: &Actor,
    submission_id: i64,
    question_id: i64,
    payload: AnswerPayload,
    now: DateTime<Utc>,
) -> Result<StudentAnswer, AppError> {
    let submission = load_submission(state, submission_id).await?;
    let quiz = load_quiz(state, submission.quiz_id).await?;
    ensure_participant(state, actor, &submission, &quiz).await?;

    let submission = auto_expire(state, Some(actor.id()), &actor.ctx, submission, &quiz, now).await?;
    if submission.is_completed {
        return Err(AppError::NotInProgress);
    }

    let question = state
        .store
        .find_question(question_id)
        .await?
        .filter(|q| q.quiz_id == quiz.id)
        .ok_or_else(|| {
            AppError::ValidationError("Question is not part of this quiz".to_string())
        })?;
    let payload = validate_answer(&question, &payload)?;

    state
        .store
        .upsert_answer(submission.id, question.id, &payload, now)
        .await?
        .ok_or(AppError::NotInProgress)
}

/// Scores and freezes the submission.
pub async fn complete(
    state: &AppState,
    actor: &Actor,
    submission_id: i64,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    let submission = load_submission(state, submission_id).await?;
    let quiz = load_quiz(state, submission.quiz_id).await?;
    ensure_participant(state, actor, &submission, &quiz).await?;

    let submission = auto_expire(state, Some(actor.id()), &actor.ctx, submission, &quiz, now).await?;
    if submission.is_completed {
        return Err(AppError::AlreadyCompleted(Box::new(submission)));
    }

    let elapsed = (now - submission.started_at).num_minutes();
    let time_taken = elapsed.clamp(0, i64::from(quiz.time_limit_minutes)) as i32;

    let applied = finalize(state, &submission, &quiz, now, time_taken).await?;
    let current = load_submission(state, submission.id).await?;
    if !applied {
        return Err(AppError::AlreadyCompleted(Box::new(current)));
    }

    tracing::info!(
        "Submission {} completed with score {}/{}",
        current.id,
        current.total_score,
        current.max_score
    );
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "SUBMISSION_COMPLETE", TABLE)
            .record(current.id)
            .after(json!({
                "total_score": current.total_score,
                "max_score": current.max_score,
                "time_taken_minutes": current.time_taken_minutes,
            })),
        &actor.ctx,
    )
    .await;
    Ok(current)
}

/// Shows a submission with its answers. The answer key is revealed to the
/// student only once the submission is completed (an expired attempt is
/// finalized first); the owning professor always sees it.
pub async fn view(
    state: &AppState,
    actor: &Actor,
    submission_id: i64,
    now: DateTime<Utc>,
) -> Result<SubmissionView, AppError> {
    let submission = load_submission(state, submission_id).await?;
    let quiz = load_quiz(state, submission.quiz_id).await?;

    let is_author = if actor.caps.ensure_owns_submission(&submission).is_ok() {
        ensure_participant(state, actor, &submission, &quiz).await?;
        actor.caps.bypasses_scope()
    } else {
        let class = state
            .store
            .find_class(quiz.class_id)
            .await?
            .ok_or(AppError::NotFound)?;
        actor.caps.ensure_owns_class(&class)?;
        true
    };

    let submission = auto_expire(state, Some(actor.id()), &actor.ctx, submission, &quiz, now).await?;
    // An open attempt past the deadline can still take answers, so the
    // deadline alone never unlocks the key.
    let reveal = is_author || submission.is_completed;

    let keys: HashMap<i64, Vec<i64>> = if reveal {
        state
            .store
            .list_questions(quiz.id)
            .await?
            .iter()
            .map(|q| (q.id, q.correct_option_ids()))
            .collect()
    } else {
        HashMap::new()
    };

    let answers = state
        .store
        .list_answers(submission.id)
        .await?
        .into_iter()
        .map(|a| AnswerView {
            correct_option_ids: keys.get(&a.question_id).cloned(),
            question_id: a.question_id,
            selected_option_ids: a.selected_option_ids,
            text_answer: a.text_answer,
            is_correct: a.is_correct,
            points_awarded: a.points_awarded,
        })
        .collect();

    Ok(SubmissionView {
        state: state_of(&submission, &quiz, now),
        percentage: submission.percentage(),
        submission,
        answers,
    })
}

/// The caller's own submissions, newest first, with expired ones finalized.
pub async fn list_own(
    state: &AppState,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Vec<Submission>, AppError> {
    let submissions = state.store.list_submissions_for_student(actor.id()).await?;

    let mut out = Vec::with_capacity(submissions.len());
    for submission in submissions {
        if submission.is_completed {
            out.push(submission);
            continue;
        }
        let quiz = load_quiz(state, submission.quiz_id).await?;
        out.push(auto_expire(state, Some(actor.id()), &actor.ctx, submission, &quiz, now).await?);
    }
    out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::AnswerOption;

    fn question(kind: QuestionType, correct: &[bool]) -> Question {
        Question {
            id: 1,
            quiz_id: 1,
            question_text: "?".into(),
            question_type: kind,
            order_index: 0,
            points: 1,
            options: correct
                .iter()
                .enumerate()
                .map(|(i, c)| AnswerOption {
                    id: 10 + i as i64,
                    question_id: 1,
                    option_text: format!("opt {}", i),
                    order_index: i as i32,
                    is_correct: *c,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    fn picks(ids: &[i64]) -> AnswerPayload {
        AnswerPayload {
            selected_option_ids: ids.to_vec(),
            text_answer: None,
        }
    }

    #[test]
    fn true_false_takes_one_option() {
        let tf = question(QuestionType::TrueFalse, &[true, false]);
        assert!(validate_answer(&tf, &picks(&[10])).is_ok());
        assert!(validate_answer(&tf, &picks(&[10, 11])).is_err());
    }

    #[test]
    fn payload_rule_does_not_reveal_the_number_of_correct_options() {
        let single = question(QuestionType::MultipleChoice, &[true, false, false]);
        let multi = question(QuestionType::MultipleChoice, &[true, true, false]);
        for q in [&single, &multi] {
            assert!(validate_answer(q, &picks(&[10])).is_ok());
            assert!(validate_answer(q, &picks(&[10, 11])).is_ok());
        }
    }

    #[test]
    fn multi_select_accepts_several_options() {
        let q = question(QuestionType::MultipleChoice, &[true, false, true]);
        let normalized = validate_answer(&q, &picks(&[12, 10, 12])).unwrap();
        assert_eq!(normalized.selected_option_ids, vec![10, 12]);
    }

    #[test]
    fn foreign_option_ids_are_rejected() {
        let q = question(QuestionType::MultipleChoice, &[true, false]);
        assert!(matches!(
            validate_answer(&q, &picks(&[99])),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn text_questions_need_text() {
        let q = question(QuestionType::Text, &[true]);
        assert!(validate_answer(&q, &AnswerPayload::default()).is_err());
        assert!(validate_answer(&q, &picks(&[10])).is_err());
        let ok = validate_answer(
            &q,
            &AnswerPayload {
                selected_option_ids: vec![],
                text_answer: Some("  Paris ".into()),
            },
        )
        .unwrap();
        assert_eq!(ok.text_answer.as_deref(), Some("Paris"));
    }

    #[test]
    fn expiry_is_inclusive_of_the_limit() {
        let started = Utc::now();
        let quiz = Quiz {
            id: 1,
            class_id: 1,
            professor_id: 1,
            title: "t".into(),
            description: None,
            deadline: started + Duration::days(1),
            time_limit_minutes: 10,
            is_active: true,
            created_at: started,
        };
        let submission = Submission {
            id: 1,
            student_id: 2,
            quiz_id: 1,
            started_at: started,
            submitted_at: None,
            is_completed: false,
            total_score: 0,
            max_score: 1,
            time_taken_minutes: None,
        };
        assert_eq!(
            state_of(&submission, &quiz, started + Duration::minutes(9)),
            SubmissionState::InProgress
        );
        assert_eq!(
            state_of(&submission, &quiz, started + Duration::minutes(10)),
            SubmissionState::Expired
        );
    }
}
