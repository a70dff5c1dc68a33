// src/services/authoring.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::{
    access::{Actor, Permission},
    audit::{AuditEvent, record_quietly},
    error::AppError,
    models::{
        class::Class,
        question::{
            CreateQuestionRequest, NewAnswerOption, NewQuestion, PublicQuestion, Question,
            QuestionType,
        },
        quiz::{
            CreateQuizRequest, NewQuiz, Quiz, QuizChanges, QuizDetail, StudentQuizView,
            UpdateQuizRequest,
        },
    },
    state::AppState,
    utils::html::{clean_html, clean_optional},
};

/// A quiz as the caller is allowed to see it.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuizView {
    Author(QuizDetail),
    Student(StudentQuizView),
}

/// Loads a class the caller may author in.
pub(crate) async fn owned_class(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
) -> Result<Class, AppError> {
    let class = state
        .store
        .find_class(class_id)
        .await?
        .ok_or(AppError::NotFound)?;
    actor.caps.ensure_owns_class(&class)?;
    Ok(class)
}

/// Loads a quiz whose class the caller owns.
pub(crate) async fn owned_quiz(
    state: &AppState,
    actor: &Actor,
    quiz_id: i64,
) -> Result<(Quiz, Class), AppError> {
    let quiz = state
        .store
        .find_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let class = owned_class(state, actor, quiz.class_id).await?;
    Ok((quiz, class))
}

fn check_time_limit(state: &AppState, minutes: i32) -> Result<(), AppError> {
    let max = state.config.quiz.max_time_minutes;
    if !(1..=max).contains(&minutes) {
        return Err(AppError::ValidationError(format!(
            "Time limit must be between 1 and {} minutes",
            max
        )));
    }
    Ok(())
}

fn check_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppError> {
    if deadline <= now {
        return Err(AppError::ValidationError(
            "Deadline must be in the future".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_quiz(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
    req: CreateQuizRequest,
    now: DateTime<Utc>,
) -> Result<Quiz, AppError> {
    let class = owned_class(state, actor, class_id).await?;
    check_time_limit(state, req.time_limit_minutes)?;
    check_deadline(req.deadline, now)?;

    let quiz = state
        .store
        .create_quiz(NewQuiz {
            class_id: class.id,
            professor_id: actor.id(),
            title: clean_html(req.title.trim()),
            description: clean_optional(req.description.as_deref()),
            deadline: req.deadline,
            time_limit_minutes: req.time_limit_minutes,
        })
        .await?;

    tracing::info!("Quiz {} created in class {}", quiz.id, class.id);
    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "QUIZ_CREATE", "quizzes")
            .record(quiz.id)
            .after(json!({ "title": quiz.title, "class_id": quiz.class_id })),
        &actor.ctx,
    )
    .await;
    Ok(quiz)
}

pub async fn update_quiz(
    state: &AppState,
    actor: &Actor,
    quiz_id: i64,
    req: UpdateQuizRequest,
    now: DateTime<Utc>,
) -> Result<Quiz, AppError> {
    let (before, _) = owned_quiz(state, actor, quiz_id).await?;

    if let Some(minutes) = req.time_limit_minutes {
        check_time_limit(state, minutes)?;
    }
    if let Some(deadline) = req.deadline {
        check_deadline(deadline, now)?;
    }

    let changes = QuizChanges {
        title: req.title.as_deref().map(|t| clean_html(t.trim())),
        description: clean_optional(req.description.as_deref()),
        deadline: req.deadline,
        time_limit_minutes: req.time_limit_minutes,
    };
    if changes.is_empty() {
        return Err(AppError::ValidationError("No fields to update".to_string()));
    }

    let after = state
        .store
        .update_quiz(quiz_id, changes)
        .await?
        .ok_or(AppError::NotFound)?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "QUIZ_UPDATE", "quizzes")
            .record(quiz_id)
            .before(serde_json::to_value(&before)?)
            .after(serde_json::to_value(&after)?),
        &actor.ctx,
    )
    .await;
    Ok(after)
}

/// Opens a draft for students. Needs at least one question.
pub async fn activate(state: &AppState, actor: &Actor, quiz_id: i64) -> Result<Quiz, AppError> {
    let (quiz, _) = owned_quiz(state, actor, quiz_id).await?;

    if state.store.list_questions(quiz.id).await?.is_empty() {
        return Err(AppError::ValidationError(
            "A quiz needs at least one question before it can be activated".to_string(),
        ));
    }
    set_active(state, actor, quiz, true, "QUIZ_ACTIVATE").await
}

pub async fn deactivate(state: &AppState, actor: &Actor, quiz_id: i64) -> Result<Quiz, AppError> {
    let (quiz, _) = owned_quiz(state, actor, quiz_id).await?;
    set_active(state, actor, quiz, false, "QUIZ_DEACTIVATE").await
}

async fn set_active(
    state: &AppState,
    actor: &Actor,
    mut quiz: Quiz,
    active: bool,
    action: &'static str,
) -> Result<Quiz, AppError> {
    if !state.store.set_quiz_active(quiz.id, active).await? {
        return Err(AppError::NotFound);
    }
    let was_active = quiz.is_active;
    quiz.is_active = active;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), action, "quizzes")
            .record(quiz.id)
            .before(json!({ "is_active": was_active }))
            .after(json!({ "is_active": active })),
        &actor.ctx,
    )
    .await;
    Ok(quiz)
}

/// Structural rules per question type.
pub fn validate_question_shape(
    kind: QuestionType,
    options: &[NewAnswerOption],
) -> Result<(), AppError> {
    let correct = options.iter().filter(|o| o.is_correct).count();
    let fail = |msg: &str| -> Result<(), AppError> { Err(AppError::ValidationError(msg.to_string())) };

    match kind {
        QuestionType::MultipleChoice if options.len() < 2 => {
            fail("Multiple choice questions need at least two options")
        }
        QuestionType::MultipleChoice if correct == 0 => {
            fail("Mark at least one option as correct")
        }
        QuestionType::TrueFalse if options.len() != 2 || correct != 1 => {
            fail("True/false questions need exactly two options, one of them correct")
        }
        QuestionType::Text if correct == 0 => {
            fail("Text questions need at least one accepted answer")
        }
        _ => Ok(()),
    }
}

pub async fn add_question(
    state: &AppState,
    actor: &Actor,
    quiz_id: i64,
    req: CreateQuestionRequest,
) -> Result<Question, AppError> {
    let (quiz, _) = owned_quiz(state, actor, quiz_id).await?;

    let question_text = clean_html(req.question_text.trim());
    if question_text.is_empty() {
        return Err(AppError::ValidationError(
            "Question text must not be empty".to_string(),
        ));
    }
    validate_question_shape(req.question_type, &req.options)?;

    let existing = state.store.list_questions(quiz.id).await?.len();
    if existing >= state.config.quiz.max_questions {
        return Err(AppError::ValidationError(format!(
            "A quiz may have at most {} questions",
            state.config.quiz.max_questions
        )));
    }

    // Accepted text answers are compared verbatim with what students type.
    let sanitize = req.question_type != QuestionType::Text;
    let options = req
        .options
        .into_iter()
        .map(|o| NewAnswerOption {
            option_text: if sanitize {
                clean_html(o.option_text.trim())
            } else {
                o.option_text.trim().to_string()
            },
            ..o
        })
        .collect();

    let question = state
        .store
        .add_question(NewQuestion {
            quiz_id: quiz.id,
            question_text,
            question_type: req.question_type,
            order_index: req.order_index,
            points: req.points.unwrap_or(1),
            options,
        })
        .await?;

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "QUESTION_ADD", "questions")
            .record(question.id)
            .after(json!({
                "quiz_id": quiz.id,
                "question_type": question.question_type.as_str(),
            })),
        &actor.ctx,
    )
    .await;
    Ok(question)
}

/// Existing submissions keep their frozen `max_score`. An active quiz
/// keeps at least one question; deactivate it first to empty it.
pub async fn delete_question(
    state: &AppState,
    actor: &Actor,
    question_id: i64,
) -> Result<(), AppError> {
    let question = state
        .store
        .find_question(question_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let (quiz, _) = owned_quiz(state, actor, question.quiz_id).await?;

    if quiz.is_active && state.store.list_questions(quiz.id).await?.len() <= 1 {
        return Err(AppError::ValidationError(
            "An active quiz needs at least one question; deactivate it first".to_string(),
        ));
    }

    if !state.store.delete_question(question.id).await? {
        return Err(AppError::NotFound);
    }

    record_quietly(
        state.audit.as_ref(),
        AuditEvent::new(Some(actor.id()), "QUESTION_DELETE", "questions")
            .record(question.id)
            .before(serde_json::to_value(&question)?),
        &actor.ctx,
    )
    .await;
    Ok(())
}

/// Authors get the answer key; enrolled students get an active quiz without it.
pub async fn view_quiz(state: &AppState, actor: &Actor, quiz_id: i64) -> Result<QuizView, AppError> {
    let quiz = state
        .store
        .find_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let class = state
        .store
        .find_class(quiz.class_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if actor.caps.has(Permission::Author) {
        actor.caps.ensure_owns_class(&class)?;
        let questions = state.store.list_questions(quiz.id).await?;
        return Ok(QuizView::Author(QuizDetail { quiz, questions }));
    }

    ensure_enrolled(state, actor, &class).await?;
    if !quiz.is_active {
        return Err(AppError::NotFound);
    }
    let questions = state
        .store
        .list_questions(quiz.id)
        .await?
        .iter()
        .map(PublicQuestion::from)
        .collect();
    Ok(QuizView::Student(StudentQuizView { quiz, questions }))
}

/// Owners see drafts too; enrolled students only active quizzes.
pub async fn list_class_quizzes(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
) -> Result<Vec<Quiz>, AppError> {
    let class = state
        .store
        .find_class(class_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let quizzes = state.store.list_quizzes(class.id).await?;
    if actor.caps.has(Permission::Author) {
        actor.caps.ensure_owns_class(&class)?;
        return Ok(quizzes);
    }

    ensure_enrolled(state, actor, &class).await?;
    Ok(quizzes.into_iter().filter(|q| q.is_active).collect())
}

pub(crate) async fn ensure_enrolled(
    state: &AppState,
    actor: &Actor,
    class: &Class,
) -> Result<(), AppError> {
    actor.caps.require(Permission::TakeQuizzes)?;
    let active = state
        .store
        .find_enrollment(class.id, actor.id())
        .await?
        .is_some_and(|e| e.is_active);
    if active { Ok(()) } else { Err(AppError::Forbidden) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(correct: bool) -> NewAnswerOption {
        NewAnswerOption {
            option_text: "x".into(),
            order_index: 0,
            is_correct: correct,
        }
    }

    #[test]
    fn choice_questions_need_two_options_and_a_correct_one() {
        let kind = QuestionType::MultipleChoice;
        assert!(validate_question_shape(kind, &[opt(true)]).is_err());
        assert!(validate_question_shape(kind, &[opt(false), opt(false)]).is_err());
        assert!(validate_question_shape(kind, &[opt(true), opt(true), opt(false)]).is_ok());
    }

    #[test]
    fn true_false_is_strict() {
        let kind = QuestionType::TrueFalse;
        assert!(validate_question_shape(kind, &[opt(true), opt(false)]).is_ok());
        assert!(validate_question_shape(kind, &[opt(true), opt(true)]).is_err());
        assert!(validate_question_shape(kind, &[opt(true), opt(false), opt(false)]).is_err());
    }

    #[test]
    fn text_needs_an_accepted_answer() {
        assert!(validate_question_shape(QuestionType::Text, &[]).is_err());
        assert!(validate_question_shape(QuestionType::Text, &[opt(true)]).is_ok());
    }
}
