// src/services/results.rs

//! Read-only aggregates over completed submissions.

use chrono::{DateTime, Utc};

use crate::{
    access::Actor,
    error::AppError,
    models::{
        question::Question,
        quiz::Quiz,
        results::{ClassQuizLine, ClassSummary, QuestionStat, QuizSummary},
        submission::{StudentAnswer, Submission},
    },
    services::{
        authoring::{owned_class, owned_quiz},
        lifecycle::auto_expire,
    },
    state::AppState,
};

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { None } else { Some(sum / count as f64) }
}

/// Builds the per-quiz summary from already-loaded rows.
/// `submissions` may contain open ones; only completed ones count.
pub fn summarize_quiz(
    quiz: &Quiz,
    questions: &[Question],
    submissions: &[Submission],
    answers: &[StudentAnswer],
) -> QuizSummary {
    let completed: Vec<&Submission> = submissions.iter().filter(|s| s.is_completed).collect();
    let completed_count = completed.len() as i64;

    let stats = questions
        .iter()
        .map(|q| {
            let for_question = answers.iter().filter(|a| a.question_id == q.id);
            let (answered_count, correct_count) =
                for_question.fold((0i64, 0i64), |(answered, correct), a| {
                    (answered + 1, correct + i64::from(a.is_correct == Some(true)))
                });
            QuestionStat {
                question_id: q.id,
                order_index: q.order_index,
                question_text: q.question_text.clone(),
                answered_count,
                correct_count,
                fraction_correct: if completed_count > 0 {
                    correct_count as f64 / completed_count as f64
                } else {
                    0.0
                },
            }
        })
        .collect();

    QuizSummary {
        quiz_id: quiz.id,
        title: quiz.title.clone(),
        completed_count,
        mean_score: mean(completed.iter().map(|s| f64::from(s.total_score))),
        mean_percentage: mean(completed.iter().filter_map(|s| s.percentage())),
        questions: stats,
    }
}

/// Finalizes every expired open submission of the quiz and returns the
/// current rows.
async fn settled_submissions(
    state: &AppState,
    actor: &Actor,
    quiz: &Quiz,
    now: DateTime<Utc>,
) -> Result<Vec<Submission>, AppError> {
    let rows = state.store.list_submissions_for_quiz(quiz.id).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(auto_expire(state, Some(actor.id()), &actor.ctx, row, quiz, now).await?);
    }
    Ok(out)
}

pub async fn quiz_summary(
    state: &AppState,
    actor: &Actor,
    quiz_id: i64,
    now: DateTime<Utc>,
) -> Result<QuizSummary, AppError> {
    let (quiz, _) = owned_quiz(state, actor, quiz_id).await?;
    let submissions = settled_submissions(state, actor, &quiz, now).await?;
    let questions = state.store.list_questions(quiz.id).await?;
    let answers = state.store.list_completed_answers_for_quiz(quiz.id).await?;

    Ok(summarize_quiz(&quiz, &questions, &submissions, &answers))
}

pub async fn class_summary(
    state: &AppState,
    actor: &Actor,
    class_id: i64,
    now: DateTime<Utc>,
) -> Result<ClassSummary, AppError> {
    let class = owned_class(state, actor, class_id).await?;
    let quizzes = state.store.list_quizzes(class.id).await?;

    let mut lines = Vec::with_capacity(quizzes.len());
    let mut all_percentages = Vec::new();
    for quiz in &quizzes {
        let completed: Vec<Submission> = settled_submissions(state, actor, quiz, now)
            .await?
            .into_iter()
            .filter(|s| s.is_completed)
            .collect();
        let percentages: Vec<f64> = completed.iter().filter_map(|s| s.percentage()).collect();

        lines.push(ClassQuizLine {
            quiz_id: quiz.id,
            title: quiz.title.clone(),
            completed_count: completed.len() as i64,
            mean_percentage: mean(percentages.iter().copied()),
        });
        all_percentages.extend(percentages);
    }

    Ok(ClassSummary {
        class_id: class.id,
        name: class.name,
        quiz_count: quizzes.len() as i64,
        completed_count: lines.iter().map(|l| l.completed_count).sum(),
        mean_percentage: mean(all_percentages.into_iter()),
        quizzes: lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;

    fn quiz() -> Quiz {
        Quiz {
            id: 1,
            class_id: 1,
            professor_id: 1,
            title: "Week 1".into(),
            description: None,
            deadline: Utc::now(),
            time_limit_minutes: 10,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn question(id: i64) -> Question {
        Question {
            id,
            quiz_id: 1,
            question_text: format!("q{}", id),
            question_type: QuestionType::TrueFalse,
            order_index: id as i32,
            points: 1,
            options: vec![],
            created_at: Utc::now(),
        }
    }

    fn submission(id: i64, total: i32, completed: bool) -> Submission {
        Submission {
            id,
            student_id: 10 + id,
            quiz_id: 1,
            started_at: Utc::now(),
            submitted_at: completed.then(Utc::now),
            is_completed: completed,
            total_score: total,
            max_score: 2,
            time_taken_minutes: completed.then_some(3),
        }
    }

    fn answer(submission_id: i64, question_id: i64, correct: bool) -> StudentAnswer {
        StudentAnswer {
            submission_id,
            question_id,
            selected_option_ids: vec![1],
            text_answer: None,
            is_correct: Some(correct),
            points_awarded: i32::from(correct),
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_only_completed_submissions() {
        let summary = summarize_quiz(
            &quiz(),
            &[question(1), question(2)],
            &[submission(1, 2, true), submission(2, 1, true), submission(3, 0, false)],
            &[answer(1, 1, true), answer(1, 2, true), answer(2, 1, false), answer(2, 2, true)],
        );
        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.mean_score, Some(1.5));
        assert_eq!(summary.mean_percentage, Some(75.0));
        assert_eq!(summary.questions[0].correct_count, 1);
        assert_eq!(summary.questions[0].fraction_correct, 0.5);
        assert_eq!(summary.questions[1].answered_count, 2);
        assert_eq!(summary.questions[1].fraction_correct, 1.0);
    }

    #[test]
    fn empty_quiz_has_no_means() {
        let summary = summarize_quiz(&quiz(), &[question(1)], &[], &[]);
        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.mean_score, None);
        assert_eq!(summary.questions[0].fraction_correct, 0.0);
    }
}
