// src/store/memory.rs

//! In-process store backed by plain collections behind one async mutex.
//!
//! Holding the lock for a whole call gives every operation the same
//! all-or-nothing behaviour the Postgres store gets from transactions.
//! Used when no `DATABASE_URL` is configured and by the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ClassScope, Store, StoreError, StoreResult};
use crate::models::{
    audit_log::{AuditLog, AuditLogFilter, NewAuditLog},
    class::{Class, Enrollment, NewClass},
    question::{AnswerOption, NewQuestion, Question, sort_for_display},
    quiz::{NewQuiz, Quiz, QuizChanges},
    stats::{ActivityCount, ClassStanding, DashboardCounts},
    submission::{AnswerPayload, Finalization, NewSubmission, StudentAnswer, Submission},
    user::{NewUser, Role, User, UserDetails},
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    classes: Vec<Class>,
    enrollments: Vec<Enrollment>,
    quizzes: Vec<Quiz>,
    questions: Vec<Question>,
    submissions: Vec<Submission>,
    answers: HashMap<(i64, i64), StudentAnswer>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        if t
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict(
                "username or email already taken".to_string(),
            ));
        }

        let role = if t.users.is_empty() {
            Role::Admin
        } else {
            Role::Student
        };
        let row = User {
            id: t.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t
            .users
            .iter()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        let t = self.tables.lock().await;
        let mut users: Vec<User> = t
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(users)
    }

    async fn update_user_details(
        &self,
        id: i64,
        details: UserDetails,
    ) -> StoreResult<Option<User>> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| {
            u.id != id && (u.username == details.username || u.email == details.email)
        }) {
            return Err(StoreError::Conflict(
                "username or email already taken".to_string(),
            ));
        }
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.username = details.username;
            u.email = details.email;
            u.first_name = details.first_name;
            u.last_name = details.last_name;
            u.clone()
        }))
    }

    async fn update_user_role(&self, id: i64, role: Role) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.role = role;
                true
            }
            None => false,
        })
    }

    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.is_active = active;
                true
            }
            None => false,
        })
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(match t.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.last_login = Some(at);
        }
        Ok(())
    }

    async fn user_has_dependents(&self, id: i64) -> StoreResult<bool> {
        let t = self.tables.lock().await;
        Ok(t.classes.iter().any(|c| c.professor_id == id)
            || t.quizzes.iter().any(|q| q.professor_id == id)
            || t.enrollments.iter().any(|e| e.student_id == id)
            || t.submissions.iter().any(|s| s.student_id == id))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        Ok(t.users.len() != before)
    }

    async fn create_class(&self, class: NewClass) -> StoreResult<Class> {
        let mut t = self.tables.lock().await;
        if t.classes.iter().any(|c| c.class_code == class.class_code) {
            return Err(StoreError::Conflict("class code already in use".to_string()));
        }
        let row = Class {
            id: t.next_id(),
            name: class.name,
            description: class.description,
            professor_id: class.professor_id,
            class_code: class.class_code,
            is_active: true,
            created_at: Utc::now(),
        };
        t.classes.push(row.clone());
        Ok(row)
    }

    async fn find_class(&self, id: i64) -> StoreResult<Option<Class>> {
        let t = self.tables.lock().await;
        Ok(t.classes.iter().find(|c| c.id == id).cloned())
    }

    async fn find_class_by_code(&self, code: &str) -> StoreResult<Option<Class>> {
        let t = self.tables.lock().await;
        Ok(t.classes.iter().find(|c| c.class_code == code).cloned())
    }

    async fn list_classes(&self, scope: ClassScope) -> StoreResult<Vec<Class>> {
        let t = self.tables.lock().await;
        let mut classes: Vec<Class> = t
            .classes
            .iter()
            .filter(|c| match scope {
                ClassScope::All => true,
                ClassScope::OwnedBy(pid) => c.professor_id == pid,
                ClassScope::EnrolledStudent(sid) => t
                    .enrollments
                    .iter()
                    .any(|e| e.class_id == c.id && e.student_id == sid && e.is_active),
            })
            .cloned()
            .collect();
        classes.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(classes)
    }

    async fn enroll(
        &self,
        class_id: i64,
        student_id: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<Enrollment> {
        let mut t = self.tables.lock().await;
        if let Some(e) = t
            .enrollments
            .iter_mut()
            .find(|e| e.class_id == class_id && e.student_id == student_id)
        {
            if !e.is_active {
                e.is_active = true;
                e.enrolled_at = at;
            }
            return Ok(e.clone());
        }
        let row = Enrollment {
            class_id,
            student_id,
            is_active: true,
            enrolled_at: at,
        };
        t.enrollments.push(row.clone());
        Ok(row)
    }

    async fn set_enrollment_active(
        &self,
        class_id: i64,
        student_id: i64,
        active: bool,
    ) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(
            match t
                .enrollments
                .iter_mut()
                .find(|e| e.class_id == class_id && e.student_id == student_id)
            {
                Some(e) => {
                    e.is_active = active;
                    true
                }
                None => false,
            },
        )
    }

    async fn find_enrollment(
        &self,
        class_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        let t = self.tables.lock().await;
        Ok(t
            .enrollments
            .iter()
            .find(|e| e.class_id == class_id && e.student_id == student_id)
            .cloned())
    }

    async fn list_enrollments(&self, class_id: i64) -> StoreResult<Vec<Enrollment>> {
        let t = self.tables.lock().await;
        Ok(t
            .enrollments
            .iter()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> StoreResult<Quiz> {
        let mut t = self.tables.lock().await;
        let row = Quiz {
            id: t.next_id(),
            class_id: quiz.class_id,
            professor_id: quiz.professor_id,
            title: quiz.title,
            description: quiz.description,
            deadline: quiz.deadline,
            time_limit_minutes: quiz.time_limit_minutes,
            is_active: false,
            created_at: Utc::now(),
        };
        t.quizzes.push(row.clone());
        Ok(row)
    }

    async fn find_quiz(&self, id: i64) -> StoreResult<Option<Quiz>> {
        let t = self.tables.lock().await;
        Ok(t.quizzes.iter().find(|q| q.id == id).cloned())
    }

    async fn list_quizzes(&self, class_id: i64) -> StoreResult<Vec<Quiz>> {
        let t = self.tables.lock().await;
        Ok(t
            .quizzes
            .iter()
            .filter(|q| q.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn update_quiz(&self, id: i64, changes: QuizChanges) -> StoreResult<Option<Quiz>> {
        let mut t = self.tables.lock().await;
        let Some(quiz) = t.quizzes.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            quiz.title = title;
        }
        if let Some(description) = changes.description {
            quiz.description = Some(description);
        }
        if let Some(deadline) = changes.deadline {
            quiz.deadline = deadline;
        }
        if let Some(limit) = changes.time_limit_minutes {
            quiz.time_limit_minutes = limit;
        }
        Ok(Some(quiz.clone()))
    }

    async fn set_quiz_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(match t.quizzes.iter_mut().find(|q| q.id == id) {
            Some(q) => {
                q.is_active = active;
                true
            }
            None => false,
        })
    }

    async fn add_question(&self, question: NewQuestion) -> StoreResult<Question> {
        let mut t = self.tables.lock().await;
        let question_id = t.next_id();
        let mut options = Vec::with_capacity(question.options.len());
        for o in question.options {
            options.push(AnswerOption {
                id: t.next_id(),
                question_id,
                option_text: o.option_text,
                order_index: o.order_index,
                is_correct: o.is_correct,
            });
        }
        options.sort_by_key(|o| (o.order_index, o.id));

        let row = Question {
            id: question_id,
            quiz_id: question.quiz_id,
            question_text: question.question_text,
            question_type: question.question_type,
            order_index: question.order_index,
            points: question.points,
            options,
            created_at: Utc::now(),
        };
        t.questions.push(row.clone());
        Ok(row)
    }

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>> {
        let t = self.tables.lock().await;
        Ok(t.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn delete_question(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let before = t.questions.len();
        t.questions.retain(|q| q.id != id);
        Ok(t.questions.len() != before)
    }

    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>> {
        let t = self.tables.lock().await;
        let mut questions: Vec<Question> = t
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        sort_for_display(&mut questions);
        Ok(questions)
    }

    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        let mut t = self.tables.lock().await;
        if t.submissions.iter().any(|s| {
            s.student_id == submission.student_id
                && s.quiz_id == submission.quiz_id
                && !s.is_completed
        }) {
            return Err(StoreError::Conflict(
                "submission already in progress".to_string(),
            ));
        }
        let row = Submission {
            id: t.next_id(),
            student_id: submission.student_id,
            quiz_id: submission.quiz_id,
            started_at: submission.started_at,
            submitted_at: None,
            is_completed: false,
            total_score: 0,
            max_score: submission.max_score,
            time_taken_minutes: None,
        };
        t.submissions.push(row.clone());
        Ok(row)
    }

    async fn find_submission(&self, id: i64) -> StoreResult<Option<Submission>> {
        let t = self.tables.lock().await;
        Ok(t.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_open_submission(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> StoreResult<Option<Submission>> {
        let t = self.tables.lock().await;
        Ok(t
            .submissions
            .iter()
            .find(|s| s.student_id == student_id && s.quiz_id == quiz_id && !s.is_completed)
            .cloned())
    }

    async fn count_completed_submissions(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> StoreResult<i64> {
        let t = self.tables.lock().await;
        Ok(t
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id && s.quiz_id == quiz_id && s.is_completed)
            .count() as i64)
    }

    async fn list_submissions_for_student(&self, student_id: i64) -> StoreResult<Vec<Submission>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Submission> = t
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn list_submissions_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Submission>> {
        let t = self.tables.lock().await;
        Ok(t
            .submissions
            .iter()
            .filter(|s| s.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn upsert_answer(
        &self,
        submission_id: i64,
        question_id: i64,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<StudentAnswer>> {
        let mut t = self.tables.lock().await;
        let open = t
            .submissions
            .iter()
            .any(|s| s.id == submission_id && !s.is_completed);
        if !open {
            return Ok(None);
        }
        let row = StudentAnswer {
            submission_id,
            question_id,
            selected_option_ids: payload.selected_option_ids.clone(),
            text_answer: payload.text_answer.clone(),
            is_correct: None,
            points_awarded: 0,
            answered_at: at,
        };
        t.answers.insert((submission_id, question_id), row.clone());
        Ok(Some(row))
    }

    async fn list_answers(&self, submission_id: i64) -> StoreResult<Vec<StudentAnswer>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<StudentAnswer> = t
            .answers
            .values()
            .filter(|a| a.submission_id == submission_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.question_id);
        Ok(rows)
    }

    async fn list_completed_answers_for_quiz(
        &self,
        quiz_id: i64,
    ) -> StoreResult<Vec<StudentAnswer>> {
        let t = self.tables.lock().await;
        let completed: Vec<i64> = t
            .submissions
            .iter()
            .filter(|s| s.quiz_id == quiz_id && s.is_completed)
            .map(|s| s.id)
            .collect();
        Ok(t
            .answers
            .values()
            .filter(|a| completed.contains(&a.submission_id))
            .cloned()
            .collect())
    }

    async fn finalize_submission(&self, finalization: Finalization) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        let Some(submission) = t
            .submissions
            .iter_mut()
            .find(|s| s.id == finalization.submission_id && !s.is_completed)
        else {
            return Ok(false);
        };

        submission.is_completed = true;
        submission.submitted_at = Some(finalization.submitted_at);
        submission.total_score = finalization.total_score;
        submission.time_taken_minutes = Some(finalization.time_taken_minutes);

        for verdict in finalization.verdicts {
            if let Some(answer) = t
                .answers
                .get_mut(&(finalization.submission_id, verdict.question_id))
            {
                answer.is_correct = verdict.is_correct;
                answer.points_awarded = verdict.points_awarded;
            }
        }
        Ok(true)
    }

    async fn dashboard_counts(
        &self,
        week_ago: DateTime<Utc>,
        month_ago: DateTime<Utc>,
    ) -> StoreResult<DashboardCounts> {
        let t = self.tables.lock().await;
        let active_users = |role: Option<Role>| {
            t.users
                .iter()
                .filter(|u| u.is_active && role.is_none_or(|r| u.role == r))
                .count() as i64
        };

        let percentages: Vec<f64> = t
            .submissions
            .iter()
            .filter(|s| s.is_completed)
            .filter_map(Submission::percentage)
            .collect();

        Ok(DashboardCounts {
            total_users: active_users(None),
            admin_count: active_users(Some(Role::Admin)),
            professor_count: active_users(Some(Role::Professor)),
            student_count: active_users(Some(Role::Student)),
            active_classes: t.classes.iter().filter(|c| c.is_active).count() as i64,
            active_quizzes: t.quizzes.iter().filter(|q| q.is_active).count() as i64,
            completed_submissions: t.submissions.iter().filter(|s| s.is_completed).count() as i64,
            active_last_week: t
                .users
                .iter()
                .filter(|u| u.last_login.is_some_and(|at| at >= week_ago))
                .count() as i64,
            new_users_last_month: t.users.iter().filter(|u| u.created_at >= month_ago).count()
                as i64,
            average_percentage: mean(&percentages),
        })
    }

    async fn recent_activity(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ActivityCount>> {
        let t = self.tables.lock().await;
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for log in t.audit_logs.iter().filter(|l| l.created_at >= since) {
            *counts.entry(log.action.as_str()).or_default() += 1;
        }
        let mut activity: Vec<ActivityCount> = counts
            .into_iter()
            .map(|(action, count)| ActivityCount {
                action: action.to_string(),
                count,
            })
            .collect();
        activity.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.action.cmp(&b.action)));
        activity.truncate(limit.max(0) as usize);
        Ok(activity)
    }

    async fn top_classes(&self, limit: i64) -> StoreResult<Vec<ClassStanding>> {
        let t = self.tables.lock().await;
        let mut standings = Vec::new();
        for class in t.classes.iter().filter(|c| c.is_active) {
            let Some(professor) = t.users.iter().find(|u| u.id == class.professor_id) else {
                continue;
            };
            let percentages: Vec<f64> = t
                .submissions
                .iter()
                .filter(|s| s.is_completed)
                .filter(|s| {
                    t.quizzes
                        .iter()
                        .any(|q| q.id == s.quiz_id && q.class_id == class.id)
                })
                .filter_map(Submission::percentage)
                .collect();
            if let Some(mean_percentage) = mean(&percentages) {
                standings.push(ClassStanding {
                    class_id: class.id,
                    name: class.name.clone(),
                    class_code: class.class_code.clone(),
                    professor_first_name: professor.first_name.clone(),
                    professor_last_name: professor.last_name.clone(),
                    submission_count: percentages.len() as i64,
                    mean_percentage,
                });
            }
        }
        standings.sort_by(|a, b| {
            b.mean_percentage
                .total_cmp(&a.mean_percentage)
                .then_with(|| a.class_id.cmp(&b.class_id))
        });
        standings.truncate(limit.max(0) as usize);
        Ok(standings)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        let row = AuditLog {
            id: t.next_id(),
            user_id: entry.user_id,
            action: entry.action,
            table_name: entry.table_name,
            record_id: entry.record_id,
            old_values: entry.old_values,
            new_values: entry.new_values,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        };
        t.audit_logs.push(row);
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> StoreResult<Vec<AuditLog>> {
        let t = self.tables.lock().await;
        Ok(t
            .audit_logs
            .iter()
            .rev()
            .filter(|l| filter.action.as_deref().is_none_or(|a| l.action == a))
            .filter(|l| filter.user_id.is_none_or(|u| l.user_id == Some(u)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
        }
    }

    #[tokio::test]
    async fn first_user_is_admin_then_students() {
        let store = MemoryStore::new();
        let first = store.create_user(new_user("alpha")).await.unwrap();
        let second = store.create_user(new_user("beta")).await.unwrap();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::Student);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("alpha")).await.unwrap();
        let err = store.create_user(new_user("alpha")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn details_cannot_take_another_users_email() {
        let store = MemoryStore::new();
        store.create_user(new_user("alpha")).await.unwrap();
        let beta = store.create_user(new_user("beta")).await.unwrap();

        let details = |email: &str| UserDetails {
            username: "beta".to_string(),
            email: email.to_string(),
            first_name: "B".to_string(),
            last_name: "Eta".to_string(),
        };
        let err = store
            .update_user_details(beta.id, details("alpha@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let updated = store
            .update_user_details(beta.id, details("beta@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "B");
    }

    #[tokio::test]
    async fn second_open_submission_conflicts() {
        let store = MemoryStore::new();
        let new = NewSubmission {
            student_id: 1,
            quiz_id: 2,
            started_at: Utc::now(),
            max_score: 3,
        };
        store.create_submission(new.clone()).await.unwrap();
        let err = store.create_submission(new).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn finalize_applies_once() {
        let store = MemoryStore::new();
        let s = store
            .create_submission(NewSubmission {
                student_id: 1,
                quiz_id: 2,
                started_at: Utc::now(),
                max_score: 3,
            })
            .await
            .unwrap();
        let fin = Finalization {
            submission_id: s.id,
            submitted_at: Utc::now(),
            total_score: 2,
            time_taken_minutes: 1,
            verdicts: vec![],
        };
        assert!(store.finalize_submission(fin.clone()).await.unwrap());
        assert!(!store
            .finalize_submission(Finalization {
                total_score: 0,
                ..fin
            })
            .await
            .unwrap());
        let stored = store.find_submission(s.id).await.unwrap().unwrap();
        assert_eq!(stored.total_score, 2);
    }

    #[tokio::test]
    async fn answers_are_rejected_after_finalize() {
        let store = MemoryStore::new();
        let s = store
            .create_submission(NewSubmission {
                student_id: 1,
                quiz_id: 2,
                started_at: Utc::now(),
                max_score: 1,
            })
            .await
            .unwrap();
        store
            .finalize_submission(Finalization {
                submission_id: s.id,
                submitted_at: Utc::now(),
                total_score: 0,
                time_taken_minutes: 0,
                verdicts: vec![],
            })
            .await
            .unwrap();
        let written = store
            .upsert_answer(s.id, 9, &AnswerPayload::default(), Utc::now())
            .await
            .unwrap();
        assert!(written.is_none());
    }
}
