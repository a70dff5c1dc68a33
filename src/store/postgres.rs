// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::{ClassScope, Store, StoreError, StoreResult};
use crate::models::{
    audit_log::{AuditLog, AuditLogFilter, NewAuditLog},
    class::{Class, Enrollment, NewClass},
    question::{AnswerOption, NewQuestion, Question},
    quiz::{NewQuiz, Quiz, QuizChanges},
    stats::{ActivityCount, ClassStanding, DashboardCounts},
    submission::{AnswerPayload, Finalization, NewSubmission, StudentAnswer, Submission},
    user::{NewUser, Role, User, UserDetails},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, \
                            is_active, created_at, last_login";
const CLASS_COLUMNS: &str =
    "id, name, description, professor_id, class_code, is_active, created_at";
const QUIZ_COLUMNS: &str = "id, class_id, professor_id, title, description, deadline, \
                            time_limit_minutes, is_active, created_at";
const SUBMISSION_COLUMNS: &str = "id, student_id, quiz_id, started_at, submitted_at, \
                                  is_completed, total_score, max_score, time_taken_minutes";
const ANSWER_COLUMNS: &str = "submission_id, question_id, selected_option_ids, text_answer, \
                              is_correct, points_awarded, answered_at";

/// Raw 'users' row; `role` is validated on the way out.
#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role.parse::<Role>().map_err(StoreError::Other)?,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login: row.last_login,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    question_text: String,
    question_type: String,
    order_index: i32,
    points: i32,
    created_at: DateTime<Utc>,
}

impl QuestionRow {
    fn into_question(self, options: Vec<AnswerOption>) -> StoreResult<Question> {
        Ok(Question {
            id: self.id,
            quiz_id: self.quiz_id,
            question_text: self.question_text,
            question_type: self.question_type.parse().map_err(StoreError::Other)?,
            order_index: self.order_index,
            points: self.points,
            options,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    submission_id: i64,
    question_id: i64,
    selected_option_ids: Json<Vec<i64>>,
    text_answer: Option<String>,
    is_correct: Option<bool>,
    points_awarded: i32,
    answered_at: DateTime<Utc>,
}

impl From<AnswerRow> for StudentAnswer {
    fn from(row: AnswerRow) -> Self {
        StudentAnswer {
            submission_id: row.submission_id,
            question_id: row.question_id,
            selected_option_ids: row.selected_option_ids.0,
            text_answer: row.text_answer,
            is_correct: row.is_correct,
            points_awarded: row.points_awarded,
            answered_at: row.answered_at,
        }
    }
}

/// Postgres-backed gateway. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_users(&self, sql: &str, role: Option<&str>) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(sql)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Loads options for the given questions and assembles them.
    async fn attach_options(&self, rows: Vec<QuestionRow>) -> StoreResult<Vec<Question>> {
        let ids: Vec<i64> = rows.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, AnswerOption>(
            r#"
            SELECT id, question_id, option_text, order_index, is_correct
            FROM answer_options
            WHERE question_id = ANY($1)
            ORDER BY order_index, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        rows.into_iter()
            .map(|row| {
                let options = by_question.remove(&row.id).unwrap_or_default();
                row.into_question(options)
            })
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent registrations so only one can see an empty table.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let (has_users,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&mut *tx)
            .await?;
        let role = if has_users { Role::Student } else { Role::Admin };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        User::try_from(row)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        self.fetch_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY id DESC"
            ),
            role.map(|r| r.as_str()),
        )
        .await
    }

    async fn update_user_details(
        &self,
        id: i64,
        details: UserDetails,
    ) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = $1, email = $2, first_name = $3, last_name = $4
            WHERE id = $5
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&details.username)
        .bind(&details.email)
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn update_user_role(&self, id: i64, role: Role) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_has_dependents(&self, id: i64) -> StoreResult<bool> {
        let (has,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM classes WHERE professor_id = $1)
                OR EXISTS (SELECT 1 FROM quizzes WHERE professor_id = $1)
                OR EXISTS (SELECT 1 FROM class_enrollments WHERE student_id = $1)
                OR EXISTS (SELECT 1 FROM quiz_submissions WHERE student_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(has)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_class(&self, class: NewClass) -> StoreResult<Class> {
        let row = sqlx::query_as::<_, Class>(&format!(
            r#"
            INSERT INTO classes (name, description, professor_id, class_code)
            VALUES ($1, $2, $3, $4)
            RETURNING {CLASS_COLUMNS}
            "#
        ))
        .bind(&class.name)
        .bind(&class.description)
        .bind(class.professor_id)
        .bind(&class.class_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_class(&self, id: i64) -> StoreResult<Option<Class>> {
        let row =
            sqlx::query_as::<_, Class>(&format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_class_by_code(&self, code: &str) -> StoreResult<Option<Class>> {
        let row = sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE class_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_classes(&self, scope: ClassScope) -> StoreResult<Vec<Class>> {
        let rows = match scope {
            ClassScope::All => {
                sqlx::query_as::<_, Class>(&format!(
                    "SELECT {CLASS_COLUMNS} FROM classes ORDER BY id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            ClassScope::OwnedBy(professor_id) => {
                sqlx::query_as::<_, Class>(&format!(
                    "SELECT {CLASS_COLUMNS} FROM classes WHERE professor_id = $1 ORDER BY id DESC"
                ))
                .bind(professor_id)
                .fetch_all(&self.pool)
                .await?
            }
            ClassScope::EnrolledStudent(student_id) => {
                sqlx::query_as::<_, Class>(
                    r#"
                    SELECT c.id, c.name, c.description, c.professor_id, c.class_code,
                           c.is_active, c.created_at
                    FROM classes c
                    JOIN class_enrollments e ON e.class_id = c.id
                    WHERE e.student_id = $1 AND e.is_active = TRUE
                    ORDER BY c.id DESC
                    "#,
                )
                .bind(student_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn enroll(
        &self,
        class_id: i64,
        student_id: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<Enrollment> {
        let row = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO class_enrollments (class_id, student_id, is_active, enrolled_at)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (class_id, student_id) DO UPDATE SET
                enrolled_at = CASE WHEN class_enrollments.is_active
                                   THEN class_enrollments.enrolled_at
                                   ELSE EXCLUDED.enrolled_at END,
                is_active = TRUE
            RETURNING class_id, student_id, is_active, enrolled_at
            "#,
        )
        .bind(class_id)
        .bind(student_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_enrollment_active(
        &self,
        class_id: i64,
        student_id: i64,
        active: bool,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE class_enrollments SET is_active = $1 WHERE class_id = $2 AND student_id = $3",
        )
        .bind(active)
        .bind(class_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_enrollment(
        &self,
        class_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<Enrollment>> {
        let row = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT class_id, student_id, is_active, enrolled_at
            FROM class_enrollments
            WHERE class_id = $1 AND student_id = $2
            "#,
        )
        .bind(class_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_enrollments(&self, class_id: i64) -> StoreResult<Vec<Enrollment>> {
        let rows = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT class_id, student_id, is_active, enrolled_at
            FROM class_enrollments
            WHERE class_id = $1
            ORDER BY enrolled_at
            "#,
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> StoreResult<Quiz> {
        let row = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes (class_id, professor_id, title, description, deadline, time_limit_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(quiz.class_id)
        .bind(quiz.professor_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.deadline)
        .bind(quiz.time_limit_minutes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_quiz(&self, id: i64) -> StoreResult<Option<Quiz>> {
        let row =
            sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn list_quizzes(&self, class_id: i64) -> StoreResult<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE class_id = $1 ORDER BY deadline, id"
        ))
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_quiz(&self, id: i64, changes: QuizChanges) -> StoreResult<Option<Quiz>> {
        let row = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                deadline = COALESCE($4, deadline),
                time_limit_minutes = COALESCE($5, time_limit_minutes)
            WHERE id = $1
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.deadline)
        .bind(changes.time_limit_minutes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_quiz_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE quizzes SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_question(&self, question: NewQuestion) -> StoreResult<Question> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (quiz_id, question_text, question_type, order_index, points)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, quiz_id, question_text, question_type, order_index, points, created_at
            "#,
        )
        .bind(question.quiz_id)
        .bind(&question.question_text)
        .bind(question.question_type.as_str())
        .bind(question.order_index)
        .bind(question.points)
        .fetch_one(&mut *tx)
        .await?;

        let mut options = Vec::with_capacity(question.options.len());
        for option in &question.options {
            let inserted = sqlx::query_as::<_, AnswerOption>(
                r#"
                INSERT INTO answer_options (question_id, option_text, order_index, is_correct)
                VALUES ($1, $2, $3, $4)
                RETURNING id, question_id, option_text, order_index, is_correct
                "#,
            )
            .bind(row.id)
            .bind(&option.option_text)
            .bind(option.order_index)
            .bind(option.is_correct)
            .fetch_one(&mut *tx)
            .await?;
            options.push(inserted);
        }

        tx.commit().await?;

        options.sort_by_key(|o| (o.order_index, o.id));
        row.into_question(options)
    }

    async fn find_question(&self, id: i64) -> StoreResult<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, question_text, question_type, order_index, points, created_at
            FROM questions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_options(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_question(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, question_text, question_type, order_index, points, created_at
            FROM questions
            WHERE quiz_id = $1
            ORDER BY order_index, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_options(rows).await
    }

    async fn create_submission(&self, submission: NewSubmission) -> StoreResult<Submission> {
        // The partial unique index rejects a second open attempt with 23505.
        let row = sqlx::query_as::<_, Submission>(&format!(
            r#"
            INSERT INTO quiz_submissions (student_id, quiz_id, started_at, max_score)
            VALUES ($1, $2, $3, $4)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission.student_id)
        .bind(submission.quiz_id)
        .bind(submission.started_at)
        .bind(submission.max_score)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_submission(&self, id: i64) -> StoreResult<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quiz_submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_open_submission(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> StoreResult<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quiz_submissions \
             WHERE student_id = $1 AND quiz_id = $2 AND NOT is_completed"
        ))
        .bind(student_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn count_completed_submissions(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM quiz_submissions \
             WHERE student_id = $1 AND quiz_id = $2 AND is_completed",
        )
        .bind(student_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_submissions_for_student(&self, student_id: i64) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quiz_submissions \
             WHERE student_id = $1 ORDER BY started_at DESC, id DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_submissions_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quiz_submissions WHERE quiz_id = $1 ORDER BY id"
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_answer(
        &self,
        submission_id: i64,
        question_id: i64,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<StudentAnswer>> {
        let row = sqlx::query_as::<_, AnswerRow>(&format!(
            r#"
            INSERT INTO student_answers
                (submission_id, question_id, selected_option_ids, text_answer, answered_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM quiz_submissions WHERE id = $1 AND NOT is_completed)
            ON CONFLICT (submission_id, question_id) DO UPDATE SET
                selected_option_ids = EXCLUDED.selected_option_ids,
                text_answer = EXCLUDED.text_answer,
                answered_at = EXCLUDED.answered_at,
                is_correct = NULL,
                points_awarded = 0
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(submission_id)
        .bind(question_id)
        .bind(Json(&payload.selected_option_ids))
        .bind(&payload.text_answer)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StudentAnswer::from))
    }

    async fn list_answers(&self, submission_id: i64) -> StoreResult<Vec<StudentAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM student_answers \
             WHERE submission_id = $1 ORDER BY question_id"
        ))
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StudentAnswer::from).collect())
    }

    async fn list_completed_answers_for_quiz(
        &self,
        quiz_id: i64,
    ) -> StoreResult<Vec<StudentAnswer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.submission_id, a.question_id, a.selected_option_ids, a.text_answer,
                   a.is_correct, a.points_awarded, a.answered_at
            FROM student_answers a
            JOIN quiz_submissions s ON s.id = a.submission_id
            WHERE s.quiz_id = $1 AND s.is_completed
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StudentAnswer::from).collect())
    }

    async fn finalize_submission(&self, finalization: Finalization) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE quiz_submissions SET
                is_completed = TRUE,
                submitted_at = $2,
                total_score = $3,
                time_taken_minutes = $4
            WHERE id = $1 AND NOT is_completed
            "#,
        )
        .bind(finalization.submission_id)
        .bind(finalization.submitted_at)
        .bind(finalization.total_score)
        .bind(finalization.time_taken_minutes)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for verdict in &finalization.verdicts {
            sqlx::query(
                r#"
                UPDATE student_answers SET is_correct = $3, points_awarded = $4
                WHERE submission_id = $1 AND question_id = $2
                "#,
            )
            .bind(finalization.submission_id)
            .bind(verdict.question_id)
            .bind(verdict.is_correct)
            .bind(verdict.points_awarded)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn dashboard_counts(
        &self,
        week_ago: DateTime<Utc>,
        month_ago: DateTime<Utc>,
    ) -> StoreResult<DashboardCounts> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE is_active) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_active AND role = 'admin') AS admin_count,
                (SELECT COUNT(*) FROM users WHERE is_active AND role = 'professor') AS professor_count,
                (SELECT COUNT(*) FROM users WHERE is_active AND role = 'student') AS student_count,
                (SELECT COUNT(*) FROM classes WHERE is_active) AS active_classes,
                (SELECT COUNT(*) FROM quizzes WHERE is_active) AS active_quizzes,
                (SELECT COUNT(*) FROM quiz_submissions WHERE is_completed) AS completed_submissions,
                (SELECT COUNT(*) FROM users WHERE last_login >= $1) AS active_last_week,
                (SELECT COUNT(*) FROM users WHERE created_at >= $2) AS new_users_last_month,
                (SELECT AVG(total_score::FLOAT8 / max_score) * 100
                   FROM quiz_submissions
                  WHERE is_completed AND max_score > 0) AS average_percentage
            "#,
        )
        .bind(week_ago)
        .bind(month_ago)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn recent_activity(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ActivityCount>> {
        let rows = sqlx::query_as::<_, ActivityCount>(
            r#"
            SELECT action, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at >= $1
            GROUP BY action
            ORDER BY count DESC, action
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn top_classes(&self, limit: i64) -> StoreResult<Vec<ClassStanding>> {
        let rows = sqlx::query_as::<_, ClassStanding>(
            r#"
            SELECT c.id AS class_id, c.name, c.class_code,
                   u.first_name AS professor_first_name,
                   u.last_name AS professor_last_name,
                   COUNT(qs.id) AS submission_count,
                   AVG(qs.total_score::FLOAT8 / qs.max_score) * 100 AS mean_percentage
            FROM classes c
            JOIN users u ON u.id = c.professor_id
            JOIN quizzes q ON q.class_id = c.id
            JOIN quiz_submissions qs
              ON qs.quiz_id = q.id AND qs.is_completed AND qs.max_score > 0
            WHERE c.is_active
            GROUP BY c.id, u.id
            ORDER BY mean_percentage DESC, c.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (user_id, action, table_name, record_id, old_values, new_values, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.table_name)
        .bind(entry.record_id)
        .bind(entry.old_values)
        .bind(entry.new_values)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> StoreResult<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, table_name, record_id, old_values, new_values,
                   ip_address, user_agent, created_at
            FROM audit_logs
            WHERE ($1::TEXT IS NULL OR action = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(filter.action.as_deref())
        .bind(filter.user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
