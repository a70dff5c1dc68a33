// src/models/stats.rs

use serde::Serialize;
use sqlx::FromRow;

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct DashboardCounts {
    pub total_users: i64,
    pub admin_count: i64,
    pub professor_count: i64,
    pub student_count: i64,
    pub active_classes: i64,
    pub active_quizzes: i64,
    pub completed_submissions: i64,
    pub active_last_week: i64,
    pub new_users_last_month: i64,
    /// Mean of total/max over completed submissions with a non-zero max.
    pub average_percentage: Option<f64>,
}

/// Audit entries per action over a recent window.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ActivityCount {
    pub action: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ClassStanding {
    pub class_id: i64,
    pub name: String,
    pub class_code: String,
    pub professor_first_name: String,
    pub professor_last_name: String,
    pub submission_count: i64,
    pub mean_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub stats: DashboardCounts,
    pub recent_activity: Vec<ActivityCount>,
    pub top_classes: Vec<ClassStanding>,
}
