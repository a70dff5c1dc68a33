// src/services/dashboard.rs

use chrono::{DateTime, Duration, Utc};

use crate::{
    access::{Actor, Permission},
    error::AppError,
    models::stats::DashboardStats,
    state::AppState,
};

const ACTIVITY_LIMIT: i64 = 20;
const TOP_CLASSES: i64 = 10;

/// System-wide numbers for the admin dashboard.
pub async fn stats(
    state: &AppState,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<DashboardStats, AppError> {
    actor.caps.require(Permission::ManageUsers)?;
    let week_ago = now - Duration::days(7);

    let stats = state
        .store
        .dashboard_counts(week_ago, now - Duration::days(30))
        .await?;
    let recent_activity = state.store.recent_activity(week_ago, ACTIVITY_LIMIT).await?;
    let top_classes = state.store.top_classes(TOP_CLASSES).await?;

    Ok(DashboardStats {
        stats,
        recent_activity,
        top_classes,
    })
}
