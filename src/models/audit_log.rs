// src/models/audit_log.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'audit_logs' table. Rows are append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for listing audit logs.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogFilter {
    pub action: Option<String>,
    pub user_id: Option<i64>,
}

/// Insert payload for one audit record.
#[derive(Debug, Clone, Default)]
pub struct NewAuditLog {
    pub user_id: Option<i64>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
