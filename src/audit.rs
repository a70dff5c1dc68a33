// src/audit.rs

//! Audit recorder.
//!
//! Business operations hand their audit entries to an `AuditRecorder`
//! through [`record_quietly`]; a failing recorder is logged and otherwise
//! ignored so auditing can never fail the operation it describes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use serde_json::Value;

use crate::{
    models::audit_log::NewAuditLog,
    store::{Store, StoreError},
};

/// Where a request came from, copied into every audit entry.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Reads the client address from `X-Forwarded-For` / `X-Real-IP`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address,
            user_agent,
        }
    }
}

/// One action worth keeping a record of.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor_id: Option<i64>,
    pub action: &'static str,
    pub table: &'static str,
    pub record_id: Option<i64>,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditEvent {
    pub fn new(actor_id: Option<i64>, action: &'static str, table: &'static str) -> Self {
        Self {
            actor_id,
            action,
            table,
            record_id: None,
            before: None,
            after: None,
        }
    }

    pub fn record(mut self, id: i64) -> Self {
        self.record_id = Some(id);
        self
    }

    pub fn before(mut self, value: Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn after(mut self, value: Value) -> Self {
        self.after = Some(value);
        self
    }

    fn into_row(self, ctx: &RequestContext) -> NewAuditLog {
        NewAuditLog {
            user_id: self.actor_id,
            action: self.action.to_string(),
            table_name: self.table.to_string(),
            record_id: self.record_id,
            old_values: self.before,
            new_values: self.after,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        }
    }
}

#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, event: AuditEvent, ctx: &RequestContext) -> Result<(), StoreError>;
}

/// Writes audit entries into the `audit_logs` table of the main store.
pub struct StoreAuditRecorder {
    store: Arc<dyn Store>,
}

impl StoreAuditRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditRecorder for StoreAuditRecorder {
    async fn record(&self, event: AuditEvent, ctx: &RequestContext) -> Result<(), StoreError> {
        self.store.insert_audit_log(event.into_row(ctx)).await
    }
}

/// Records `event`, logging instead of propagating any failure.
pub async fn record_quietly(recorder: &dyn AuditRecorder, event: AuditEvent, ctx: &RequestContext) {
    let action = event.action;
    if let Err(e) = recorder.record(event, ctx).await {
        tracing::warn!("Failed to write audit entry '{}': {}", action, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingRecorder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuditRecorder for FailingRecorder {
        async fn record(&self, _: AuditEvent, _: &RequestContext) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Other("audit table missing".into()))
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let recorder = FailingRecorder {
            calls: AtomicUsize::new(0),
        };
        record_quietly(
            &recorder,
            AuditEvent::new(Some(1), "LOGIN", "users").record(1),
            &RequestContext::default(),
        )
        .await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn context_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8"));
    }
}
