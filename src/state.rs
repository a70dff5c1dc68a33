// src/state.rs

use std::sync::Arc;

use crate::{
    audit::{AuditRecorder, StoreAuditRecorder},
    config::Config,
    store::{MemoryStore, Store},
};

/// Everything an operation depends on, passed in explicitly.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub audit: Arc<dyn AuditRecorder>,
    pub config: Config,
}

impl AppState {
    /// Audits into the same store the data lives in.
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let audit = Arc::new(StoreAuditRecorder::new(store.clone()));
        Self {
            store,
            audit,
            config,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }
}
