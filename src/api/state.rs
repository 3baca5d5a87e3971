use std::sync::Arc;

use crate::session::SessionRegistry;
use crate::storage::{Backend, RecordStore, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionRegistry>,
    pub default_target_rate: f64,
}

impl AppState {
    pub fn new(backend: Backend, default_target_rate: f64) -> Self {
        Self {
            records: backend.records,
            directory: backend.directory,
            sessions: Arc::new(SessionRegistry::new()),
            default_target_rate,
        }
    }
}
