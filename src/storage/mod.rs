//! Record store and user directory backends.
//!
//! The calculator and ranker never talk to a backend directly. Everything
//! that reads or writes submissions or credentials goes through the
//! [`RecordStore`] and [`UserDirectory`] traits:
//! - `jsonl`: local JSON Lines files under a data directory
//! - `rest`: a PostgREST-style hosted table API

pub mod jsonl;
pub mod rest;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{
    DateRange, ManagerLookup, NewSubmission, RawRecord, StoreIdentity, SubmissionRecord,
};

pub use jsonl::JsonlStore;
pub use rest::RestStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Store misconfigured: {0}")]
    Misconfigured(String),

    #[error("Insert returned no row")]
    EmptyInsert,
}

/// Where submissions live.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Submissions inside the range, newest first by `submitted_at`.
    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawRecord>, StoreError>;

    /// Persist a submission; the store assigns id and timestamp.
    async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, StoreError>;
}

/// Where store and manager credentials live.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `None` when the id is unknown or the password does not match.
    async fn lookup_store(
        &self,
        id: &str,
        password: &str,
    ) -> Result<Option<StoreIdentity>, StoreError>;

    async fn lookup_manager(&self, name: &str, password: &str)
        -> Result<ManagerLookup, StoreError>;
}

/// Paths for the local JSONL backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn submissions_path(&self) -> PathBuf {
        self.data_dir.join("kpi_submissions.jsonl")
    }

    pub fn stores_path(&self) -> PathBuf {
        self.data_dir.join("stores.jsonl")
    }

    pub fn managers_path(&self) -> PathBuf {
        self.data_dir.join("managers.jsonl")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Both halves of a configured backend.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub directory: Arc<dyn UserDirectory>,
}

/// Open the backend named in the config.
pub fn open_backend(config: &StoreConfig) -> Result<Backend, StoreError> {
    match config.backend {
        StoreBackend::Jsonl => {
            let store = Arc::new(JsonlStore::new(StorageConfig::new(config.data_dir.clone())));
            Ok(Backend {
                records: store.clone(),
                directory: store,
            })
        }
        StoreBackend::Rest => {
            let store = Arc::new(RestStore::from_config(config)?);
            Ok(Backend {
                records: store.clone(),
                directory: store,
            })
        }
    }
}
