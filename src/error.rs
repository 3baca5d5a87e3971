//! User-facing error taxonomy.
//!
//! Every variant is recoverable by re-prompting the user. Nothing here is
//! retried automatically.

use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum KpiError {
    /// Required input is missing or not a number. Blocks submission.
    #[error("{0}")]
    Validation(String),

    /// Credential lookup failed or did not match.
    #[error("{0}")]
    Auth(String),

    /// Reading submissions from the record store failed.
    #[error("Error fetching KPI submissions: {0}")]
    Fetch(#[source] StoreError),

    /// Writing a submission to the record store failed.
    #[error("{0}")]
    Insert(#[source] StoreError),
}

impl KpiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }
}
