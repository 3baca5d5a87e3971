//! # KPI Tracker
//!
//! A retail signup KPI tracker: stores log yes/no signup counts and get live
//! strike-rate feedback, regional managers review a ranked dashboard.
//!
//! ## Architecture
//!
//! - **models**: Tallies, submission records and dashboard views
//! - **calculate**: Strike-rate math and submission ranking
//! - **storage**: Record store and user directory backends (JSONL, REST)
//! - **session**: Per-login view-models for the tracker and the dashboard
//! - **export**: CSV spreadsheet export
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod session;
pub mod storage;

pub use error::KpiError;
pub use models::*;
