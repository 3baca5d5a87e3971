//! Core data models for the KPI tracker.

pub(crate) mod de;
mod identity;
mod range;
mod stats;
mod submission;
mod tally;

pub use identity::*;
pub use range::*;
pub use stats::*;
pub use submission::*;
pub use tally::*;
