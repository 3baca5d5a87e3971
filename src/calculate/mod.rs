//! KPI calculation engine.
//!
//! - Strike rate and the additional yes signups needed to hit a target
//! - Ranking fetched submissions against their targets, with region aggregates

mod ranking;
mod strike_rate;

pub use ranking::*;
pub use strike_rate::*;
