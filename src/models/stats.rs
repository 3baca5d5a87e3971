//! Derived KPI statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MEETING_TARGET_MESSAGE: &str = "Awesome job team!";
pub const BELOW_TARGET_MESSAGE: &str = "Let's push harder to hit the target!";

/// Live feedback for a tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyFeedback {
    /// Strike rate rounded to 2 decimals
    pub strike_rate: f64,

    pub target_rate: f64,

    /// Minimum extra yes signups to reach the target
    pub additional_yes_needed: u32,

    pub meets_target: bool,

    /// Progress bar fill, strike rate clamped to 0..=100
    pub progress_percent: f64,

    pub message: String,

    /// Present only while more yes signups are needed
    pub hint: Option<String>,
}

/// A submission with its ranking fields, rebuilt on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// 1-based position after sorting
    pub rank: usize,

    pub id: String,
    pub store_id: String,
    pub store_name: String,
    pub yes_count: u32,
    pub no_count: u32,

    /// Recomputed from the counts, rounded to 2 decimals
    pub strike_rate: f64,

    /// Rounded to 2 decimals
    pub target_strike_rate: f64,

    /// `strike_rate - target_strike_rate`, rounded to 2 decimals
    pub vs_target: f64,

    pub additional_yes_needed: u32,
    pub submitted_at: DateTime<Utc>,
    pub meets_target: bool,

    /// Highlighted in the dashboard table
    pub is_top_three: bool,
}

/// Region-level aggregates over the ranked rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub total_submissions: usize,
    pub total_yes: u64,
    pub total_no: u64,

    /// Weighted by counts: summed yes over summed yes + no, rounded to 2 decimals
    pub average_strike_rate: f64,

    pub stores_meeting_target: usize,
    pub stores_below_target: usize,
}

impl RegionSummary {
    /// Two-slice pie data.
    pub fn target_split(&self) -> Vec<TargetSlice> {
        vec![
            TargetSlice {
                name: "Meeting Target".to_string(),
                value: self.stores_meeting_target,
            },
            TargetSlice {
                name: "Below Target".to_string(),
                value: self.stores_below_target,
            },
        ]
    }
}

/// Output of ranking a fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub rows: Vec<EnrichedRecord>,
    pub summary: RegionSummary,

    /// True when a date range was applied instead of latest-per-store
    pub filtered: bool,
}

impl RankedResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Grouped bar chart data, in rank order.
    pub fn bar_series(&self) -> Vec<StrikeRateBar> {
        self.rows
            .iter()
            .map(|row| StrikeRateBar {
                store: row.store_name.clone(),
                strike_rate: row.strike_rate,
                target_rate: row.target_strike_rate,
            })
            .collect()
    }
}

/// One store's bar pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRateBar {
    pub store: String,
    pub strike_rate: f64,
    pub target_rate: f64,
}

/// One pie slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSlice {
    pub name: String,
    pub value: usize,
}
