//! Ranking fetched submissions against their targets.

use std::collections::HashSet;

use super::{percentage, round2, strike_rate};
use crate::models::{DateRange, EnrichedRecord, RankedResult, RawRecord, RegionSummary};

/// Rank records fetched newest-first.
///
/// With a range, every record inside it is kept, so a store can appear more
/// than once. Without one, only the first record seen per store name is kept.
/// Rows are ordered by how far they beat their target; ties keep fetch order.
pub fn rank(records: &[RawRecord], range: Option<&DateRange>) -> RankedResult {
    let retained: Vec<&RawRecord> = match range {
        Some(range) => records
            .iter()
            .filter(|r| range.contains(r.submitted_at))
            .collect(),
        None => latest_per_store(records),
    };

    let mut scored: Vec<(&RawRecord, f64, f64)> = retained
        .into_iter()
        .map(|record| {
            let rate = strike_rate(record.yes_count, record.no_count);
            (record, rate, rate - record.target_strike_rate)
        })
        .collect();

    // Stable, so equal deltas stay in fetch order.
    scored.sort_by(|a, b| b.2.total_cmp(&a.2));

    let rows: Vec<EnrichedRecord> = scored
        .into_iter()
        .enumerate()
        .map(|(index, (record, rate, vs_target))| {
            let strike_rate = round2(rate);
            let target_strike_rate = round2(record.target_strike_rate);
            EnrichedRecord {
                rank: index + 1,
                id: record.id.clone(),
                store_id: record.store_id.clone(),
                store_name: record.store_name.clone(),
                yes_count: record.yes_count,
                no_count: record.no_count,
                strike_rate,
                target_strike_rate,
                vs_target: round2(vs_target),
                additional_yes_needed: record.additional_yes_needed,
                submitted_at: record.submitted_at,
                meets_target: strike_rate >= target_strike_rate,
                is_top_three: index < 3,
            }
        })
        .collect();

    let summary = summarize(&rows);
    RankedResult {
        rows,
        summary,
        filtered: range.is_some(),
    }
}

/// Rank with the dashboard's branching: a bounded range filters, an unbounded
/// one collapses to the latest record per store.
pub fn rank_in(records: &[RawRecord], range: &DateRange) -> RankedResult {
    rank(records, range.is_bounded().then_some(range))
}

/// First record per store name, in input order.
pub fn latest_per_store(records: &[RawRecord]) -> Vec<&RawRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.store_name.as_str()))
        .collect()
}

/// Aggregates over ranked rows. The average is weighted by signups, not a
/// mean of per-store percentages.
pub fn summarize(rows: &[EnrichedRecord]) -> RegionSummary {
    let total_yes: u64 = rows.iter().map(|r| r.yes_count as u64).sum();
    let total_no: u64 = rows.iter().map(|r| r.no_count as u64).sum();
    let stores_meeting_target = rows.iter().filter(|r| r.meets_target).count();

    RegionSummary {
        total_submissions: rows.len(),
        total_yes,
        total_no,
        average_strike_rate: round2(percentage(total_yes, total_no)),
        stores_meeting_target,
        stores_below_target: rows.len() - stores_meeting_target,
    }
}
