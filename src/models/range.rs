//! Submission-time windows used by dashboard queries.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KpiError;

/// Inclusive window on `submitted_at`. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// No bounds at all: the dashboard shows the latest submission per store.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True when at least one bound is set.
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }

    /// Parse query-string bounds. Empty strings count as unset.
    ///
    /// Accepts RFC 3339, `datetime-local` style `YYYY-MM-DDTHH:MM[:SS]` (read as
    /// UTC) and plain dates. A plain end date covers the whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, KpiError> {
        let start = start.map(|s| parse_bound(s, false)).transpose()?.flatten();
        let end = end.map(|s| parse_bound(s, true)).transpose()?.flatten();

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(KpiError::validation("start must not be after end"));
            }
        }

        Ok(Self { start, end })
    }
}

fn parse_bound(raw: &str, is_end: bool) -> Result<Option<DateTime<Utc>>, KpiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(naive.and_utc()));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if is_end {
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(Some(date.and_time(time).and_utc()));
        }
    }

    Err(KpiError::validation(format!("Invalid date/time: {raw}")))
}
