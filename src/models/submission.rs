//! Persisted KPI submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{de, SignupTally, StoreIdentity};
use crate::calculate;

/// Insert payload: a submission before the record store assigns id and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub store_id: String,
    pub store_name: String,
    pub yes_count: u32,
    pub no_count: u32,
    /// Strike rate rounded to 2 decimals
    pub strike_rate: f64,
    pub target_strike_rate: f64,
    pub additional_yes_needed: u32,
}

impl NewSubmission {
    /// Derive the stored fields for a store's tally.
    pub fn from_tally(store: &StoreIdentity, tally: &SignupTally) -> Self {
        let feedback = calculate::evaluate(tally);
        Self {
            store_id: store.id.clone(),
            store_name: store.name.clone(),
            yes_count: tally.yes_count,
            no_count: tally.no_count,
            strike_rate: feedback.strike_rate,
            target_strike_rate: tally.target_rate,
            additional_yes_needed: feedback.additional_yes_needed,
        }
    }

    pub fn into_record(self, id: String, submitted_at: DateTime<Utc>) -> SubmissionRecord {
        SubmissionRecord {
            id,
            store_id: self.store_id,
            store_name: self.store_name,
            yes_count: self.yes_count,
            no_count: self.no_count,
            strike_rate: self.strike_rate,
            target_strike_rate: self.target_strike_rate,
            additional_yes_needed: self.additional_yes_needed,
            submitted_at,
        }
    }
}

/// A stored submission. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Assigned by the record store
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub id: String,

    #[serde(deserialize_with = "de::lenient_string")]
    pub store_id: String,

    pub store_name: String,

    #[serde(deserialize_with = "de::lenient_u32")]
    pub yes_count: u32,

    #[serde(deserialize_with = "de::lenient_u32")]
    pub no_count: u32,

    /// Strike rate as stored at submission time
    #[serde(deserialize_with = "de::lenient_f64")]
    pub strike_rate: f64,

    #[serde(deserialize_with = "de::lenient_f64")]
    pub target_strike_rate: f64,

    #[serde(default, deserialize_with = "de::lenient_u32_or_zero")]
    pub additional_yes_needed: u32,

    /// Assigned by the record store on insert
    pub submitted_at: DateTime<Utc>,
}

/// Row shape handed back by a record-store fetch.
pub type RawRecord = SubmissionRecord;

impl SubmissionRecord {
    pub fn tally(&self) -> SignupTally {
        SignupTally::new(self.yes_count, self.no_count, self.target_strike_rate)
    }
}
