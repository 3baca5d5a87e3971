//! Store-side tracker: live feedback, confirm, submit.

use serde::Serialize;
use tracing::{error, info};

use crate::calculate;
use crate::error::KpiError;
use crate::models::{
    NewSubmission, StoreIdentity, SubmissionRecord, TallyFeedback, TallyInput, TallyPatch,
};
use crate::storage::RecordStore;

pub const SUBMITTED_MESSAGE: &str = "KPI submitted successfully!";

/// Snapshot of a tracker for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerView {
    pub store: StoreIdentity,
    pub input: TallyInput,
    pub complete: bool,
    /// Absent while any field is empty
    pub feedback: Option<TallyFeedback>,
    /// Awaiting confirmation
    pub pending: Option<NewSubmission>,
}

/// Input state for one signed-in store.
#[derive(Debug, Clone)]
pub struct TrackerSession {
    store: StoreIdentity,
    input: TallyInput,
    pending: Option<NewSubmission>,
}

impl TrackerSession {
    pub fn new(store: StoreIdentity, default_target_rate: f64) -> Self {
        Self {
            store,
            input: TallyInput::with_target(default_target_rate),
            pending: None,
        }
    }

    pub fn store(&self) -> &StoreIdentity {
        &self.store
    }

    pub fn input(&self) -> &TallyInput {
        &self.input
    }

    pub fn feedback(&self) -> Option<TallyFeedback> {
        self.input.tally().map(|tally| calculate::evaluate(&tally))
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            store: self.store.clone(),
            input: self.input,
            complete: self.input.is_complete(),
            feedback: self.feedback(),
            pending: self.pending.clone(),
        }
    }

    /// Edit the input. Any pending confirmation no longer matches, so it is dropped.
    pub fn update(&mut self, patch: &TallyPatch) -> Result<TrackerView, KpiError> {
        self.input.apply(patch)?;
        self.pending = None;
        Ok(self.view())
    }

    /// Validate and stage a submission for confirmation.
    pub fn request_submit(&mut self) -> Result<NewSubmission, KpiError> {
        let tally = self.input.require_complete()?;
        let submission = NewSubmission::from_tally(&self.store, &tally);
        self.pending = Some(submission.clone());
        Ok(submission)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the staged submission. The confirmation is consumed either way;
    /// after a failed insert the user requests and confirms again.
    pub fn take_confirmed(&mut self) -> Result<NewSubmission, KpiError> {
        self.pending
            .take()
            .ok_or_else(|| KpiError::validation("Nothing to confirm. Request a submission first."))
    }
}

/// Persist a confirmed submission. No retry.
pub async fn submit(
    records: &dyn RecordStore,
    submission: NewSubmission,
) -> Result<SubmissionRecord, KpiError> {
    let store_name = submission.store_name.clone();
    match records.insert(submission).await {
        Ok(record) => {
            info!(
                "Submission {} from {} at {:.2}% (target {:.2}%)",
                record.id, record.store_name, record.strike_rate, record.target_strike_rate
            );
            Ok(record)
        }
        Err(e) => {
            error!("Insert for {} via {} failed: {}", store_name, records.name(), e);
            Err(KpiError::Insert(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, RawRecord};
    use crate::storage::StoreError;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _range: &DateRange) -> Result<Vec<RawRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn insert(&self, _: NewSubmission) -> Result<SubmissionRecord, StoreError> {
            Err(StoreError::HttpStatus {
                status: 409,
                message: "duplicate key value".to_string(),
            })
        }
    }

    fn session() -> TrackerSession {
        TrackerSession::new(
            StoreIdentity {
                id: "101".to_string(),
                name: "Cheapside".to_string(),
            },
            20.0,
        )
    }

    fn patch(value: serde_json::Value) -> TallyPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_session_has_feedback() {
        let view = session().view();
        assert!(view.complete);
        let feedback = view.feedback.unwrap();
        assert_eq!(feedback.strike_rate, 0.0);
        assert_eq!(feedback.target_rate, 20.0);
    }

    #[test]
    fn test_update_recomputes_feedback() {
        let mut tracker = session();
        let view = tracker
            .update(&patch(json!({"yes_count": 5, "no_count": 15, "target_strike_rate": 50})))
            .unwrap();

        let feedback = view.feedback.unwrap();
        assert_eq!(feedback.strike_rate, 25.0);
        assert_eq!(feedback.additional_yes_needed, 10);
    }

    #[test]
    fn test_incomplete_input_blocks_request() {
        let mut tracker = session();
        tracker.update(&patch(json!({"no_count": ""}))).unwrap();

        assert!(tracker.view().feedback.is_none());
        let err = tracker.request_submit().unwrap_err();
        assert!(matches!(err, KpiError::Validation(_)));
        assert!(tracker.view().pending.is_none());
    }

    #[test]
    fn test_request_then_cancel() {
        let mut tracker = session();
        let staged = tracker.request_submit().unwrap();
        assert_eq!(tracker.view().pending, Some(staged));

        tracker.cancel();
        assert!(tracker.take_confirmed().is_err());
    }

    #[test]
    fn test_edit_drops_pending_confirmation() {
        let mut tracker = session();
        tracker.request_submit().unwrap();
        tracker.update(&patch(json!({"yes_count": 3}))).unwrap();
        assert!(tracker.take_confirmed().is_err());
    }

    #[test]
    fn test_take_confirmed_consumes() {
        let mut tracker = session();
        tracker
            .update(&patch(json!({"yes_count": 3, "no_count": 7})))
            .unwrap();
        tracker.request_submit().unwrap();

        let submission = tracker.take_confirmed().unwrap();
        assert_eq!(submission.store_name, "Cheapside");
        assert_eq!(submission.strike_rate, 30.0);
        assert!(tracker.take_confirmed().is_err());
    }

    #[tokio::test]
    async fn test_submit_maps_store_failure_to_insert_error() {
        let mut tracker = session();
        tracker.request_submit().unwrap();
        let submission = tracker.take_confirmed().unwrap();

        let err = submit(&FailingStore, submission).await.unwrap_err();
        assert!(matches!(err, KpiError::Insert(_)));
        assert_eq!(err.to_string(), "HTTP 409: duplicate key value");
    }
}
