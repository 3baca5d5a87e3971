//! Signed-in sessions and their view-models.
//!
//! A store signs in to a [`TrackerSession`]; a manager signs in to a
//! [`DashboardView`]. Sessions are keyed by an opaque token and held in
//! memory only. The registry lock is never held across a store call.

pub mod dashboard;
pub mod tracker;

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::KpiError;
use crate::models::{
    DateRange, ManagerIdentity, ManagerLookup, RankedResult, StoreIdentity, SubmissionRecord,
};
use crate::storage::{RecordStore, UserDirectory};

pub use dashboard::{DashboardView, FetchOutcome, FetchTicket};
pub use tracker::{submit, TrackerSession, TrackerView, SUBMITTED_MESSAGE};

pub const INVALID_STORE_MESSAGE: &str = "Invalid store ID or password";
pub const MANAGER_NOT_FOUND_MESSAGE: &str = "Manager not found";
pub const WRONG_PASSWORD_MESSAGE: &str = "Incorrect password";
const UNKNOWN_SESSION_MESSAGE: &str = "Session expired or unknown. Sign in again.";

/// Who owns a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Principal {
    Store(StoreIdentity),
    Manager(ManagerIdentity),
}

#[derive(Debug, Clone)]
pub enum Session {
    Store(TrackerSession),
    Manager(DashboardView),
}

impl Session {
    pub fn principal(&self) -> Principal {
        match self {
            Session::Store(tracker) => Principal::Store(tracker.store().clone()),
            Session::Manager(view) => Principal::Manager(view.manager().clone()),
        }
    }
}

/// Check store credentials and open a fresh tracker.
pub async fn sign_in_store(
    directory: &dyn UserDirectory,
    store_id: &str,
    password: &str,
    default_target_rate: f64,
) -> Result<TrackerSession, KpiError> {
    let store_id = store_id.trim();
    if store_id.is_empty() || password.is_empty() {
        return Err(KpiError::auth(INVALID_STORE_MESSAGE));
    }

    let found = directory.lookup_store(store_id, password).await.map_err(|e| {
        warn!("Store lookup for {} failed: {}", store_id, e);
        KpiError::auth(INVALID_STORE_MESSAGE)
    })?;

    match found {
        Some(store) => {
            info!("Store {} ({}) signed in", store.name, store.id);
            Ok(TrackerSession::new(store, default_target_rate))
        }
        None => {
            warn!("Rejected sign-in for store {}", store_id);
            Err(KpiError::auth(INVALID_STORE_MESSAGE))
        }
    }
}

/// Check manager credentials and open an empty dashboard.
pub async fn sign_in_manager(
    directory: &dyn UserDirectory,
    name: &str,
    password: &str,
) -> Result<DashboardView, KpiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(KpiError::auth(MANAGER_NOT_FOUND_MESSAGE));
    }

    let lookup = directory.lookup_manager(name, password).await.map_err(|e| {
        warn!("Manager lookup for {} failed: {}", name, e);
        KpiError::auth(MANAGER_NOT_FOUND_MESSAGE)
    })?;

    match lookup {
        ManagerLookup::Found(manager) => {
            info!("Manager {} signed in", manager.name);
            Ok(DashboardView::new(manager))
        }
        ManagerLookup::NotFound => {
            warn!("Unknown manager {}", name);
            Err(KpiError::auth(MANAGER_NOT_FOUND_MESSAGE))
        }
        ManagerLookup::WrongPassword => {
            warn!("Wrong password for manager {}", name);
            Err(KpiError::auth(WRONG_PASSWORD_MESSAGE))
        }
    }
}

/// In-memory session table.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, session: Session) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions.write().await.insert(token, session);
        token
    }

    /// Returns false when the token was not open.
    pub async fn close(&self, token: &Uuid) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn principal(&self, token: &Uuid) -> Result<Principal, KpiError> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(Session::principal)
            .ok_or_else(|| KpiError::auth(UNKNOWN_SESSION_MESSAGE))
    }

    /// Run `f` against a store session's tracker.
    pub async fn with_tracker<R>(
        &self,
        token: &Uuid,
        f: impl FnOnce(&mut TrackerSession) -> Result<R, KpiError>,
    ) -> Result<R, KpiError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(token) {
            Some(Session::Store(tracker)) => f(tracker),
            Some(Session::Manager(_)) => {
                Err(KpiError::auth("The tracker is only available to stores"))
            }
            None => Err(KpiError::auth(UNKNOWN_SESSION_MESSAGE)),
        }
    }

    /// Run `f` against a manager session's dashboard.
    pub async fn with_dashboard<R>(
        &self,
        token: &Uuid,
        f: impl FnOnce(&mut DashboardView) -> Result<R, KpiError>,
    ) -> Result<R, KpiError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(token) {
            Some(Session::Manager(view)) => f(view),
            Some(Session::Store(_)) => {
                Err(KpiError::auth("The dashboard is only available to managers"))
            }
            None => Err(KpiError::auth(UNKNOWN_SESSION_MESSAGE)),
        }
    }

    /// Submit whatever the store confirmed. The pending confirmation is
    /// consumed even when the insert fails.
    pub async fn submit_confirmed(
        &self,
        token: &Uuid,
        records: &dyn RecordStore,
    ) -> Result<SubmissionRecord, KpiError> {
        let submission = self
            .with_tracker(token, |tracker| tracker.take_confirmed())
            .await?;
        submit(records, submission).await
    }

    /// Fetch, rank and apply a dashboard range. When a newer fetch for the
    /// same session wins the race, the newer result is what comes back.
    pub async fn refresh_dashboard(
        &self,
        token: &Uuid,
        records: &dyn RecordStore,
        range: DateRange,
    ) -> Result<(FetchOutcome, RankedResult), KpiError> {
        let ticket = self
            .with_dashboard(token, |view| Ok(view.begin_fetch(range)))
            .await?;

        let fetched = records.fetch(ticket.range()).await;

        self.with_dashboard(token, |view| {
            let outcome = view.complete_fetch(ticket, fetched)?;
            Ok((outcome, view.current().clone()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManagerAccount, StoreAccount, TallyPatch};
    use crate::storage::{JsonlStore, StorageConfig};
    use serde_json::json;

    async fn seeded_store(dir: &std::path::Path) -> JsonlStore {
        let store = JsonlStore::new(StorageConfig::new(dir.to_path_buf()));
        store
            .upsert_store(StoreAccount::new("S001", "Oxford Street", "pw"))
            .await
            .unwrap();
        store
            .upsert_manager(ManagerAccount::new("m1", "Dana", "secret"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_store_sign_in() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(tmp.path()).await;

        let tracker = sign_in_store(&store, "S001", "pw", 20.0).await.unwrap();
        assert_eq!(tracker.store().name, "Oxford Street");

        let err = sign_in_store(&store, "S001", "nope", 20.0).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_STORE_MESSAGE);
        let err = sign_in_store(&store, "S999", "pw", 20.0).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_STORE_MESSAGE);
    }

    #[tokio::test]
    async fn test_manager_sign_in_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(tmp.path()).await;

        assert!(sign_in_manager(&store, "Dana", "secret").await.is_ok());

        let err = sign_in_manager(&store, "Dana", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), WRONG_PASSWORD_MESSAGE);
        let err = sign_in_manager(&store, "Nobody", "secret").await.unwrap_err();
        assert_eq!(err.to_string(), MANAGER_NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_registry_role_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(tmp.path()).await;
        let registry = SessionRegistry::new();

        let tracker = sign_in_store(&store, "S001", "pw", 20.0).await.unwrap();
        let token = registry.open(Session::Store(tracker)).await;

        assert!(matches!(
            registry.principal(&token).await.unwrap(),
            Principal::Store(_)
        ));
        let err = registry
            .with_dashboard(&token, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, KpiError::Auth(_)));

        assert!(registry.close(&token).await);
        assert!(!registry.close(&token).await);
        assert!(registry.principal(&token).await.is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_submit_then_rank() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(tmp.path()).await;
        let registry = SessionRegistry::new();

        let tracker = sign_in_store(&store, "S001", "pw", 20.0).await.unwrap();
        let store_token = registry.open(Session::Store(tracker)).await;
        let patch: TallyPatch =
            serde_json::from_value(json!({"yes_count": 3, "no_count": 7})).unwrap();
        registry
            .with_tracker(&store_token, |t| {
                t.update(&patch)?;
                t.request_submit()
            })
            .await
            .unwrap();

        let record = registry
            .submit_confirmed(&store_token, &store)
            .await
            .unwrap();
        assert_eq!(record.strike_rate, 30.0);

        // Nothing left to confirm.
        assert!(registry
            .submit_confirmed(&store_token, &store)
            .await
            .is_err());

        let view = sign_in_manager(&store, "Dana", "secret").await.unwrap();
        let manager_token = registry.open(Session::Manager(view)).await;
        let (outcome, ranked) = registry
            .refresh_dashboard(&manager_token, &store, DateRange::unbounded())
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(ranked.rows.len(), 1);
        assert_eq!(ranked.rows[0].vs_target, 10.0);
        assert_eq!(ranked.summary.stores_meeting_target, 1);
    }
}
