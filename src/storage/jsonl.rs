//! JSONL (JSON Lines) storage.
//!
//! Local backend for single-node use and tests. Each line is one JSON object:
//! submissions are append-only, directory files are rewritten on upsert.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{RecordStore, StorageConfig, StoreError, UserDirectory};
use crate::models::{
    DateRange, ManagerAccount, ManagerLookup, NewSubmission, RawRecord, StoreAccount,
    StoreIdentity, SubmissionRecord,
};

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity to the file.
    pub fn append(&self, entity: &T) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entity)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }

    /// Write entities, replacing the entire file.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StoreError> {
        self.ensure_dir()?;

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
        }

        writer.flush()?;
        info!("Wrote {} entities to {:?}", entities.len(), self.path);

        Ok(entities.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entities. A missing file reads as empty; bad lines are skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", index + 1, self.path, e);
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// File-backed record store and user directory.
pub struct JsonlStore {
    config: StorageConfig,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Add a store account, replacing any with the same id.
    pub async fn upsert_store(&self, account: StoreAccount) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.config.stores_path();
        let mut accounts: Vec<StoreAccount> = JsonlReader::new(path.clone()).read_all()?;
        accounts.retain(|a| a.id != account.id);
        info!("Saving store account {} ({})", account.id, account.name);
        accounts.push(account);
        JsonlWriter::new(path).write_all(&accounts)?;
        Ok(())
    }

    /// Add a manager account, replacing any with the same name.
    pub async fn upsert_manager(&self, account: ManagerAccount) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.config.managers_path();
        let mut accounts: Vec<ManagerAccount> = JsonlReader::new(path.clone()).read_all()?;
        accounts.retain(|a| a.name != account.name);
        info!("Saving manager account {}", account.name);
        accounts.push(account);
        JsonlWriter::new(path).write_all(&accounts)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawRecord>, StoreError> {
        let mut records: Vec<RawRecord> =
            JsonlReader::new(self.config.submissions_path()).read_all()?;
        records.retain(|r| range.contains(r.submitted_at));

        // Later appends first among equal timestamps, then newest first.
        records.reverse();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        debug!("Fetched {} submissions from JSONL", records.len());
        Ok(records)
    }

    async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let record = submission.into_record(Uuid::new_v4().to_string(), Utc::now());
        JsonlWriter::new(self.config.submissions_path()).append(&record)?;
        info!(
            "Stored submission {} for {} ({} yes / {} no)",
            record.id, record.store_name, record.yes_count, record.no_count
        );
        Ok(record)
    }
}

#[async_trait]
impl UserDirectory for JsonlStore {
    async fn lookup_store(
        &self,
        id: &str,
        password: &str,
    ) -> Result<Option<StoreIdentity>, StoreError> {
        let accounts: Vec<StoreAccount> =
            JsonlReader::new(self.config.stores_path()).read_all()?;
        Ok(accounts
            .iter()
            .find(|a| a.id == id)
            .filter(|a| a.verify(password))
            .map(StoreAccount::identity))
    }

    async fn lookup_manager(
        &self,
        name: &str,
        password: &str,
    ) -> Result<ManagerLookup, StoreError> {
        let accounts: Vec<ManagerAccount> =
            JsonlReader::new(self.config.managers_path()).read_all()?;
        Ok(match accounts.iter().find(|a| a.name == name) {
            None => ManagerLookup::NotFound,
            Some(account) if !account.verify(password) => ManagerLookup::WrongPassword,
            Some(account) => ManagerLookup::Found(account.identity()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupTally;
    use chrono::Duration;

    fn store_in(dir: &std::path::Path) -> JsonlStore {
        JsonlStore::new(StorageConfig::new(dir.to_path_buf()))
    }

    fn submission(name: &str, yes: u32, no: u32) -> NewSubmission {
        let store = StoreIdentity {
            id: name.to_lowercase(),
            name: name.to_string(),
        };
        NewSubmission::from_tally(&store, &SignupTally::new(yes, no, 20.0))
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = JsonlReader::<StoreAccount>::new(tmp.path().join("nope.jsonl"));
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_reader_skips_bad_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stores.jsonl");
        let good = serde_json::to_string(&StoreAccount::new("1", "A", "pw")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n{good}\n")).unwrap();

        let accounts: Vec<StoreAccount> = JsonlReader::new(path).read_all().unwrap();
        assert_eq!(accounts.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_time() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        let before = Utc::now();
        let record = store.insert(submission("Cheapside", 3, 7)).await.unwrap();

        assert!(!record.id.is_empty());
        assert!(record.submitted_at >= before);
        assert_eq!(record.strike_rate, 30.0);

        let fetched = store.fetch(&DateRange::unbounded()).await.unwrap();
        assert_eq!(fetched, vec![record]);
    }

    #[tokio::test]
    async fn test_fetch_is_newest_first_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let now = Utc::now();

        let rows: Vec<SubmissionRecord> = [("A", 30), ("B", 10), ("C", 120)]
            .iter()
            .map(|(name, minutes)| {
                submission(name, 1, 1).into_record(name.to_string(), now - Duration::minutes(*minutes))
            })
            .collect();
        JsonlWriter::new(store.config().submissions_path())
            .write_all(&rows)
            .unwrap();

        let all = store.fetch(&DateRange::unbounded()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);

        let recent = DateRange::new(Some(now - Duration::hours(1)), None);
        let ids: Vec<String> = store
            .fetch(&recent)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_store_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store
            .upsert_store(StoreAccount::new("101", "Cheapside", "old"))
            .await
            .unwrap();
        store
            .upsert_store(StoreAccount::new("101", "Cheapside", "secret"))
            .await
            .unwrap();

        let found = store.lookup_store("101", "secret").await.unwrap();
        assert_eq!(found.map(|s| s.name), Some("Cheapside".to_string()));
        assert!(store.lookup_store("101", "old").await.unwrap().is_none());
        assert!(store.lookup_store("999", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_manager_lookup_outcomes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store
            .upsert_manager(ManagerAccount::new("m1", "Dana", "pw").with_region("London"))
            .await
            .unwrap();

        assert_eq!(
            store.lookup_manager("Nobody", "pw").await.unwrap(),
            ManagerLookup::NotFound
        );
        assert_eq!(
            store.lookup_manager("Dana", "nope").await.unwrap(),
            ManagerLookup::WrongPassword
        );
        match store.lookup_manager("Dana", "pw").await.unwrap() {
            ManagerLookup::Found(manager) => assert_eq!(manager.region.as_deref(), Some("London")),
            other => panic!("Expected manager, got {:?}", other),
        }
    }
}
