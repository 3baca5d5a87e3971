//! PostgREST-style hosted table backend.
//!
//! Talks to `<base_url>/rest/v1/<table>` with an `apikey` header, the way
//! Supabase exposes Postgres tables.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{RecordStore, StoreError, UserDirectory};
use crate::config::StoreConfig;
use crate::models::{
    DateRange, ManagerAccount, ManagerLookup, NewSubmission, RawRecord, StoreAccount,
    StoreIdentity, SubmissionRecord,
};

/// Table names on the hosted database.
#[derive(Debug, Clone)]
pub struct RestTables {
    pub submissions: String,
    pub stores: String,
    pub managers: String,
}

impl Default for RestTables {
    fn default() -> Self {
        Self {
            submissions: "kpi_submissions".to_string(),
            stores: "stores".to_string(),
            managers: "managers".to_string(),
        }
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: String,
}

pub struct RestStore {
    client: Client,
    base_url: Url,
    tables: RestTables,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        tables: RestTables,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let key = HeaderValue::from_str(api_key)
            .map_err(|_| StoreError::Misconfigured("API key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| StoreError::Misconfigured("API key is not a valid header value".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            tables,
        })
    }

    /// Build from config; the API key is read from the named environment variable.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config.base_url.as_deref().ok_or_else(|| {
            StoreError::Misconfigured("store.base_url is required for the rest backend".into())
        })?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            StoreError::Misconfigured(format!("{} must be set", config.api_key_env))
        })?;

        Self::new(
            base_url,
            &api_key,
            RestTables {
                submissions: config.submissions_table.clone(),
                stores: config.stores_table.clone(),
                managers: config.managers_table.clone(),
            },
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))
    }

    /// Turn a non-2xx response into an error carrying the server's message.
    async fn ensure_success(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RestErrorBody>(&body)
            .map(|b| b.message)
            .ok()
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        Err(StoreError::HttpStatus {
            status: status.as_u16(),
            message,
        })
    }

    async fn select_eq<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>, StoreError> {
        let query = [
            ("select", "*".to_string()),
            (column, format!("eq.{value}")),
            ("limit", "1".to_string()),
        ];
        let response = self
            .client
            .get(self.table_url(table)?)
            .query(&query)
            .send()
            .await?;
        let rows: Vec<T> = Self::ensure_success(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl RecordStore for RestStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawRecord>, StoreError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        if let Some(start) = range.start {
            query.push((
                "submitted_at",
                format!("gte.{}", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ));
        }
        if let Some(end) = range.end {
            query.push((
                "submitted_at",
                format!("lte.{}", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ));
        }
        query.push(("order", "submitted_at.desc".to_string()));

        let url = self.table_url(&self.tables.submissions)?;
        debug!("Fetching submissions from {}", url);
        let response = self.client.get(url).query(&query).send().await?;
        let rows: Vec<RawRecord> = Self::ensure_success(response).await?.json().await?;

        debug!("Fetched {} submissions", rows.len());
        Ok(rows)
    }

    async fn insert(&self, submission: NewSubmission) -> Result<SubmissionRecord, StoreError> {
        let response = self
            .client
            .post(self.table_url(&self.tables.submissions)?)
            .header("Prefer", "return=representation")
            .json(&[&submission])
            .send()
            .await?;
        let rows: Vec<SubmissionRecord> = Self::ensure_success(response).await?.json().await?;
        let record = rows.into_iter().next().ok_or(StoreError::EmptyInsert)?;

        info!("Stored submission {} for {}", record.id, record.store_name);
        Ok(record)
    }
}

#[async_trait]
impl UserDirectory for RestStore {
    async fn lookup_store(
        &self,
        id: &str,
        password: &str,
    ) -> Result<Option<StoreIdentity>, StoreError> {
        let account: Option<StoreAccount> =
            self.select_eq(&self.tables.stores, "id", id).await?;
        Ok(account
            .filter(|a| a.verify(password))
            .map(|a| a.identity()))
    }

    async fn lookup_manager(
        &self,
        name: &str,
        password: &str,
    ) -> Result<ManagerLookup, StoreError> {
        let account: Option<ManagerAccount> =
            self.select_eq(&self.tables.managers, "name", name).await?;
        Ok(match account {
            None => ManagerLookup::NotFound,
            Some(account) if !account.verify(password) => ManagerLookup::WrongPassword,
            Some(account) => ManagerLookup::Found(account.identity()),
        })
    }
}
