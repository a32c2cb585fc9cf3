//! Remote store adapter.
//!
//! The remote store is a PostgREST-style service: rows are read with
//! `GET /rest/v1/{table}` plus filter/order/limit parameters and written with
//! a merge-duplicates upsert. Callers treat every error from this module as
//! "remote unavailable".

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::RemoteConfig;

const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=representation";

/// Errors from remote store calls.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A read returned something other than a JSON list
    #[error("expected a list of rows from table '{0}'")]
    UnexpectedShape(String),

    #[error("remote store is not configured")]
    NotConfigured,
}

/// Filter, ordering and limit for a table read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl RowQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality filter, sent as `column=eq.value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    /// Order by a column, newest first.
    #[must_use]
    pub fn newest_first(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.desc"));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in a stable order.
    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Row-oriented access to the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read rows from a table.
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, StoreError>;

    /// Insert or merge rows into a table.
    async fn upsert(&self, table: &str, rows: &[Value]) -> Result<(), StoreError>;
}

/// HTTP client for a PostgREST-compatible store.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl RestStore {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, StoreError> {
        let params = query.to_params();
        debug!(table, ?params, "Querying remote store");

        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&params)
            .send()
            .await?;
        let response = check_status(response).await?;

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            _ => Err(StoreError::UnexpectedShape(table.to_string())),
        }
    }

    async fn upsert(&self, table: &str, rows: &[Value]) -> Result<(), StoreError> {
        debug!(table, rows = rows.len(), "Upserting into remote store");

        let body = serde_json::to_vec(rows)?;
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", UPSERT_PREFER)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
