//! Client for the hosted backend: relational query API, serverless functions
//! and the raw HTTP plumbing the storage client builds on.
//!
//! Every call is made on behalf of the caller: the project key goes in
//! `apikey`, the caller's access token in `Authorization`, so the backend's
//! row-level policies decide what is visible.

use crate::config::BackendConfig;
use crate::services::metrics::BACKEND_REQUEST_DURATION;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Serialize};
use service_core::error::AppError;
use service_core::observability::{TracedClientExt, TracedRequest};
use std::fmt::Display;
use tracing::{debug, instrument};

/// The caller's bearer token, forwarded untouched to the backend.
#[derive(Debug, Clone)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// A filtered read/write target on one table, rendered as query parameters
/// (`select=*&statut=eq.pending&order=date_echeance.asc`).
#[derive(Debug, Clone)]
pub struct Query {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn in_list<V: Display>(mut self, column: &str, values: &[V]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.params.push((column.to_string(), format!("in.({})", joined)));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let direction = if descending { "desc" } else { "asc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    /// Absolute URL for a path below the backend root.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn get(&self, token: &AccessToken, url: &str) -> TracedRequest {
        self.authorize(self.client.traced_get(url), token)
    }

    pub(crate) fn post(&self, token: &AccessToken, url: &str) -> TracedRequest {
        self.authorize(self.client.traced_post(url), token)
    }

    pub(crate) fn patch(&self, token: &AccessToken, url: &str) -> TracedRequest {
        self.authorize(self.client.traced_patch(url), token)
    }

    pub(crate) fn delete(&self, token: &AccessToken, url: &str) -> TracedRequest {
        self.authorize(self.client.traced_delete(url), token)
    }

    fn authorize(&self, request: TracedRequest, token: &AccessToken) -> TracedRequest {
        request
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(token.expose())
    }

    fn rest_url(&self, table: &str) -> String {
        self.url(&format!("rest/v1/{}", table))
    }

    /// Liveness of the backend; any answer below 500 counts as reachable.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        let response = self
            .client
            .traced_get(&self.url("rest/v1/"))
            .header("apikey", self.anon_key.expose_secret())
            .send()
            .await?;
        timer.observe_duration();

        if response.status().is_server_error() {
            return Err(AppError::ServiceUnavailable);
        }
        Ok(())
    }

    #[instrument(skip(self, token), fields(table = query.table_name()))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&["select"])
            .start_timer();

        let response = self
            .get(token, &self.rest_url(query.table_name()))
            .query(query.params())
            .send()
            .await?;
        let rows: Vec<T> = read_json(response, "select").await?;

        timer.observe_duration();
        debug!(rows = rows.len(), "Rows selected");
        Ok(rows)
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        query: Query,
    ) -> Result<Option<T>, AppError> {
        let rows = self.select(token, &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored.
    #[instrument(skip(self, token, row))]
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        table: &'static str,
        row: &B,
    ) -> Result<T, AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&["insert"])
            .start_timer();

        let response = self
            .post(token, &self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let rows: Vec<T> = read_json(response, "insert").await?;

        timer.observe_duration();
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::BadGateway(format!("Insert into {} returned no row", table)))
    }

    /// Apply `changes` to the rows matched by `query`; returns how many changed.
    #[instrument(skip(self, token, changes), fields(table = query.table_name()))]
    pub async fn update<B: Serialize>(
        &self,
        token: &AccessToken,
        query: &Query,
        changes: &B,
    ) -> Result<usize, AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&["update"])
            .start_timer();

        let response = self
            .patch(token, &self.rest_url(query.table_name()))
            .query(query.params())
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_json(response, "update").await?;

        timer.observe_duration();
        Ok(rows.len())
    }

    /// Delete the rows matched by `query`; returns how many were removed.
    #[instrument(skip(self, token), fields(table = query.table_name()))]
    pub async fn delete_rows(&self, token: &AccessToken, query: &Query) -> Result<usize, AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&["delete"])
            .start_timer();

        let response = self
            .delete(token, &self.rest_url(query.table_name()))
            .query(query.params())
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_json(response, "delete").await?;

        timer.observe_duration();
        Ok(rows.len())
    }

    /// Invoke a named serverless function with a JSON body.
    #[instrument(skip(self, token, body))]
    pub async fn invoke_function<B: Serialize, T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        name: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let timer = BACKEND_REQUEST_DURATION
            .with_label_values(&[name])
            .start_timer();

        let response = self
            .post(token, &self.url(&format!("functions/v1/{}", name)))
            .json(body)
            .send()
            .await?;
        let result = read_json(response, name).await?;

        timer.observe_duration();
        Ok(result)
    }
}

/// Decode a JSON body, mapping non-success statuses to `AppError`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &str,
) -> Result<T, AppError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(operation = %operation, status = %status, body = %body, "Backend call failed");
        return Err(AppError::from_upstream(status, operation, &body));
    }

    // 204 or an empty representation
    if body.trim().is_empty() {
        return Ok(serde_json::from_str("[]")?);
    }

    Ok(serde_json::from_str(&body)?)
}

/// Like [`read_json`] for calls whose body is irrelevant.
pub(crate) async fn expect_success(response: Response, operation: &str) -> Result<(), AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(operation = %operation, status = %status, body = %body, "Backend call failed");
    Err(AppError::from_upstream(status, operation, &body))
}
