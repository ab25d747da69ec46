//! HTTP client for the backend's PostgREST endpoint.
//!
//! Provides table selects driven by [`QueryBuilder`], exact row counts and a
//! cheap probe used by connection tests and the auth debugger.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{CheckerError, Result};
use crate::models::QueryBuilder;
use crate::utils::{parse_content_range_total, truncate_string};
use crate::validation::InputValidator;

/// PostgREST's stock `max-rows`
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Which headers carry the service key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// `apikey` and `Authorization: Bearer`
    ApiKeyAndBearer,
    /// `Authorization: Bearer` only
    BearerOnly,
    /// `apikey` only
    ApiKeyOnly,
}

impl AuthMethod {
    /// Every method, most permissive first
    pub const ALL: [Self; 3] = [Self::ApiKeyAndBearer, Self::BearerOnly, Self::ApiKeyOnly];

    /// Human-readable name
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::ApiKeyAndBearer => "apikey + Authorization Bearer",
            Self::BearerOnly => "Authorization Bearer only",
            Self::ApiKeyOnly => "apikey only",
        }
    }
}

/// Client for `{base}/rest/v1/{table}`
#[derive(Clone, Debug)]
pub struct RestClient {
    client: Client,
    base_url: String,
    service_key: String,
    auth: AuthMethod,
    probe_timeout: Duration,
    page_size: usize,
}

impl RestClient {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            auth: AuthMethod::ApiKeyAndBearer,
            probe_timeout: timeout,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Build a client from configuration, validating URL and key first
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        InputValidator::validate_backend_url(&config.url)?;
        InputValidator::validate_service_key(&config.service_key)?;

        let mut client = Self::new(
            &config.url,
            &config.service_key,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.probe_timeout = Duration::from_secs(config.connect_timeout_secs);
        Ok(client.with_page_size(config.page_size))
    }

    /// Use a different header combination
    #[must_use]
    pub const fn with_auth_method(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    /// Request at most `page_size` rows per page in [`Self::select_all`]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn apply_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match self.auth {
            AuthMethod::ApiKeyAndBearer => request
                .header("apikey", &self.service_key)
                .bearer_auth(&self.service_key),
            AuthMethod::BearerOnly => request.bearer_auth(&self.service_key),
            AuthMethod::ApiKeyOnly => request.header("apikey", &self.service_key),
        };
        request.header("Content-Type", "application/json")
    }

    fn get(&self, table: &str, query: &QueryBuilder) -> RequestBuilder {
        let request = self.client.get(self.table_url(table)).query(&query.to_query_pairs());
        self.apply_headers(request)
    }

    /// Select rows of `table` and deserialize them
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &QueryBuilder) -> Result<Vec<T>> {
        let response = self
            .get(table, query)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = check_status(response, table).await?;

        let rows: Vec<T> = response.json().await?;
        debug!(table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// Select every row of `table`, one `limit`/`offset` page at a time.
    ///
    /// The backend truncates each response at its `max-rows` setting, so
    /// pages are requested until the `Content-Range` total is reached. When
    /// no total is reported a short page ends the scan.
    pub async fn select_all<T: DeserializeOwned>(&self, table: &str, query: &QueryBuilder) -> Result<Vec<T>> {
        let mut rows: Vec<T> = Vec::new();

        loop {
            let page_query = query.clone().limit(self.page_size).offset(rows.len());
            let response = self
                .get(table, &page_query)
                .header("Prefer", "count=exact")
                .send()
                .await?;
            let response = check_status(response, table).await?;

            let total = response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total);
            let page: Vec<T> = response.json().await?;
            let page_rows = page.len();
            rows.extend(page);
            debug!(table, page_rows, fetched = rows.len(), total = ?total, "Fetched page");

            let fetched = u64::try_from(rows.len()).unwrap_or(u64::MAX);
            let done = match total {
                Some(total) => page_rows == 0 || fetched >= total,
                None => page_rows < self.page_size,
            };
            if done {
                break;
            }
        }

        Ok(rows)
    }

    /// Exact row count of `table`, if the backend reports one
    pub async fn count(&self, table: &str) -> Result<Option<u64>> {
        let query = QueryBuilder::new().select(&["id"]).limit(1);
        let response = self.get(table, &query).header("Prefer", "count=exact").send().await?;
        let response = check_status(response, table).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        Ok(total)
    }

    /// Fetch at most one id from `table` using the short probe timeout
    pub async fn probe(&self, table: &str) -> Result<usize> {
        let query = QueryBuilder::new().select(&["id"]).limit(1);
        let response = self.get(table, &query).timeout(self.probe_timeout).send().await?;
        let response = check_status(response, table).await?;

        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows.len())
    }
}

/// Map non-success statuses to typed errors.
pub(crate) async fn check_status(response: Response, table: &str) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(CheckerError::Unauthorized(table.to_string())),
        StatusCode::NOT_FOUND => Err(CheckerError::TableNotFound(table.to_string())),
        status => {
            let mut url = response.url().clone();
            url.set_query(None);
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            Err(CheckerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: truncate_string(&body, 500),
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_strips_trailing_slash() {
        let client = RestClient::new("https://abc.supabase.co/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.table_url("videos"), "https://abc.supabase.co/rest/v1/videos");
    }

    #[test]
    fn test_from_config_rejects_non_jwt_key() {
        let config = BackendConfig {
            url: "https://abc.supabase.co".into(),
            service_key: "sk_live_123".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            page_size: 1000,
        };
        let err = RestClient::from_config(&config).unwrap_err();
        assert!(err.is_fatal());
    }
}
