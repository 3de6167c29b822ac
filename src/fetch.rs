//!
//! src/fetch.rs
//!
//! Defines the Deezer API client, the endpoint URL builders, and the
//! quota-aware retrying fetch layer everything else reads through
//!

use std::sync::Arc;

use url::Url;
use reqwest::{Client, header, redirect};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::{DeezerConfig, HttpConfig, RetryConfig};
use crate::IngestError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, IngestError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| IngestError::Http(format!("build client: {e}")))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, IngestError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers(http, h)
}

/// One logical remote read, already parsed. The seam the retry layer and
/// the tests sit on.
#[async_trait::async_trait]
pub trait ApiSource: Send + Sync {
    async fn get_json(&self, url: &Url) -> Result<Value, IngestError>;
}

#[derive(Clone, Debug)]
pub struct DeezerClient {
    pub http: Client,
    pub cfg: DeezerConfig,
}

impl DeezerClient {
    pub fn new(http_config: &HttpConfig, cfg: &DeezerConfig) ->
        Result<Self, IngestError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone(),
        })
    }

    /// GET /user/{id}/playlists?limit=
    pub fn user_playlists(&self, user_id: &str) -> Url {
        let mut url = self.cfg.base_url
            .join(&format!("user/{user_id}/playlists"))
            .unwrap();
        url.set_query(Some(&format!("limit={}", self.cfg.playlist_page_limit)));
        url
    }

    /// GET /playlist/{id}?limit=
    pub fn playlist(&self, playlist_id: u64) -> Url {
        let mut url = self.cfg.base_url
            .join(&format!("playlist/{playlist_id}"))
            .unwrap();
        url.set_query(Some(&format!("limit={}", self.cfg.track_page_limit)));
        url
    }

    /// GET /track/{id}
    pub fn track(&self, track_id: u64) -> Url {
        self.cfg.base_url
            .join(&format!("track/{track_id}"))
            .unwrap()
    }
}

#[async_trait::async_trait]
impl ApiSource for DeezerClient {
    async fn get_json(&self, url: &Url) -> Result<Value, IngestError> {
        let resp = self.http.get(url.clone()).send().await?;
        let v = resp.json::<Value>().await?;
        Ok(v)
    }
}

/// The quota sentinel: an `error` object whose `code` matches. Any other
/// error shape is the caller's problem.
fn is_quota_exceeded(payload: &Value, quota_code: i64) -> bool {
    payload.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        == Some(quota_code)
}

/// Wraps an `ApiSource` with the bounded fixed-delay retry policy for
/// quota-limited responses.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn ApiSource>,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ApiSource>, retry: RetryConfig) -> Self {
        Self { source, retry }
    }

    /// One logical read of `url`. Quota-limited payloads are retried after
    /// a fixed delay up to the configured budget; exhaustion is fatal.
    pub async fn fetch(&self, url: &Url) -> Result<Value, IngestError> {
        for attempt in 1..=self.retry.max_retries {
            let payload = self.source.get_json(url).await?;
            if !is_quota_exceeded(&payload, self.retry.quota_code) {
                return Ok(payload);
            }
            warn!(
                url = %url, attempt, max = self.retry.max_retries,
                delay_ms = self.retry.delay.as_millis() as u64,
                "fetch.retry"
            );
            sleep(self.retry.delay).await;
        }
        error!(url = %url, retries = self.retry.max_retries, "fetch.exhausted");
        Err(IngestError::QuotaExceeded(
            format!("{url} after {} retries", self.retry.max_retries)
        ))
    }
}
