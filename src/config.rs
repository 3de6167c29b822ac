//!
//! src/config.rs
//!
//! Loads environment-driven configuration for the crawler:
//! API endpoints, http tunables, retry policy, page limits
//!
//!

use url::Url;
use std::time;
use crate::IngestError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const RETRY_MAX_ATTEMPTS: usize = 2;
pub const RETRY_DELAY_MS: u64 = 5000;
pub const QUOTA_ERROR_CODE: i64 = 4;

pub const PLAYLIST_PAGE_LIMIT: u32 = 100;
pub const TRACK_PAGE_LIMIT: u32 = 2000;

/// Wrapper over env::var to return an invalid environment var error
fn env_check(s: &str) -> Result<String, IngestError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IngestError::Config(format!("{s} was not set"))),
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

///
/// Configuration for the Deezer catalog API
///
#[derive(Debug, Clone)]
pub struct DeezerConfig {
    pub base_url: Url,              // https://api.deezer.com/
    pub playlist_page_limit: u32,   // single listing page, default 100
    pub track_page_limit: u32,      // per-playlist track cap, default 2000
}

fn build_deezer() -> Result<DeezerConfig, IngestError> {
    let env_to_uint = |s: &str, default: u32| -> u32 {
        std::env::var(s)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default)
    };

    let base_url = std::env::var("DEEZER_BASE_URL")
        .unwrap_or_else(|_| "https://api.deezer.com/".to_string());

    let mut base_url = Url::parse(&base_url)
        .map_err(|e| IngestError::Config(
            format!("DEEZER_BASE_URL invalid {e}")
        ))?;

    // Skip https/host checks when explicitly pointed at a local stand-in
    if std::env::var("DEEZER_ALLOW_ANY_HOST").is_err() {
        ensure_https(&base_url)
            .map_err(IngestError::Config)?;
        ensure_host(&base_url, "api.deezer.com")
            .map_err(IngestError::Config)?;
    }

    // ensure trailing slash
    if !base_url.path().ends_with('/') {
        let mut path = base_url.path().to_string();
        path.push('/');
        base_url.set_path(&path);
    }

    let playlist_page_limit = env_to_uint("DEEZER_PLAYLIST_LIMIT", PLAYLIST_PAGE_LIMIT);
    let track_page_limit    = env_to_uint("DEEZER_TRACK_LIMIT", TRACK_PAGE_LIMIT);

    Ok( DeezerConfig { base_url, playlist_page_limit, track_page_limit } )
}

///
/// Configuration for the quota-retry policy inside the fetch layer
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay: time::Duration,
    pub quota_code: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: RETRY_MAX_ATTEMPTS,
            delay: time::Duration::from_millis(RETRY_DELAY_MS),
            quota_code: QUOTA_ERROR_CODE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            retry: RetryConfig::default(),
        }
    }
}

///
/// Configuration for one ingestion run: whose playlists, which mode,
/// where the calling layer puts the result
///
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub user_id: String,
    pub full: bool,
    pub output_path: String,
}

fn build_ingest() -> Result<IngestConfig, IngestError> {
    let user_id = env_check("DEEZER_USER_ID")?;
    let full = std::env::var("FULL_TRACKS").ok().as_deref() == Some("1");
    let output_path = std::env::var("TRACK_LIST_PATH")
        .unwrap_or_else(|_| "./track_list.json".to_string());

    Ok( IngestConfig { user_id, full, output_path } )
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,playlist_crawler=debug,reqwest=warn".to_string(),
            include_file_line: true,
            include_target: true,
        }
    }
}

///
/// AppConfig which holds everything needed by the fetch and catalog modules
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub deezer: DeezerConfig,
    pub http: HttpConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, IngestError> {
    dotenvy::dotenv().ok();

    let deezer  = build_deezer()?;
    let http    = HttpConfig::default();
    let ingest  = build_ingest()?;
    let logging = LoggingConfig::default();

    Ok( AppConfig { deezer, http, ingest, logging } )
}
