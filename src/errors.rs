//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the ingestion pipeline uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self { IngestError::Http(e.to_string()) }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self { IngestError::Parse(e.to_string()) }
}
