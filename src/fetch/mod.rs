//! Page fetching.
//!
//! The walker only depends on the [`Fetcher`] trait. [`HttpFetcher`] fetches
//! over HTTP with retries on transient errors; [`MockFetcher`] serves pages
//! from memory for tests and offline runs.

mod http;
pub mod mock;

pub use http::HttpFetcher;
pub use mock::MockFetcher;

use async_trait::async_trait;
use std::time::Duration;

/// Source of raw page bytes
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Fetch the body at `url`, giving up after `timeout`
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

/// Errors that can occur while fetching a page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Page not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
