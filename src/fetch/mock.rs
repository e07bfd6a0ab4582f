//! In-memory fetcher for tests and offline runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{FetchError, Fetcher};

/// Serves canned responses keyed by URL and records every fetch
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>,
    latency: HashMap<String, Duration>,
    default_latency: Option<Duration>,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MockFetcher::add_page`]
    pub fn with_page(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.add_page(url, body);
        self
    }

    /// Builder form of [`MockFetcher::add_failure`]
    pub fn with_failure(self, url: impl Into<String>, error: FetchError) -> Self {
        self.add_failure(url, error);
        self
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = Some(latency);
        self
    }

    /// Delay responses for one URL, overriding the default latency
    pub fn with_latency_for(mut self, url: impl Into<String>, latency: Duration) -> Self {
        self.latency.insert(url.into(), latency);
        self
    }

    pub fn add_page(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Ok(body.into()));
    }

    pub fn add_failure(&self, url: impl Into<String>, error: FetchError) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Err(error));
    }

    /// URLs fetched so far, in request order
    pub fn fetched(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `url` was requested
    pub fn fetch_count(&self, url: &str) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let delay = self.latency.get(url).copied().or(self.default_latency);
        if let Some(delay) = delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(FetchError::Timeout(timeout));
            }
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(url.to_string())))
    }
}
