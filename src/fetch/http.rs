//! HTTP fetcher backed by reqwest.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::{FetchError, Fetcher};
use crate::utils::{with_retry, HttpClient, RetryConfig};

/// Fetches pages over HTTP(S), retrying transient failures
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: HttpClient,
    retry: RetryConfig,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let parsed =
            Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }

        tracing::debug!("GET {}", parsed);

        with_retry(self.retry, || {
            let client = self.client.clone();
            let url = parsed.clone();
            async move {
                let response = client
                    .client()
                    .get(url.clone())
                    .timeout(timeout)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            FetchError::Timeout(timeout)
                        } else {
                            FetchError::from(e)
                        }
                    })?;

                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(FetchError::NotFound(url.to_string()));
                }
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }

                let body = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout(timeout)
                    } else {
                        FetchError::Network(format!("Failed to read body of {}: {}", url, e))
                    }
                })?;

                Ok(body.to_vec())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(HttpClient::new().unwrap()).with_retry(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        })
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/toc")
            .with_status(200)
            .with_body("<html><h1>Contents</h1></html>")
            .create_async()
            .await;

        let body = fetcher()
            .fetch(&format!("{}/toc", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(body, b"<html><h1>Contents</h1></html>".to_vec());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let result = fetcher()
            .fetch(&format!("{}/missing", server.url()), Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let result = fetcher()
            .fetch(&format!("{}/flaky", server.url()), Duration::from_secs(5))
            .await;

        assert_eq!(result, Err(FetchError::Status { status: 503 }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        let fetcher = fetcher();
        assert!(matches!(
            fetcher.fetch("not a url", Duration::from_secs(1)).await,
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher.fetch("ftp://example.com/x", Duration::from_secs(1)).await,
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
