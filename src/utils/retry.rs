//! Retry utilities with exponential backoff for page fetches.

use std::time::Duration;
use tokio::time::sleep;

use crate::fetch::FetchError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Allow `retries` additional attempts after the first
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_attempts = retries + 1;
        self
    }

    /// A configuration that never retries
    pub fn none() -> Self {
        Self::default().max_retries(0)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(attempt.saturating_sub(1) as f64);
        Duration::from_secs_f64(exp_delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Request timeout
    Timeout,
    /// Server error (5xx)
    ServerError,
    /// Too many requests (429)
    TooManyRequests,
}

impl TransientError {
    /// Check if a FetchError represents a transient error
    pub fn from_fetch_error(err: &FetchError) -> Option<Self> {
        match err {
            FetchError::Network(_) => Some(TransientError::Network),
            FetchError::Timeout(_) => Some(TransientError::Timeout),
            FetchError::Status { status: 429 } => Some(TransientError::TooManyRequests),
            FetchError::Status { status } if (500..600).contains(status) => {
                Some(TransientError::ServerError)
            }
            _ => None,
        }
    }

    /// Minimum delay before retrying after this error
    pub fn minimum_delay(&self) -> Duration {
        match self {
            TransientError::TooManyRequests => Duration::from_secs(5),
            _ => Duration::ZERO,
        }
    }
}

/// Execute an async operation, retrying transient fetch errors
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::debug!(
                        "Fetch succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                let Some(transient) = TransientError::from_fetch_error(&error) else {
                    // Permanent error - return immediately
                    return Err(error);
                };

                if attempts >= config.max_attempts {
                    tracing::debug!("Fetch failed after {} attempts: {}", attempts, error);
                    return Err(error);
                }

                let delay = std::cmp::max(config.delay_for(attempts), transient.minimum_delay());
                tracing::debug!(
                    "Transient error on attempt {}: {:?}, retrying in {:?}",
                    attempts,
                    transient,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(4), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let count = *call_count.borrow();
                    if count < 3 {
                        Err(FetchError::Network("temporary error".to_string()))
                    } else {
                        Ok("page")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "page");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, FetchError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(FetchError::Status { status: 404 })
                }
            })
        }
        .await;

        assert_eq!(result, Err(FetchError::Status { status: 404 }));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), FetchError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(2), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(FetchError::Status { status: 503 })
                }
            })
        }
        .await;

        assert!(result.is_err());
        assert_eq!(*call_count.borrow(), 2);
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_fetch_error(&FetchError::Status { status: 502 }),
            Some(TransientError::ServerError)
        );
        assert_eq!(
            TransientError::from_fetch_error(&FetchError::Status { status: 429 }),
            Some(TransientError::TooManyRequests)
        );
        assert!(TransientError::from_fetch_error(&FetchError::InvalidUrl("x".into())).is_none());
        assert_eq!(RetryConfig::none().max_attempts, 1);
    }
}
