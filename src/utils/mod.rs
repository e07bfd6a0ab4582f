//! Utility modules shared across the crate.
//!
//! - [`HttpClient`]: shared reqwest client with the crate's user agent
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff on transient fetch errors
//! - [`normalize_whitespace`] / [`bool_string`]: text helpers for pages and settings
//! - [`sanitize_filename`]: safe file names for downloaded PDFs
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use journal_swiper::fetch::FetchError;
//! use journal_swiper::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_page() -> Result<Vec<u8>, FetchError> { Ok(Vec::new()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), FetchError> {
//! let config = RetryConfig::default().max_retries(3);
//! let body = with_retry(config, || fetch_page()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;
mod text;
mod validate;

pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use retry::{with_retry, RetryConfig, TransientError};
pub use text::{bool_string, normalize_whitespace};
pub use validate::{sanitize_filename, ValidationError};
