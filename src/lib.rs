//! # Journal Swiper
//!
//! Crawls a publication's table-of-contents pages down to its individual
//! articles, collecting bibliographic fields and PDF links along the way.
//!
//! ## Architecture
//!
//! - [`mode`]: declarative crawl descriptions (Mode, Step, Location, Tag)
//! - [`settings`]: the versioned XML file modes are stored in
//! - [`document`]: HTML and XML page parsing
//! - [`resolver`]: evaluating Locations against parsed pages
//! - [`walker`]: concurrent execution of a Mode from a root page
//! - [`fetch`]: page fetching (HTTP and in-memory)
//! - [`download`]: saving article PDFs
//! - [`models`]: article records and the field enumeration
//! - [`config`]: application configuration
//!
//! ```no_run
//! use std::sync::Arc;
//! use journal_swiper::fetch::HttpFetcher;
//! use journal_swiper::settings::SettingsReader;
//! use journal_swiper::utils::HttpClient;
//! use journal_swiper::walker::{WalkOptions, Walker};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = SettingsReader::load("modes.xml".as_ref())?;
//! let mode = Arc::new(reader.mode("Example")?);
//!
//! let fetcher = Arc::new(HttpFetcher::new(HttpClient::new()?));
//! let walker = Walker::new(fetcher, WalkOptions::default());
//! let report = walker.run(mode, "https://journal.example/toc").await;
//!
//! for article in &report.articles {
//!     println!("{:?} {:?}", article.title, article.pdf_link);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod download;
pub mod fetch;
pub mod mode;
pub mod models;
pub mod resolver;
pub mod settings;
pub mod utils;
pub mod walker;

// Re-export commonly used types
pub use mode::{Mode, ModeError};
pub use models::{Article, Field};
pub use walker::{WalkReport, Walker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
