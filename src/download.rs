//! Fetching article PDFs into a directory.
//!
//! Each article with a PDF link is saved as `NN_<title>.pdf`, numbered in
//! table-of-contents order. A failed article is reported in its
//! [`DownloadOutcome`] and does not stop the others.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::{FetchError, Fetcher};
use crate::models::Article;
use crate::utils::sanitize_filename;

/// Errors that can occur while downloading one article
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DownloadError {
    #[error("Article has no PDF link")]
    NoPdfLink,

    #[error("Failed to fetch PDF: {0}")]
    Fetch(#[from] FetchError),

    #[error("Response from {0} is not a PDF")]
    NotPdf(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// A PDF written to disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Result of downloading one article
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    /// 1-based position of the article in the walk's output
    pub position: usize,
    pub title: Option<String>,
    pub result: Result<DownloadedFile, DownloadError>,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// File name for the article at 1-based `position` out of `total`
pub fn pdf_file_name(position: usize, total: usize, title: Option<&str>) -> String {
    let width = total.to_string().len().max(2);
    let stem = title
        .and_then(|t| sanitize_filename(t).ok())
        .unwrap_or_else(|| "article".to_string());
    format!("{:0width$}_{}.pdf", position, stem, width = width)
}

/// Download every article's PDF into `directory`, in order
///
/// Fails only when the directory cannot be created.
pub async fn download_articles(
    fetcher: &dyn Fetcher,
    articles: &[Article],
    directory: &Path,
    timeout: Duration,
) -> Result<Vec<DownloadOutcome>, DownloadError> {
    std::fs::create_dir_all(directory).map_err(|e| {
        DownloadError::Io(format!(
            "Failed to create directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    let total = articles.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, article) in articles.iter().enumerate() {
        let position = i + 1;
        let result = download_one(fetcher, article, position, total, directory, timeout).await;
        match &result {
            Ok(file) => tracing::info!("Saved {} ({} bytes)", file.path.display(), file.bytes),
            Err(e) => tracing::warn!(
                "Article {} ({}) not downloaded: {}",
                position,
                article.title.as_deref().unwrap_or("untitled"),
                e
            ),
        }
        outcomes.push(DownloadOutcome {
            position,
            title: article.title.clone(),
            result,
        });
    }

    Ok(outcomes)
}

async fn download_one(
    fetcher: &dyn Fetcher,
    article: &Article,
    position: usize,
    total: usize,
    directory: &Path,
    timeout: Duration,
) -> Result<DownloadedFile, DownloadError> {
    let link = article
        .pdf_link
        .as_deref()
        .filter(|l| !l.is_empty())
        .ok_or(DownloadError::NoPdfLink)?;

    let bytes = fetcher.fetch(link, timeout).await?;
    if !bytes.starts_with(b"%PDF") {
        return Err(DownloadError::NotPdf(link.to_string()));
    }

    let path = directory.join(pdf_file_name(position, total, article.title.as_deref()));
    std::fs::write(&path, &bytes)
        .map_err(|e| DownloadError::Io(format!("{}: {}", path.display(), e)))?;

    Ok(DownloadedFile {
        path,
        bytes: bytes.len() as u64,
    })
}
