//! Article records produced by a crawl.

use serde::{Deserialize, Serialize};

use super::field::{Field, FieldMap};

/// Citation metadata of an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub year: Option<String>,
}

/// Supplementary material attached to an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplementary {
    pub title: Option<String>,
    pub pdf: Option<String>,
    pub desc: Option<String>,
}

/// One discovered article
///
/// Records are frozen once the walk reaches the terminal step of a branch
/// and are handed to the download collaborator in table-of-contents order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: Option<String>,

    pub authors: Vec<String>,

    pub citation: Citation,

    pub supplementary: Supplementary,

    /// Direct PDF URL
    pub pdf_link: Option<String>,

    /// Link to the article's own page, from the article-link step
    pub article_page_link: Option<String>,

    /// URL of the terminal page this record was finalized on
    pub source_link: Option<String>,
}

impl Article {
    /// Check if article has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_link.as_deref().is_some_and(|l| !l.is_empty())
    }

    /// Whether the record looks like a real article rather than a stray link
    ///
    /// Leaves with neither a title nor a PDF link are dropped during
    /// flattening.
    pub fn is_substantive(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty()) || self.has_pdf()
    }

    /// Authors joined for display
    pub fn author_line(&self) -> String {
        self.authors.join("; ")
    }
}

/// Article fields gathered along the path from the root to a branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    values: FieldMap<Vec<String>>,
    article_page_link: Option<String>,
}

impl PartialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge resolved values for a field.
    ///
    /// Empty values are ignored. Single-valued fields keep the first non-empty
    /// value ever merged; multi-valued fields keep every value of the first
    /// non-empty merge. Returns whether anything was stored.
    pub fn merge(&mut self, field: Field, values: impl IntoIterator<Item = String>) -> bool {
        if self.values.contains(field) {
            return false;
        }

        let mut kept: Vec<String> = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        if kept.is_empty() {
            return false;
        }
        if !field.is_multi_valued() {
            kept.truncate(1);
        }

        self.values.insert(field, kept);
        true
    }

    pub fn set_article_page_link(&mut self, link: impl Into<String>) {
        if self.article_page_link.is_none() {
            self.article_page_link = Some(link.into());
        }
    }

    /// First value gathered for a field
    pub fn first(&self, field: Field) -> Option<&str> {
        self.values
            .get(field)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn article_page_link(&self) -> Option<&str> {
        self.article_page_link.as_deref()
    }

    /// Freeze the record into an [`Article`]
    pub fn freeze(self, source_link: Option<String>) -> Article {
        let mut values = self.values;
        let mut take = |field: Field| -> Option<String> {
            values
                .get_mut(field)
                .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
        };

        let title = take(Field::Title);
        let pdf_link = take(Field::Pdf);
        let citation = Citation {
            journal: take(Field::Journal),
            volume: take(Field::Volume),
            issue: take(Field::Issue),
            pages: take(Field::Pages),
            doi: take(Field::Doi),
            year: take(Field::Year),
        };
        let supplementary = Supplementary {
            title: take(Field::SuppTitle),
            pdf: take(Field::SuppPdf),
            desc: take(Field::SuppDesc),
        };
        let authors = values
            .get_mut(Field::Authors)
            .map(std::mem::take)
            .unwrap_or_default();

        Article {
            title,
            authors,
            citation,
            supplementary,
            pdf_link,
            article_page_link: self.article_page_link,
            source_link,
        }
    }
}
