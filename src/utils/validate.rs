//! Filename validation for downloaded files.

use thiserror::Error;

/// Validation errors
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Filename is empty after sanitizing: {0:?}")]
    InvalidFilename(String),
}

/// Longest file stem we produce, in characters
const MAX_STEM_LENGTH: usize = 120;

/// Turn arbitrary text (usually an article title) into a safe file stem
///
/// Letters, digits, dashes and underscores are kept, whitespace runs become
/// single spaces and everything else (path separators and dots included)
/// becomes an underscore, so the result can never leave its directory.
pub fn sanitize_filename(text: &str) -> Result<String, ValidationError> {
    let mapped: String = text
        .chars()
        .filter(|ch| *ch != '\0')
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' || ch.is_whitespace() {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem: String = collapsed.chars().take(MAX_STEM_LENGTH).collect();
    let stem = stem.trim().to_string();

    if stem.chars().all(|ch| ch == '_') {
        return Err(ValidationError::InvalidFilename(text.to_string()));
    }
    Ok(stem)
}
