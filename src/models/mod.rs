//! Core data models for crawled articles.

mod article;
mod field;

pub use article::{Article, Citation, PartialRecord, Supplementary};
pub use field::{Field, FieldMap};
