//! Declarative crawl descriptions.
//!
//! A [`Mode`] describes how to walk from a table-of-contents page, through
//! any number of intermediate listing pages, down to an article page:
//!
//! - [`Tag`]: one element-matching unit (`a.issue-link@href`)
//! - [`Location`]: a rooted path of tags evaluated under one step
//! - [`Step`]: one navigation stage with its next-link and field locations
//! - [`Mode`]: the ordered steps of a crawl
//!
//! Modes are built either from a [`RawModeConfig`](crate::settings::RawModeConfig)
//! read by the settings collaborator, or in code from [`StepDecl`]s.
//!
//! ```
//! use journal_swiper::mode::{Mode, StepDecl};
//! use journal_swiper::models::Field;
//!
//! let mode = Mode::new(
//!     "Example",
//!     2,
//!     vec![
//!         StepDecl::html(0).link("a.issue-link@href").unwrap(),
//!         StepDecl::html(1)
//!             .field(Field::Title, "h1").unwrap()
//!             .field(Field::Pdf, "a.pdf@href").unwrap(),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(mode.nsteps(), 2);
//! ```

mod loader;
mod step;
mod tag;

pub use step::{Mode, Step, StepDecl};
pub use tag::{Location, Tag};

/// Errors in the configuration that describes a Mode
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Tag name must not be empty")]
    MissingTagName,

    #[error("Only the last tag of a location may extract an attribute (found @{attribute} on '{tag}')")]
    InvalidAttributeTarget { tag: String, attribute: String },

    #[error("Location path must contain at least one tag")]
    EmptyLocation,

    #[error("Invalid tag syntax: {0}")]
    InvalidTagSyntax(String),

    #[error("Unknown field name: {0}")]
    UnknownField(String),

    #[error("Unknown parser kind: {0}")]
    UnknownParser(String),

    #[error("Settings file has no version attribute")]
    MissingVersion,

    #[error("Invalid settings version: {0}")]
    InvalidVersion(String),

    #[error("Unsupported settings version {found} (supported: {min} to {max})")]
    UnsupportedVersion { found: f64, min: f64, max: f64 },

    #[error("Mode not found: {0}")]
    ModeNotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Structural violations of the Mode invariants
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModeError {
    #[error("Mode declares no steps")]
    NoSteps,

    #[error("Link locations must be specified from the first page to the article page (step {step} has none)")]
    MissingLink { step: usize },

    #[error("Terminal step {step} must not declare a link location")]
    TerminalLink { step: usize },

    #[error("No tag was specified in a location list (step {step}, {context})")]
    MissingTagIdentity { step: usize, context: String },

    #[error("Step indices are not contiguous: expected {expected}, found {found}")]
    StepIndexGap { expected: usize, found: usize },

    #[error("Mode declares {declared} steps but defines {found}")]
    StepCountMismatch { declared: usize, found: usize },

    #[error("Steps {first} and {second} are both marked as the article link step")]
    DuplicateArticleLinkStep { first: usize, second: usize },

    #[error("Terminal step {step} cannot be the article link step")]
    ArticleLinkOnTerminal { step: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
