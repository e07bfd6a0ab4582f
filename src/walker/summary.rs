use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::time::Duration;

use super::{BranchPath, WalkError};

/// A branch-level problem recorded during a walk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchIssue {
    pub path: BranchPath,
    pub step_index: usize,
    pub link: String,
    #[serde(serialize_with = "as_display")]
    pub error: WalkError,
}

/// What happened during a walk, besides the articles it produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: String,
    pub root_link: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Branches processed, whatever their outcome
    pub branches: usize,
    /// Branches that failed to fetch, parse or run
    pub failed: Vec<BranchIssue>,
    /// Non-terminal pages whose next-link location matched nothing
    pub empty_expansions: Vec<BranchIssue>,
    /// Branches never fetched because the walk was cancelled
    pub skipped: usize,
    /// Branches whose results arrived after cancellation
    pub discarded: usize,
    /// Finalized records without a title or PDF link
    pub dropped_records: usize,
    pub cancelled: bool,
    pub budget_exhausted: bool,
}

impl RunSummary {
    pub(crate) fn new(mode: &str, root_link: &str) -> Self {
        Self {
            mode: mode.to_string(),
            root_link: root_link.to_string(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            branches: 0,
            failed: Vec::new(),
            empty_expansions: Vec::new(),
            skipped: 0,
            discarded: 0,
            dropped_records: 0,
            cancelled: false,
            budget_exhausted: false,
        }
    }

    /// Whether every branch ran to completion without failure
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

fn as_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
