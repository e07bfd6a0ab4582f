//! Mode execution.
//!
//! A walk starts from one root page and follows the Mode's steps down to the
//! article pages. Every page is a [`Branch`] processed by its own task; the
//! coordinator in [`Walker`] collects finished branches, spawns their
//! children and records everything into a [`BranchTree`]. The tree's depth is
//! bounded by the Mode's step count, its breadth only by the pages.
//!
//! Failures are isolated per branch and reported in the [`RunSummary`]; they
//! never stop sibling branches.

mod branch;
mod cancel;
mod summary;

pub use branch::{absolutize, Branch, BranchNode, BranchPath, BranchState, BranchTree};
pub use cancel::CancelToken;
pub use summary::{BranchIssue, RunSummary};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::document::ParseError;
use crate::fetch::{FetchError, Fetcher};
use crate::mode::Mode;
use crate::models::Article;
use branch::{process_page, PageOutcome};

/// Default number of concurrent page fetches
pub const DEFAULT_WORKERS: usize = 8;

/// Default per-request fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Branch-level errors; recorded, never fatal to the walk
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalkError {
    #[error("Failed to fetch {link}: {source}")]
    FetchFailed { link: String, source: FetchError },

    #[error("Failed to parse {link}: {source}")]
    ParseFailed { link: String, source: ParseError },

    #[error("No links found on {link} at step {step_index}")]
    EmptyExpansion { link: String, step_index: usize },

    #[error("Branch task aborted: {reason}")]
    TaskAborted { reason: String },
}

/// Tuning knobs of a walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Maximum number of concurrent fetches
    pub workers: usize,
    /// Timeout handed to the fetcher for each page
    pub fetch_timeout: Duration,
    /// Overall wall-clock budget; the walk is cancelled once it runs out
    pub time_budget: Option<Duration>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            time_budget: None,
        }
    }
}

impl WalkOptions {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Everything a walk produced
#[derive(Debug, Clone)]
pub struct WalkReport {
    /// Substantive articles in table-of-contents order
    pub articles: Vec<Article>,
    pub summary: RunSummary,
    pub tree: BranchTree,
}

/// What a branch task hands back to the coordinator
#[derive(Debug)]
enum TaskOutcome {
    /// Cancelled before the page was fetched
    Skipped,
    /// Fetched, but the walk was cancelled meanwhile
    Discarded,
    Failed(WalkError),
    Page(PageOutcome),
}

#[derive(Debug)]
struct TaskResult {
    branch: Branch,
    outcome: TaskOutcome,
}

/// Runs Modes against root pages
#[derive(Debug, Clone)]
pub struct Walker {
    fetcher: Arc<dyn Fetcher>,
    options: WalkOptions,
}

impl Walker {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: WalkOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Fetch `root_url` and walk from it
    pub async fn run(&self, mode: Arc<Mode>, root_url: &str) -> WalkReport {
        self.walk(mode, Branch::root(root_url, None), CancelToken::new())
            .await
    }

    /// Walk from an already fetched root page
    ///
    /// `root_url` is still needed to resolve relative links on the page.
    pub async fn run_document(
        &self,
        mode: Arc<Mode>,
        root_url: &str,
        body: impl Into<Vec<u8>>,
    ) -> WalkReport {
        self.walk(
            mode,
            Branch::root(root_url, Some(body.into())),
            CancelToken::new(),
        )
        .await
    }

    /// Like [`Walker::run`], stoppable from outside through `cancel`
    pub async fn run_with_cancel(
        &self,
        mode: Arc<Mode>,
        root_url: &str,
        cancel: CancelToken,
    ) -> WalkReport {
        self.walk(mode, Branch::root(root_url, None), cancel).await
    }

    async fn walk(&self, mode: Arc<Mode>, root: Branch, cancel: CancelToken) -> WalkReport {
        let clock = Instant::now();
        let mut summary = RunSummary::new(mode.name(), &root.link);
        let mut tree = BranchTree::new();
        let permits = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let deadline = self
            .options
            .time_budget
            .map(|budget| tokio::time::Instant::now() + budget);

        tracing::info!(
            "Walking mode '{}' from {} with {} workers",
            mode.name(),
            root.link,
            self.options.workers.max(1)
        );

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, Branch> = HashMap::new();
        self.spawn(&mut tasks, &mut in_flight, &mode, &permits, &cancel, root);

        loop {
            let joined = match deadline {
                Some(deadline) if !cancel.is_cancelled() => {
                    tokio::select! {
                        joined = tasks.join_next_with_id() => joined,
                        _ = tokio::time::sleep_until(deadline) => {
                            tracing::warn!(
                                "Time budget of {:?} exhausted, cancelling walk",
                                self.options.time_budget.unwrap_or_default()
                            );
                            summary.budget_exhausted = true;
                            cancel.cancel();
                            continue;
                        }
                    }
                }
                _ => tasks.join_next_with_id().await,
            };

            let Some(joined) = joined else {
                break;
            };
            summary.branches += 1;

            let result = match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    result
                }
                Err(join_error) => {
                    let Some(branch) = in_flight.remove(&join_error.id()) else {
                        tracing::error!("Lost track of an aborted branch task: {}", join_error);
                        continue;
                    };
                    TaskResult {
                        branch,
                        outcome: TaskOutcome::Failed(WalkError::TaskAborted {
                            reason: join_error.to_string(),
                        }),
                    }
                }
            };

            let children = record_result(&mut tree, &mut summary, &cancel, result);
            for child in children {
                self.spawn(&mut tasks, &mut in_flight, &mode, &permits, &cancel, child);
            }
        }

        summary.cancelled = cancel.is_cancelled();
        let finalized = tree.finalized().count();
        let articles = tree.articles();
        summary.dropped_records = finalized - articles.len();
        summary.elapsed = clock.elapsed();

        tracing::info!(
            "Walk of '{}' finished in {:?}: {} articles, {} failed branches, {} empty expansions{}",
            mode.name(),
            summary.elapsed,
            articles.len(),
            summary.failed.len(),
            summary.empty_expansions.len(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );

        WalkReport {
            articles,
            summary,
            tree,
        }
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<TaskResult>,
        in_flight: &mut HashMap<tokio::task::Id, Branch>,
        mode: &Arc<Mode>,
        permits: &Arc<Semaphore>,
        cancel: &CancelToken,
        branch: Branch,
    ) {
        let mut header = branch.clone();
        header.preloaded = None;

        let handle = tasks.spawn(run_branch(
            branch,
            mode.clone(),
            self.fetcher.clone(),
            permits.clone(),
            cancel.clone(),
            self.options.fetch_timeout,
        ));
        in_flight.insert(handle.id(), header);
    }
}

/// Process one branch: fetch its page under a worker permit, then resolve it
async fn run_branch(
    mut branch: Branch,
    mode: Arc<Mode>,
    fetcher: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
    cancel: CancelToken,
    timeout: Duration,
) -> TaskResult {
    let body = match branch.preloaded.take() {
        Some(body) => {
            if cancel.is_cancelled() {
                return TaskResult {
                    branch,
                    outcome: TaskOutcome::Skipped,
                };
            }
            body
        }
        None => {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return TaskResult {
                        branch,
                        outcome: TaskOutcome::Failed(WalkError::TaskAborted {
                            reason: e.to_string(),
                        }),
                    }
                }
            };
            if cancel.is_cancelled() {
                return TaskResult {
                    branch,
                    outcome: TaskOutcome::Skipped,
                };
            }

            tracing::debug!("Fetching {} (step {})", branch.link, branch.step_index);
            let fetched = fetcher.fetch(&branch.link, timeout).await;
            match fetched {
                Ok(body) => body,
                Err(source) => {
                    let link = branch.link.clone();
                    return TaskResult {
                        branch,
                        outcome: TaskOutcome::Failed(WalkError::FetchFailed { link, source }),
                    };
                }
            }
        }
    };

    if cancel.is_cancelled() {
        return TaskResult {
            branch,
            outcome: TaskOutcome::Discarded,
        };
    }

    let outcome = match process_page(&mode, &branch, &body) {
        Ok(page) => TaskOutcome::Page(page),
        Err(e) => TaskOutcome::Failed(e),
    };
    TaskResult { branch, outcome }
}

/// Record a finished branch and return the children to spawn
fn record_result(
    tree: &mut BranchTree,
    summary: &mut RunSummary,
    cancel: &CancelToken,
    result: TaskResult,
) -> Vec<Branch> {
    let TaskResult { branch, outcome } = result;
    let Branch {
        path,
        step_index,
        link,
        record,
        ..
    } = branch;

    let mut node = BranchNode {
        path,
        step_index,
        link,
        state: BranchState::Pending,
        record,
        article: None,
    };
    let mut children = Vec::new();

    match outcome {
        TaskOutcome::Skipped => {
            summary.skipped += 1;
            node.state = BranchState::Cancelled;
        }
        TaskOutcome::Discarded => {
            summary.discarded += 1;
            node.state = BranchState::Cancelled;
        }
        TaskOutcome::Failed(error) => {
            tracing::warn!("Branch {} failed: {}", node.link, error);
            summary.failed.push(BranchIssue {
                path: node.path.clone(),
                step_index: node.step_index,
                link: node.link.clone(),
                error: error.clone(),
            });
            node.state = BranchState::Failed(error);
        }
        TaskOutcome::Page(_) if cancel.is_cancelled() => {
            summary.discarded += 1;
            node.state = BranchState::Cancelled;
        }
        TaskOutcome::Page(PageOutcome::Expanded {
            record,
            children: found,
        }) => {
            if found.is_empty() {
                let error = WalkError::EmptyExpansion {
                    link: node.link.clone(),
                    step_index: node.step_index,
                };
                tracing::debug!("{}", error);
                summary.empty_expansions.push(BranchIssue {
                    path: node.path.clone(),
                    step_index: node.step_index,
                    link: node.link.clone(),
                    error,
                });
            } else {
                tracing::debug!(
                    "{} expanded into {} branches at step {}",
                    node.link,
                    found.len(),
                    node.step_index + 1
                );
            }
            node.state = BranchState::Expanded {
                children: found.len(),
            };
            node.record = record;
            children = found;
        }
        TaskOutcome::Page(PageOutcome::Finalized { record, article }) => {
            tracing::debug!("Finalized {}", node.link);
            node.state = BranchState::Finalized;
            node.record = record;
            node.article = Some(article);
        }
    }

    tree.insert(node);
    children
}
