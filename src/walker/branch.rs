//! Branches of the navigation tree and the per-page work done on them.

use std::collections::BTreeMap;
use url::Url;

use super::WalkError;
use crate::document::{self, Document};
use crate::mode::{Mode, Step};
use crate::models::{Article, PartialRecord};
use crate::resolver::resolve;

/// Child positions from the root down to a branch
///
/// The root is the empty path, so the length of a path is the step index of
/// its branch. Lexicographic order over paths is depth-first, left-to-right
/// order over the tree.
pub type BranchPath = Vec<usize>;

/// Where a branch got to
///
/// A branch moves `Pending -> Fetched -> FieldsResolved` and then to
/// `Expanded` or `Finalized`. The middle states only exist while its task is
/// running (they show up in debug logs); nodes recorded in a [`BranchTree`]
/// are always in `Expanded`, `Finalized`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchState {
    Pending,
    Fetched,
    FieldsResolved,
    /// Non-terminal page expanded into this many children
    Expanded { children: usize },
    /// Terminal page frozen into an article
    Finalized,
    Failed(WalkError),
    Cancelled,
}

/// A unit of work: one page to fetch and resolve
#[derive(Debug, Clone)]
pub struct Branch {
    pub path: BranchPath,
    pub step_index: usize,
    pub link: String,
    pub record: PartialRecord,
    /// Body supplied by the caller instead of being fetched
    pub preloaded: Option<Vec<u8>>,
}

impl Branch {
    pub fn root(link: impl Into<String>, preloaded: Option<Vec<u8>>) -> Self {
        Self {
            path: Vec::new(),
            step_index: 0,
            link: link.into(),
            record: PartialRecord::new(),
            preloaded,
        }
    }

    fn child(&self, position: usize, link: String, record: PartialRecord) -> Self {
        let mut path = self.path.clone();
        path.push(position);
        Self {
            path,
            step_index: self.step_index + 1,
            link,
            record,
            preloaded: None,
        }
    }
}

/// Result of resolving one fetched page
#[derive(Debug)]
pub enum PageOutcome {
    Expanded {
        record: PartialRecord,
        children: Vec<Branch>,
    },
    Finalized {
        record: PartialRecord,
        article: Article,
    },
}

/// Parse a fetched page and run the branch's step against it.
///
/// The parsed document is not `Send` and must stay inside this call.
pub fn process_page(mode: &Mode, branch: &Branch, body: &[u8]) -> Result<PageOutcome, WalkError> {
    let step = mode
        .step(branch.step_index)
        .ok_or_else(|| WalkError::TaskAborted {
            reason: format!(
                "step {} out of range for mode '{}'",
                branch.step_index,
                mode.name()
            ),
        })?;

    let document =
        document::parse(body, step.parser_kind()).map_err(|source| WalkError::ParseFailed {
            link: branch.link.clone(),
            source,
        })?;
    tracing::debug!("{} -> {:?}", branch.link, BranchState::Fetched);

    let base = Url::parse(&branch.link).ok();
    let mut record = branch.record.clone();
    resolve_fields(step, &document, base.as_ref(), &mut record);
    tracing::debug!("{} -> {:?}", branch.link, BranchState::FieldsResolved);

    let Some(next_link) = step.next_link_location() else {
        let article = record.clone().freeze(Some(branch.link.clone()));
        return Ok(PageOutcome::Finalized { record, article });
    };

    let children = resolve(&document, next_link)
        .into_iter()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(|raw| absolutize(base.as_ref(), &raw))
        .enumerate()
        .map(|(position, link)| {
            let mut child_record = record.clone();
            if step.is_article_link_step() {
                child_record.set_article_page_link(link.clone());
            }
            branch.child(position, link, child_record)
        })
        .collect();

    Ok(PageOutcome::Expanded { record, children })
}

fn resolve_fields(step: &Step, document: &Document, base: Option<&Url>, record: &mut PartialRecord) {
    for (field, location) in step.field_locations().iter() {
        let values = resolve(document, location);
        let values: Vec<String> = if field.is_link() {
            values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| absolutize(base, v))
                .collect()
        } else {
            values
        };
        if record.merge(field, values) {
            tracing::debug!("Resolved {} at step {}", field, step.index());
        }
    }
}

/// Join a possibly relative link against the page it was found on
pub fn absolutize(base: Option<&Url>, link: &str) -> String {
    let joined = match base {
        Some(base) => base.join(link),
        None => Url::parse(link),
    };
    match joined {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!("Keeping unresolvable link '{}' as is: {}", link, e);
            link.to_string()
        }
    }
}

/// One processed branch as recorded by the walk coordinator
#[derive(Debug, Clone)]
pub struct BranchNode {
    pub path: BranchPath,
    pub step_index: usize,
    pub link: String,
    pub state: BranchState,
    pub record: PartialRecord,
    pub article: Option<Article>,
}

/// Every branch visited by a walk, keyed by path
#[derive(Debug, Clone, Default)]
pub struct BranchTree {
    nodes: BTreeMap<BranchPath, BranchNode>,
}

impl BranchTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: BranchNode) {
        self.nodes.insert(node.path.clone(), node);
    }

    pub fn get(&self, path: &[usize]) -> Option<&BranchNode> {
        self.nodes.get(path)
    }

    /// Nodes in depth-first, left-to-right order
    pub fn iter(&self) -> impl Iterator<Item = &BranchNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of steps spanned by the deepest branch (0 for an empty tree)
    pub fn depth(&self) -> usize {
        self.nodes
            .keys()
            .map(|path| path.len() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Finalized articles in tree order, including insubstantial ones
    pub fn finalized(&self) -> impl Iterator<Item = &Article> {
        self.nodes
            .values()
            .filter(|node| node.state == BranchState::Finalized)
            .filter_map(|node| node.article.as_ref())
    }

    /// Flatten the tree into its articles, dropping those with neither a
    /// title nor a PDF link.
    pub fn articles(&self) -> Vec<Article> {
        self.finalized()
            .filter(|article| article.is_substantive())
            .cloned()
            .collect()
    }
}
