//! Location resolution against parsed pages.
//!
//! Each tag of a [`Location`] is searched for at any depth below the
//! elements matched by the previous tag. Several matches at one level fan
//! out. An element reachable through more than one candidate (nested
//! matches) is reported once, in document order.

use std::collections::HashSet;

use crate::document::{Document, ElementNode};
use crate::mode::Location;

/// Resolve a location to the text or attribute values it points at.
///
/// Returns an empty vector when nothing matches. Text values are
/// whitespace-normalized and may be empty; attribute values are only
/// reported for elements that carry the attribute.
pub fn resolve(document: &Document, location: &Location) -> Vec<String> {
    match document {
        Document::Html(html) => resolve_from(vec![html.root_element()], location),
        Document::Xml(tree) => resolve_from(tree.roots(), location),
    }
}

/// Resolve a location below the given top-level elements
pub fn resolve_from<N: ElementNode>(roots: Vec<N>, location: &Location) -> Vec<String> {
    let mut path = location.path().iter();

    let Some(first) = path.next() else {
        return Vec::new();
    };

    // The first tag may match the top-level elements themselves
    let mut candidates: Vec<N> = roots
        .into_iter()
        .flat_map(|root| std::iter::once(root).chain(root.descendants()))
        .filter(|node| node.matches(first))
        .collect();
    candidates = distinct(candidates);

    for tag in path {
        if candidates.is_empty() {
            break;
        }
        candidates = distinct(
            candidates
                .iter()
                .flat_map(|node| node.descendants())
                .filter(|node| node.matches(tag))
                .collect(),
        );
    }

    match location.leaf().attribute_to_extract() {
        Some(attribute) => candidates
            .iter()
            .filter_map(|node| node.attribute(attribute))
            .collect(),
        None => candidates.iter().map(|node| node.text()).collect(),
    }
}

/// Drop repeated elements, keeping the first occurrence.
///
/// Candidates arrive in document order and a nested candidate's descendants
/// are contained in its ancestor's, so keeping first occurrences preserves
/// that order.
fn distinct<N: ElementNode>(nodes: Vec<N>) -> Vec<N> {
    let mut seen = HashSet::with_capacity(nodes.len());
    nodes
        .into_iter()
        .filter(|node| seen.insert(node.node_id()))
        .collect()
}
