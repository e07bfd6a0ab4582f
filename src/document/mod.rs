//! Parsed page trees.
//!
//! HTML pages are parsed with `scraper`; XML pages with `quick-xml` into a
//! small owned element tree. Both are navigated through [`ElementNode`],
//! which is all the resolver needs.

mod xml;

pub use xml::{XmlNode, XmlTree};

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::mode::{ConfigError, Tag};
use crate::utils::normalize_whitespace;

/// Which parser a step's pages go through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    #[default]
    Html,
    Xml,
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserKind::Html => f.write_str("html"),
            ParserKind::Xml => f.write_str("xml"),
        }
    }
}

impl FromStr for ParserKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "html" => Ok(ParserKind::Html),
            "xml" => Ok(ParserKind::Xml),
            other => Err(ConfigError::UnknownParser(other.to_string())),
        }
    }
}

/// Errors that can occur while parsing a page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Document is empty")]
    Empty,
}

/// A parsed page
#[derive(Debug)]
pub enum Document {
    Html(Html),
    Xml(XmlTree),
}

impl Document {
    pub fn kind(&self) -> ParserKind {
        match self {
            Document::Html(_) => ParserKind::Html,
            Document::Xml(_) => ParserKind::Xml,
        }
    }
}

/// Parse raw page bytes with the given parser
///
/// Invalid UTF-8 is replaced rather than rejected. HTML parsing is lenient
/// and only fails on an empty body.
pub fn parse(raw: &[u8], kind: ParserKind) -> Result<Document, ParseError> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match kind {
        ParserKind::Html => Ok(Document::Html(Html::parse_document(&text))),
        ParserKind::Xml => XmlTree::parse(&text).map(Document::Xml),
    }
}

/// Read-only view of one element, as used by the resolver
pub trait ElementNode: Copy {
    /// Identity of the element within its document
    type Id: Eq + Hash;

    fn node_id(&self) -> Self::Id;

    /// Whether this element satisfies a tag's name, class and id filters
    fn matches(&self, tag: &Tag) -> bool;

    /// Every element below this one, in document order
    fn descendants(&self) -> Vec<Self>;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Whitespace-normalized text content
    fn text(&self) -> String;
}

impl ElementNode for ElementRef<'_> {
    type Id = NodeId;

    fn node_id(&self) -> NodeId {
        (**self).id()
    }

    fn matches(&self, tag: &Tag) -> bool {
        let element = self.value();
        tag.matches(
            |name| element.name().eq_ignore_ascii_case(name),
            element.classes(),
            element.id(),
        )
    }

    fn descendants(&self) -> Vec<Self> {
        // ego_tree's traversal yields the node itself first
        (**self)
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value()
            .attr(&name.to_ascii_lowercase())
            .map(|v| v.trim().to_string())
    }

    fn text(&self) -> String {
        normalize_whitespace(&self.text().collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_kind_from_str() {
        assert_eq!("HTML".parse::<ParserKind>(), Ok(ParserKind::Html));
        assert_eq!("xml".parse::<ParserKind>(), Ok(ParserKind::Xml));
        assert_eq!("".parse::<ParserKind>(), Ok(ParserKind::Html));
        assert!("json".parse::<ParserKind>().is_err());
    }

    #[test]
    fn test_parse_html_and_xml() {
        let html = parse(b"<html><body><h1>Hi</h1></body></html>", ParserKind::Html).unwrap();
        assert_eq!(html.kind(), ParserKind::Html);

        let xml = parse(b"<issue><article/></issue>", ParserKind::Xml).unwrap();
        assert_eq!(xml.kind(), ParserKind::Xml);
    }

    #[test]
    fn test_parse_empty_body() {
        assert_eq!(parse(b"  \n", ParserKind::Html).unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_html_element_node() {
        let html = Html::parse_document(
            r#"<div id="toc" class="listing main"><a HREF=" /x ">  Issue
               one </a></div>"#,
        );
        let root = html.root_element();
        let div = root
            .descendants()
            .into_iter()
            .find(|e| e.value().name() == "div")
            .unwrap();

        assert!(div.matches(&"DIV.main#toc".parse().unwrap()));
        assert!(!div.matches(&"div.other".parse().unwrap()));

        let anchor = div.descendants()[0];
        assert_eq!(anchor.attribute("href").as_deref(), Some("/x"));
        assert_eq!(ElementNode::text(&anchor), "Issue one");
    }
}
