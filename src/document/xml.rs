//! Owned element tree for XML pages.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{ElementNode, ParseError};
use crate::mode::Tag;
use crate::utils::normalize_whitespace;

#[derive(Debug, Clone)]
enum XmlChild {
    Element(usize),
    Text(String),
}

#[derive(Debug, Clone)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlChild>,
}

/// An XML document as an arena of elements
#[derive(Debug, Clone, Default)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
    roots: Vec<usize>,
}

impl XmlTree {
    /// Parse an XML document
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut reader = Reader::from_str(text);
        let mut tree = XmlTree::default();
        let mut open: Vec<usize> = Vec::new();

        let xml_error = |reader: &Reader<&[u8]>, message: String| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message,
        };

        loop {
            let event = reader
                .read_event()
                .map_err(|e| xml_error(&reader, e.to_string()))?;

            let is_empty = matches!(event, Event::Empty(_));
            match event {
                Event::Start(start) | Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

                    let mut attributes = Vec::new();
                    for attr in start.attributes() {
                        let attr = attr.map_err(|e| xml_error(&reader, e.to_string()))?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| xml_error(&reader, e.to_string()))?
                            .into_owned();
                        attributes.push((key, value));
                    }

                    let index = tree.push(name, attributes, open.last().copied());
                    if !is_empty {
                        open.push(index);
                    }
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| xml_error(&reader, e.to_string()))?;
                    tree.push_text(open.last().copied(), &text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    tree.push_text(open.last().copied(), &text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&unclosed) = open.last() {
            return Err(xml_error(
                &reader,
                format!("unclosed element <{}>", tree.elements[unclosed].name),
            ));
        }
        if tree.roots.is_empty() {
            return Err(ParseError::Empty);
        }

        Ok(tree)
    }

    fn push(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        parent: Option<usize>,
    ) -> usize {
        let index = self.elements.len();
        self.elements.push(XmlElement {
            name,
            attributes,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.elements[parent].children.push(XmlChild::Element(index)),
            None => self.roots.push(index),
        }
        index
    }

    fn push_text(&mut self, parent: Option<usize>, text: &str) {
        // Text outside the root element is insignificant
        if let Some(parent) = parent {
            if !text.is_empty() {
                self.elements[parent]
                    .children
                    .push(XmlChild::Text(text.to_string()));
            }
        }
    }

    /// Top-level elements of the document
    pub fn roots(&self) -> Vec<XmlNode<'_>> {
        self.roots
            .iter()
            .map(|&index| XmlNode { tree: self, index })
            .collect()
    }
}

/// Handle to one element of an [`XmlTree`]
#[derive(Debug, Clone, Copy)]
pub struct XmlNode<'a> {
    tree: &'a XmlTree,
    index: usize,
}

impl<'a> XmlNode<'a> {
    fn element(&self) -> &'a XmlElement {
        &self.tree.elements[self.index]
    }

    pub fn name(&self) -> &'a str {
        &self.element().name
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.element().children {
            match child {
                XmlChild::Text(text) => out.push_str(text),
                XmlChild::Element(index) => XmlNode {
                    tree: self.tree,
                    index: *index,
                }
                .collect_text(out),
            }
        }
    }
}

impl ElementNode for XmlNode<'_> {
    type Id = usize;

    fn node_id(&self) -> usize {
        self.index
    }

    fn matches(&self, tag: &Tag) -> bool {
        let element = self.element();
        let class = element
            .attributes
            .iter()
            .find(|(k, _)| k == "class")
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        let id = element
            .attributes
            .iter()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.as_str());

        tag.matches(
            |wanted| {
                element.name == wanted
                    || element
                        .name
                        .rsplit_once(':')
                        .is_some_and(|(_, local)| local == wanted)
            },
            class.split_whitespace(),
            id,
        )
    }

    fn descendants(&self) -> Vec<Self> {
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self
            .element()
            .children
            .iter()
            .rev()
            .filter_map(|c| match c {
                XmlChild::Element(i) => Some(*i),
                XmlChild::Text(_) => None,
            })
            .collect();

        while let Some(index) = stack.pop() {
            found.push(XmlNode {
                tree: self.tree,
                index,
            });
            stack.extend(self.tree.elements[index].children.iter().rev().filter_map(
                |c| match c {
                    XmlChild::Element(i) => Some(*i),
                    XmlChild::Text(_) => None,
                },
            ));
        }

        found
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.element()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim().to_string())
    }

    fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        normalize_whitespace(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUE: &str = r#"<?xml version="1.0"?>
<issue volume="12">
  <article id="a1" class="research open">
    <title>First &amp; foremost</title>
    <link href="/a1.pdf"/>
  </article>
  <article id="a2">
    <title><![CDATA[Second]]> part</title>
  </article>
</issue>"#;

    #[test]
    fn test_parse_structure() {
        let tree = XmlTree::parse(ISSUE).unwrap();
        let roots = tree.roots();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name(), "issue");
        assert_eq!(roots[0].attribute("volume").as_deref(), Some("12"));

        let names: Vec<_> = roots[0].descendants().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["article", "title", "link", "article", "title"]);
    }

    #[test]
    fn test_text_and_filters() {
        let tree = XmlTree::parse(ISSUE).unwrap();
        let all = tree.roots()[0].descendants();

        assert!(all[0].matches(&"article.open#a1".parse().unwrap()));
        assert!(!all[3].matches(&"article.open".parse().unwrap()));
        assert_eq!(all[1].text(), "First & foremost");
        assert_eq!(all[4].text(), "Second part");
    }

    #[test]
    fn test_inline_markup_text() {
        let tree = XmlTree::parse(
            "<article><title>H<sub>2</sub>O levels in <i>situ</i>\n  today</title></article>",
        )
        .unwrap();
        let title = tree.roots()[0].descendants()[0];
        assert_eq!(title.text(), "H2O levels in situ today");

        let html = scraper::Html::parse_document("<h1>H<sub>2</sub>O levels in <i>situ</i></h1>");
        let heading = html
            .root_element()
            .descendants()
            .into_iter()
            .find(|e| e.value().name() == "h1")
            .unwrap();
        assert_eq!(ElementNode::text(&heading), "H2O levels in situ");
    }

    #[test]
    fn test_namespaced_local_name() {
        let tree = XmlTree::parse(r#"<dc:record xmlns:dc="x"><dc:title>T</dc:title></dc:record>"#)
            .unwrap();
        let title = tree.roots()[0].descendants()[0];
        assert!(title.matches(&"title".parse().unwrap()));
        assert!(title.matches(&"dc:title".parse().unwrap()));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            XmlTree::parse("<a><b></a>"),
            Err(ParseError::Xml { .. })
        ));
        assert!(matches!(
            XmlTree::parse("<a><b>"),
            Err(ParseError::Xml { .. })
        ));
    }
}
