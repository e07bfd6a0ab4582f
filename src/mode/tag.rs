//! Element-matching tags and the locations built from them.

use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// One element-matching unit of a [`Location`]
///
/// The compact textual form is `name(.class)?(#id)?(@attribute)?`, for
/// example `a.pdf@href` or `div#toc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    name: String,
    class_filter: Option<String>,
    id_filter: Option<String>,
    attribute_to_extract: Option<String>,
}

impl Tag {
    /// Create a tag matching elements by name
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::MissingTagName);
        }

        Ok(Self {
            name,
            class_filter: None,
            id_filter: None,
            attribute_to_extract: None,
        })
    }

    /// Only match elements whose class list contains `class`
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class_filter = non_blank(class.into());
        self
    }

    /// Only match the element with this id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_filter = non_blank(id.into());
        self
    }

    /// Resolve to the value of `attribute` instead of the text content
    pub fn extracting(mut self, attribute: impl Into<String>) -> Self {
        self.attribute_to_extract = non_blank(attribute.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_filter(&self) -> Option<&str> {
        self.class_filter.as_deref()
    }

    pub fn id_filter(&self) -> Option<&str> {
        self.id_filter.as_deref()
    }

    pub fn attribute_to_extract(&self) -> Option<&str> {
        self.attribute_to_extract.as_deref()
    }

    /// Whether an element with the given properties matches this tag
    ///
    /// `name_matches` decides name equality, which differs between HTML
    /// (case-insensitive) and XML (exact or local name).
    pub(crate) fn matches<'a>(
        &self,
        name_matches: impl FnOnce(&str) -> bool,
        mut classes: impl Iterator<Item = &'a str>,
        id: Option<&str>,
    ) -> bool {
        if !name_matches(self.name.as_str()) {
            return false;
        }
        if let Some(wanted) = &self.id_filter {
            if id != Some(wanted.as_str()) {
                return false;
            }
        }
        match &self.class_filter {
            Some(wanted) => classes.any(|c| c == wanted),
            None => true,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl FromStr for Tag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidTagSyntax(s.to_string()));
        }

        let (selector, attribute) = match s.split_once('@') {
            Some((selector, attribute)) => (selector, Some(attribute)),
            None => (s, None),
        };

        let name_end = selector.find(['.', '#']).unwrap_or(selector.len());
        let mut tag = Tag::new(&selector[..name_end])?;

        let mut rest = &selector[name_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let value = &body[..end];
            let slot = match marker {
                '.' => &mut tag.class_filter,
                _ => &mut tag.id_filter,
            };
            if value.is_empty() || slot.is_some() {
                return Err(ConfigError::InvalidTagSyntax(s.to_string()));
            }
            *slot = Some(value.to_string());
            rest = &body[end..];
        }

        if let Some(attribute) = attribute {
            if attribute.is_empty() || attribute.contains(['.', '#', '@']) {
                return Err(ConfigError::InvalidTagSyntax(s.to_string()));
            }
            tag.attribute_to_extract = Some(attribute.to_string());
        }

        Ok(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(class) = &self.class_filter {
            write!(f, ".{}", class)?;
        }
        if let Some(id) = &self.id_filter {
            write!(f, "#{}", id)?;
        }
        if let Some(attribute) = &self.attribute_to_extract {
            write!(f, "@{}", attribute)?;
        }
        Ok(())
    }
}

/// A rooted path of tags locating a field or link within a page
///
/// Each tag is searched for at any depth below the matches of the previous
/// one. The textual form separates tags with whitespace:
/// `div.toc a.issue-link@href`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    path: Vec<Tag>,
    step_index: usize,
}

impl Location {
    pub fn new(path: Vec<Tag>, step_index: usize) -> Result<Self, ConfigError> {
        let Some((_, parents)) = path.split_last() else {
            return Err(ConfigError::EmptyLocation);
        };

        if let Some(tag) = parents.iter().find(|t| t.attribute_to_extract.is_some()) {
            return Err(ConfigError::InvalidAttributeTarget {
                tag: tag.name.clone(),
                attribute: tag.attribute_to_extract.clone().unwrap_or_default(),
            });
        }

        Ok(Self { path, step_index })
    }

    /// Parse the textual form and bind it to a step
    pub fn parse(text: &str, step_index: usize) -> Result<Self, ConfigError> {
        let path = text
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<Tag>, _>>()?;
        Self::new(path, step_index)
    }

    pub fn path(&self) -> &[Tag] {
        &self.path
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// The tag whose matches produce the resolved values
    pub fn leaf(&self) -> &Tag {
        // `new` rejects empty paths
        &self.path[self.path.len() - 1]
    }

    pub(crate) fn rebind(mut self, step_index: usize) -> Self {
        self.step_index = step_index;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(Tag::new(""), Err(ConfigError::MissingTagName));
        assert_eq!(Tag::new("   "), Err(ConfigError::MissingTagName));
        assert_eq!(".pdf".parse::<Tag>(), Err(ConfigError::MissingTagName));
    }

    #[test]
    fn test_parse_compact_form() {
        let tag: Tag = "a.pdf#main@href".parse().unwrap();
        assert_eq!(tag.name(), "a");
        assert_eq!(tag.class_filter(), Some("pdf"));
        assert_eq!(tag.id_filter(), Some("main"));
        assert_eq!(tag.attribute_to_extract(), Some("href"));
        assert_eq!(tag.to_string(), "a.pdf#main@href");

        let tag: Tag = "div#toc.listing".parse().unwrap();
        assert_eq!(tag.class_filter(), Some("listing"));
        assert_eq!(tag.id_filter(), Some("toc"));

        assert!("a..pdf".parse::<Tag>().is_err());
        assert!("a.one.two".parse::<Tag>().is_err());
        assert!("a@".parse::<Tag>().is_err());
    }

    #[test]
    fn test_attribute_only_on_leaf() {
        let err = Location::parse("div@data-x a", 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidAttributeTarget {
                tag: "div".to_string(),
                attribute: "data-x".to_string()
            }
        );

        let location = Location::parse("div.toc a@href", 2).unwrap();
        assert_eq!(location.path().len(), 2);
        assert_eq!(location.step_index(), 2);
        assert_eq!(location.leaf().attribute_to_extract(), Some("href"));
        assert_eq!(location.to_string(), "div.toc a@href");
    }

    #[test]
    fn test_empty_location_rejected() {
        assert_eq!(Location::new(Vec::new(), 0), Err(ConfigError::EmptyLocation));
        assert_eq!(Location::parse("  ", 0), Err(ConfigError::EmptyLocation));
    }

    #[test]
    fn test_structural_equality() {
        use std::collections::HashSet;

        let a = Location::parse("h1.title", 1).unwrap();
        let b = Location::new(vec![Tag::new("h1").unwrap().with_class("title")], 1).unwrap();
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_matches_filters() {
        let tag: Tag = "a.pdf".parse().unwrap();
        let eq = |n: &str| n == "a";
        assert!(tag.matches(eq, ["x", "pdf"].into_iter(), None));
        assert!(!tag.matches(eq, ["x"].into_iter(), None));

        let tag: Tag = "a#one".parse().unwrap();
        assert!(tag.matches(eq, std::iter::empty(), Some("one")));
        assert!(!tag.matches(eq, std::iter::empty(), Some("two")));
    }
}
