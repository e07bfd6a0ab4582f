//! Enumerated bibliographic fields and a fixed-size map keyed by them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A semantic field that a Mode can locate on some step's page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Authors,
    /// The article's own PDF link
    Pdf,
    Journal,
    Volume,
    Issue,
    Pages,
    Doi,
    Year,
    SuppTitle,
    SuppPdf,
    SuppDesc,
}

impl Field {
    /// Number of distinct fields
    pub const COUNT: usize = 12;

    /// Every field, in declaration order
    pub const ALL: [Field; Field::COUNT] = [
        Field::Title,
        Field::Authors,
        Field::Pdf,
        Field::Journal,
        Field::Volume,
        Field::Issue,
        Field::Pages,
        Field::Doi,
        Field::Year,
        Field::SuppTitle,
        Field::SuppPdf,
        Field::SuppDesc,
    ];

    /// Name used in settings files
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Authors => "authors",
            Field::Pdf => "pdf",
            Field::Journal => "journal",
            Field::Volume => "volume",
            Field::Issue => "issue",
            Field::Pages => "pages",
            Field::Doi => "doi",
            Field::Year => "year",
            Field::SuppTitle => "supp_title",
            Field::SuppPdf => "supp_pdf",
            Field::SuppDesc => "supp_desc",
        }
    }

    /// Whether resolved values for this field are links
    pub fn is_link(&self) -> bool {
        matches!(self, Field::Pdf | Field::SuppPdf)
    }

    /// Whether every resolved value is kept rather than only the first
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Field::Authors)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

/// Fixed-size mapping from [`Field`] to an optional value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMap<T> {
    slots: [Option<T>; Field::COUNT],
}

impl<T> FieldMap<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn get(&self, field: Field) -> Option<&T> {
        self.slots[field.index()].as_ref()
    }

    pub fn get_mut(&mut self, field: Field) -> Option<&mut T> {
        self.slots[field.index()].as_mut()
    }

    /// Store a value, returning the previous one
    pub fn insert(&mut self, field: Field, value: T) -> Option<T> {
        self.slots[field.index()].replace(value)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.slots[field.index()].is_some()
    }

    /// Iterate over populated entries in field order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &T)> {
        Field::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(field, slot)| slot.as_ref().map(|v| (*field, v)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
