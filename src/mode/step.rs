//! Steps and the Mode they form.

use crate::document::ParserKind;
use crate::models::{Field, FieldMap};

use super::{ConfigError, Location, ModeError};

/// One navigation stage of a [`Mode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    index: usize,
    parser_kind: ParserKind,
    next_link_location: Option<Location>,
    is_article_link_step: bool,
    field_locations: FieldMap<Location>,
}

impl Step {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parser_kind(&self) -> ParserKind {
        self.parser_kind
    }

    /// Location of the links leading to the next step's pages
    pub fn next_link_location(&self) -> Option<&Location> {
        self.next_link_location.as_ref()
    }

    /// Whether this step's links point at the articles' own pages
    pub fn is_article_link_step(&self) -> bool {
        self.is_article_link_step
    }

    /// Fields first discovered at this step
    pub fn field_locations(&self) -> &FieldMap<Location> {
        &self.field_locations
    }
}

/// A step as declared, before Mode-wide validation
#[derive(Debug, Clone)]
pub struct StepDecl {
    pub index: usize,
    pub parser_kind: ParserKind,
    pub next_link: Option<Location>,
    pub is_article_link_step: bool,
    pub fields: Vec<(Field, Location)>,
}

impl StepDecl {
    pub fn new(index: usize, parser_kind: ParserKind) -> Self {
        Self {
            index,
            parser_kind,
            next_link: None,
            is_article_link_step: false,
            fields: Vec::new(),
        }
    }

    pub fn html(index: usize) -> Self {
        Self::new(index, ParserKind::Html)
    }

    pub fn xml(index: usize) -> Self {
        Self::new(index, ParserKind::Xml)
    }

    /// Set the next-link location from its textual form
    pub fn link(self, location: &str) -> Result<Self, ConfigError> {
        let location = Location::parse(location, self.index)?;
        Ok(self.link_location(location))
    }

    pub fn link_location(mut self, location: Location) -> Self {
        self.next_link = Some(location.rebind(self.index));
        self
    }

    /// Add a field location from its textual form
    pub fn field(self, field: Field, location: &str) -> Result<Self, ConfigError> {
        let location = Location::parse(location, self.index)?;
        Ok(self.field_location(field, location))
    }

    pub fn field_location(mut self, field: Field, location: Location) -> Self {
        self.fields.push((field, location.rebind(self.index)));
        self
    }

    pub fn article_link(mut self) -> Self {
        self.is_article_link_step = true;
        self
    }
}

/// A declarative crawl description for one publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    name: String,
    steps: Vec<Step>,
    article_link_step_index: Option<usize>,
}

/// Accumulator of the construction fold
#[derive(Default)]
struct Draft {
    steps: Vec<Step>,
    discovered: FieldMap<usize>,
    article_link_step_index: Option<usize>,
}

impl Mode {
    /// Validate declared steps and build an immutable Mode.
    ///
    /// Steps are processed in increasing index order, so a field declared on
    /// several steps keeps the location of the earliest one.
    pub fn new(
        name: impl Into<String>,
        nsteps: usize,
        mut decls: Vec<StepDecl>,
    ) -> Result<Self, ModeError> {
        let name = name.into();
        if nsteps == 0 {
            return Err(ModeError::NoSteps);
        }

        decls.sort_by_key(|d| d.index);
        for (expected, decl) in decls.iter().enumerate() {
            if decl.index != expected {
                return Err(ModeError::StepIndexGap {
                    expected,
                    found: decl.index,
                });
            }
        }
        if decls.len() != nsteps {
            return Err(ModeError::StepCountMismatch {
                declared: nsteps,
                found: decls.len(),
            });
        }

        let terminal = nsteps - 1;
        let draft = decls
            .into_iter()
            .try_fold(Draft::default(), |draft, decl| {
                fold_step(&name, terminal, draft, decl)
            })?;

        tracing::debug!(
            "Built mode '{}' with {} steps and {} located fields",
            name,
            draft.steps.len(),
            draft.discovered.len()
        );

        Ok(Self {
            name,
            steps: draft.steps,
            article_link_step_index: draft.article_link_step_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nsteps(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn terminal_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        index == self.terminal_index()
    }

    pub fn article_link_step_index(&self) -> Option<usize> {
        self.article_link_step_index
    }

    /// Where a field is located, across all steps
    pub fn field_location(&self, field: Field) -> Option<&Location> {
        self.steps
            .iter()
            .find_map(|step| step.field_locations.get(field))
    }
}

fn fold_step(
    mode_name: &str,
    terminal: usize,
    mut draft: Draft,
    decl: StepDecl,
) -> Result<Draft, ModeError> {
    let index = decl.index;

    match (&decl.next_link, index == terminal) {
        (None, false) => return Err(ModeError::MissingLink { step: index }),
        (Some(_), true) => return Err(ModeError::TerminalLink { step: index }),
        _ => {}
    }

    if decl.is_article_link_step {
        if index == terminal {
            return Err(ModeError::ArticleLinkOnTerminal { step: index });
        }
        if let Some(first) = draft.article_link_step_index {
            return Err(ModeError::DuplicateArticleLinkStep {
                first,
                second: index,
            });
        }
        draft.article_link_step_index = Some(index);
    }

    let mut field_locations = FieldMap::new();
    for (field, location) in decl.fields {
        if let Some(owner) = draft.discovered.get(field) {
            tracing::debug!(
                "Mode '{}': {} already located at step {}, ignoring step {}",
                mode_name,
                field,
                owner,
                index
            );
            continue;
        }
        draft.discovered.insert(field, index);
        field_locations.insert(field, location.rebind(index));
    }

    draft.steps.push(Step {
        index,
        parser_kind: decl.parser_kind,
        next_link_location: decl.next_link.map(|l| l.rebind(index)),
        is_article_link_step: decl.is_article_link_step,
        field_locations,
    });

    Ok(draft)
}
