//! Building a [`Mode`] from its stored form.

use std::str::FromStr;

use super::{ConfigError, Location, Mode, ModeError, StepDecl, Tag};
use crate::document::ParserKind;
use crate::models::Field;
use crate::settings::{RawLocation, RawModeConfig, RawStep, RawTag};
use crate::utils::bool_string;

impl TryFrom<&RawModeConfig> for Mode {
    type Error = ModeError;

    fn try_from(raw: &RawModeConfig) -> Result<Self, Self::Error> {
        let decls = raw
            .steps
            .iter()
            .map(step_decl)
            .collect::<Result<Vec<_>, _>>()?;
        Mode::new(raw.name.clone(), raw.nsteps, decls)
    }
}

fn step_decl(raw: &RawStep) -> Result<StepDecl, ModeError> {
    let parser_kind = ParserKind::from_str(raw.parser.as_deref().unwrap_or_default())?;
    let mut decl = StepDecl::new(raw.index, parser_kind);

    if raw.article_link.as_deref().is_some_and(bool_string) {
        decl = decl.article_link();
    }

    if let Some(link) = &raw.link {
        decl = decl.link_location(location(link, raw.index, "link")?);
    }

    for field in &raw.fields {
        let name = Field::from_str(&field.name).map_err(ConfigError::UnknownField)?;
        let location = location(
            &RawLocation {
                tags: field.tags.clone(),
            },
            raw.index,
            &format!("field '{}'", field.name),
        )?;
        decl = decl.field_location(name, location);
    }

    Ok(decl)
}

fn location(raw: &RawLocation, step: usize, context: &str) -> Result<Location, ModeError> {
    let path = raw
        .tags
        .iter()
        .map(|t| tag(t, step, context))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Location::new(path, step)?)
}

fn tag(raw: &RawTag, step: usize, context: &str) -> Result<Tag, ModeError> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let name = non_empty(&raw.name)
        .or_else(|| non_empty(&raw.text))
        .ok_or_else(|| ModeError::MissingTagIdentity {
            step,
            context: context.to_string(),
        })?;

    let mut tag = Tag::new(name)?;
    if let Some(class) = non_empty(&raw.class) {
        tag = tag.with_class(class);
    }
    if let Some(id) = non_empty(&raw.id) {
        tag = tag.with_id(id);
    }
    if let Some(attr) = non_empty(&raw.attr) {
        tag = tag.extracting(attr);
    }
    Ok(tag)
}
