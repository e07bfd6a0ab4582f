//! Settings file access.
//!
//! Modes are stored in a versioned XML file:
//!
//! ```xml
//! <root Version="0.1">
//!   <Modes>
//!     <Mode name="Example" nsteps="2">
//!       <Step index="0" parser="html" article_link="yes">
//!         <Link><Tag class="issue-link" attr="href">a</Tag></Link>
//!       </Step>
//!       <Step index="1">
//!         <Field name="title"><Tag name="h1"/></Field>
//!         <Field name="pdf"><Tag name="a" class="pdf" attr="href"/></Field>
//!       </Step>
//!     </Mode>
//!   </Modes>
//! </root>
//! ```
//!
//! A tag's element name comes from its `name` attribute or, failing that,
//! from its text. The reader only checks the file version and hands out the
//! raw mode trees; turning them into a [`Mode`] is the loader's job.

use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::mode::{ConfigError, Mode, ModeError};

/// Oldest settings version this build reads
pub const FIRST_SUPPORTED_VERSION: f64 = 0.1;

/// Newest settings version this build reads
pub const MAX_SUPPORTED_VERSION: f64 = 0.1;

/// Where the settings live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

impl SettingsConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSettings {
    #[serde(rename = "@Version")]
    version: Option<String>,

    #[serde(rename = "Modes", default)]
    modes: RawModes,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawModes {
    #[serde(rename = "Mode", default)]
    modes: Vec<RawModeConfig>,
}

/// One mode as stored in the settings file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawModeConfig {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@nsteps")]
    pub nsteps: usize,

    #[serde(rename = "Step", default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawStep {
    #[serde(rename = "@index")]
    pub index: usize,

    #[serde(rename = "@parser", default)]
    pub parser: Option<String>,

    /// Boolean flag in its textual form (`yes`, `true`, `1`, ...)
    #[serde(rename = "@article_link", default)]
    pub article_link: Option<String>,

    #[serde(rename = "Link", default)]
    pub link: Option<RawLocation>,

    #[serde(rename = "Field", default)]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLocation {
    #[serde(rename = "Tag", default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawField {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "Tag", default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTag {
    #[serde(rename = "@name", default)]
    pub name: Option<String>,

    #[serde(rename = "@class", default)]
    pub class: Option<String>,

    #[serde(rename = "@id", default)]
    pub id: Option<String>,

    #[serde(rename = "@attr", default)]
    pub attr: Option<String>,

    #[serde(rename = "$text", default)]
    pub text: Option<String>,
}

/// Reads modes out of a settings file
#[derive(Debug, Clone)]
pub struct SettingsReader {
    source: String,
    version: f64,
    modes: Vec<RawModeConfig>,
}

impl SettingsReader {
    /// Open the settings file named by `config`
    pub fn open(config: &SettingsConfig) -> Result<Self, ConfigError> {
        Self::load(&config.path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let mut reader = Self::parse(&text)?;
        reader.source = path.display().to_string();
        tracing::debug!(
            "Loaded {} modes from {} (version {})",
            reader.modes.len(),
            reader.source,
            reader.version
        );
        Ok(reader)
    }

    /// Read settings from an XML string
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let version = check_version(raw.version.as_deref())?;

        Ok(Self {
            source: "<memory>".to_string(),
            version,
            modes: raw.modes.modes,
        })
    }

    pub fn version(&self) -> f64 {
        self.version
    }

    /// Names of the stored modes, in file order
    pub fn mode_names(&self) -> Vec<&str> {
        self.modes.iter().map(|m| m.name.as_str()).collect()
    }

    /// Raw configuration of the named mode
    pub fn load_mode(&self, identifier: &str) -> Result<RawModeConfig, ConfigError> {
        self.modes
            .iter()
            .find(|m| m.name == identifier)
            .cloned()
            .ok_or_else(|| ConfigError::ModeNotFound(identifier.to_string()))
    }

    /// Load and validate the named mode
    pub fn mode(&self, identifier: &str) -> Result<Mode, ModeError> {
        let raw = self.load_mode(identifier)?;
        Mode::try_from(&raw)
    }
}

fn check_version(version: Option<&str>) -> Result<f64, ConfigError> {
    let text = version.ok_or(ConfigError::MissingVersion)?;
    let found: f64 = text
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVersion(text.to_string()))?;

    if !(FIRST_SUPPORTED_VERSION..=MAX_SUPPORTED_VERSION).contains(&found) {
        return Err(ConfigError::UnsupportedVersion {
            found,
            min: FIRST_SUPPORTED_VERSION,
            max: MAX_SUPPORTED_VERSION,
        });
    }
    Ok(found)
}
