//! Application configuration.
//!
//! Values come from an optional TOML file, overridden by environment
//! variables prefixed with `JOURNAL_SWIPER_` (nested keys separated by
//! `__`, e.g. `JOURNAL_SWIPER_WALK__WORKERS=4`).
//!
//! ```toml
//! [settings]
//! path = "~/.config/journal-swiper/modes.xml"
//!
//! [fetch]
//! timeout_secs = 30
//! user_agent = "journal-swiper/0.1"
//! max_retries = 2
//!
//! [walk]
//! workers = 8
//! time_budget_secs = 600
//!
//! [downloads]
//! directory = "./downloads"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::settings::SettingsConfig;
use crate::utils::{RetryConfig, DEFAULT_USER_AGENT};
use crate::walker::{WalkOptions, DEFAULT_WORKERS};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "JOURNAL_SWIPER";

/// Errors that can occur while loading the application configuration
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub walk: WalkConfig,

    #[serde(default)]
    pub downloads: DownloadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location of the modes settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSection {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("journal-swiper")
        .join("modes.xml")
}

/// Page fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retries after the first attempt on transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_retries() -> u32 {
    2
}

/// Walk scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Maximum concurrent fetches
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Overall wall-clock budget for one walk
    #[serde(default)]
    pub time_budget_secs: Option<u64>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            time_budget_secs: None,
        }
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().max_retries(self.fetch.max_retries)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            workers: self.walk.workers,
            fetch_timeout: self.fetch_timeout(),
            time_budget: self.walk.time_budget_secs.map(Duration::from_secs),
        }
    }

    pub fn settings_config(&self) -> SettingsConfig {
        SettingsConfig::new(&self.settings.path)
    }

    fn validate(&self) -> Result<(), AppConfigError> {
        if self.walk.workers == 0 {
            return Err(AppConfigError::Invalid(
                "walk.workers must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppConfigError::Invalid(
                "fetch.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, AppConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
