//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.funnelview.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".funnelview.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Date range settings.
    #[serde(default)]
    pub dates: DatesConfig,

    /// Report source settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Widget settings.
    #[serde(default)]
    pub widget: WidgetConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format ("text" or "json").
    #[serde(default = "default_format")]
    pub format: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

fn default_format() -> String {
    "text".to_string()
}

/// Date range settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatesConfig {
    /// Days in the current period when `--days` is not given.
    #[serde(default = "default_range_days")]
    pub default_range_days: u32,

    /// Days between today and the last Search Console day.
    #[serde(default = "default_offset")]
    pub search_console_offset_days: u32,

    /// Days between today and the last Analytics day.
    #[serde(default = "default_offset")]
    pub analytics_offset_days: u32,
}

impl Default for DatesConfig {
    fn default() -> Self {
        Self {
            default_range_days: default_range_days(),
            search_console_offset_days: default_offset(),
            analytics_offset_days: default_offset(),
        }
    }
}

fn default_range_days() -> u32 {
    28
}

fn default_offset() -> u32 {
    1
}

/// Where reports come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON fixture file
    #[default]
    Fixtures,
    /// Report service over HTTP
    Http,
}

/// Report source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub source: SourceKind,

    /// Fixture file for the `fixtures` source.
    #[serde(default = "default_fixtures_path")]
    pub fixtures_path: String,

    /// Report service base URL for the `http` source.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single report fetch, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// How long to wait for all reports before giving up, in seconds.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_seconds: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            fixtures_path: default_fixtures_path(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            settle_timeout_seconds: default_settle_timeout(),
        }
    }
}

fn default_fixtures_path() -> String {
    "fixtures/search_funnel.json".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080/wp-json/google-site-kit/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_settle_timeout() -> u64 {
    60
}

/// Widget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Whether the Analytics module is active and connected.
    #[serde(default = "default_true")]
    pub analytics_connected: bool,

    /// Request the compare period alongside the current one.
    #[serde(default = "default_true")]
    pub compare: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            analytics_connected: true,
            compare: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.general.format = format.as_str().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(days) = args.days {
            self.dates.default_range_days = days;
        }

        if let Some(ref path) = args.fixtures {
            self.data.source = SourceKind::Fixtures;
            self.data.fixtures_path = path.display().to_string();
        }
        if let Some(ref base_url) = args.base_url {
            self.data.source = SourceKind::Http;
            self.data.base_url = base_url.clone();
        }
        if let Some(source) = args.source {
            self.data.source = source;
        }
        if let Some(timeout) = args.timeout {
            self.data.timeout_seconds = timeout;
        }

        if args.no_analytics {
            self.widget.analytics_connected = false;
        }
        if args.no_compare {
            self.widget.compare = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
