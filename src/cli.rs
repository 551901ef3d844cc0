//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::SourceKind;
use crate::query::builder::DateRange;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Funnelview - search funnel widget for the terminal
///
/// Fetches the Search Console and Analytics reports behind the search
/// funnel, folds them into one view and prints it.
///
/// Examples:
///   funnelview --fixtures fixtures/search_funnel.json
///   funnelview --fixtures fixtures/search_funnel.json --tab 4 --days 7
///   funnelview --base-url https://example.com/wp-json/google-site-kit/v1 --url https://example.com/post/
///   funnelview --print-queries --url https://example.com/post/
///   funnelview --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Fixture file to serve reports from
    #[arg(long, value_name = "FILE", env = "FUNNELVIEW_FIXTURES")]
    pub fixtures: Option<PathBuf>,

    /// Report service base URL
    #[arg(long, value_name = "URL", env = "FUNNELVIEW_BASE_URL")]
    pub base_url: Option<String>,

    /// Report source (fixtures, http)
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<SourceKind>,

    /// Number of days in the current period
    #[arg(short, long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Do not request the compare period
    #[arg(long)]
    pub no_compare: bool,

    /// Entity URL to filter every report by
    ///
    /// Values that are not absolute URLs are ignored.
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,

    /// Selected funnel metric: 0 impressions, 1 clicks, 2 users, 3 goals, 4 bounce rate
    #[arg(short, long, default_value = "0", value_name = "INDEX")]
    pub tab: usize,

    /// Reference date (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Treat the Analytics module as not connected
    #[arg(long)]
    pub no_analytics: bool,

    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the rendered widget to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Timeout for a single report fetch, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .funnelview.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the report descriptors for the selection and exit (no fetch)
    #[arg(long)]
    pub print_queries: bool,

    /// Generate a default .funnelview.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the rendered widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }

    /// Parse a configured format name, falling back to text.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.tab > crate::query::builder::MAX_TAB_INDEX {
            return Err(format!(
                "Tab must be between 0 and {}",
                crate::query::builder::MAX_TAB_INDEX
            ));
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if let Some(days) = self.days {
            let reference = self.date.unwrap_or_else(|| chrono::Local::now().date_naive());
            if let Err(e) = DateRange::ending_before(reference, days, 0) {
                return Err(format!("Invalid --days: {}", e));
            }
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.fixtures.is_some() && self.base_url.is_some() {
            return Err("Cannot use both --fixtures and --base-url".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref path) = self.fixtures {
            if !path.is_file() {
                return Err(format!("Fixture file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet`
    /// overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
