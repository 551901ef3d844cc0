//! Funnelview - search funnel widget for the terminal
//!
//! Fetches the Search Console and Analytics reports behind the search
//! funnel, folds their states into one view and prints it as text or JSON.
//!
//! Exit codes:
//!   0 - Widget rendered (ready, empty or still loading)
//!   1 - Runtime error (invalid arguments, config, unreadable fixtures, etc.)
//!   2 - Widget rendered its error panel

mod analysis;
mod cli;
mod config;
mod datastore;
mod models;
mod query;
mod report;
mod widget;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, SourceKind};
use datastore::{FixtureSource, HttpSource, ReportSource, ReportStore, StaticRegistry};
use indicatif::{ProgressBar, ProgressStyle};
use query::{build_queries, DateOffsets, Selection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use widget::{Panel, WidgetSession};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can enable verbose output
    let (mut config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Funnelview v{}", env!("CARGO_PKG_VERSION"));
    match config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Widget failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .funnelview.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize date offsets, the report source, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Render the widget once it settles. Returns the exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_name(&config.general.format));

    let mut selection = Selection::new(
        args.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
        config.dates.default_range_days,
    );
    selection.compare_mode = config.widget.compare;
    selection.entity_url = args.url.clone();
    selection.selected_tab = args.tab;
    selection.validate()?;

    let offsets = DateOffsets::from(&config.dates);
    let registry = Arc::new(StaticRegistry::from_config(&config.widget));

    // Handle --print-queries: show descriptors and exit without fetching
    if args.print_queries {
        let queries = build_queries(&selection, offsets, registry.as_ref())?;
        info!("{} report descriptors for tab {}", queries.len(), selection.selected_tab);
        let json = report::generate_queries_json(&queries)?;
        report::write_output(&format!("{}\n", json), args.output.as_deref())?;
        return Ok(0);
    }

    let source = create_source(&config)?;
    let store = Arc::new(
        ReportStore::new(source, Handle::current())
            .with_timeout(Duration::from_secs(config.data.timeout_seconds)),
    );

    let mut session = WidgetSession::new(Arc::clone(&store), registry, offsets, selection);
    debug!(
        "Rendering {} days ending {} (compare: {})",
        session.selection().date_range_days,
        session.selection().reference_date,
        session.selection().compare_mode
    );

    let spinner = if args.quiet { None } else { Some(create_spinner()) };

    let settle_timeout = Duration::from_secs(config.data.settle_timeout_seconds);
    let widget = session.settle(settle_timeout).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let widget = widget?;

    info!(
        "Rendered {} passes, {} report fetches, {} stale resolutions dropped in {:.1}s",
        session.renders(),
        store.fetch_count(),
        session.stale_dropped(),
        start_time.elapsed().as_secs_f64()
    );

    let output = match format {
        OutputFormat::Json => format!("{}\n", report::generate_json_report(&widget)?),
        OutputFormat::Text => report::generate_text_report(&widget),
    };
    report::write_output(&output, args.output.as_deref())?;

    if let Some(ref path) = args.output {
        if !args.quiet {
            eprintln!("✅ Widget saved to: {}", path.display());
        }
    }

    if widget.is_error() {
        warn!("A report failed; rendered the error panel");
        return Ok(2);
    }
    if matches!(widget.panel, Panel::Loading { .. }) {
        warn!("Reports were still loading after {}s", config.data.settle_timeout_seconds);
    }
    Ok(0)
}

/// Build the configured report source.
fn create_source(config: &Config) -> Result<Arc<dyn ReportSource>> {
    match config.data.source {
        SourceKind::Fixtures => {
            let path = Path::new(&config.data.fixtures_path);
            info!("Serving reports from fixtures: {}", path.display());
            let source = FixtureSource::load(path)?;
            debug!("Loaded {} fixtures", source.len());
            Ok(Arc::new(source))
        }
        SourceKind::Http => {
            info!("Fetching reports from: {}", config.data.base_url);
            let source = HttpSource::new(&config.data.base_url, config.data.timeout_seconds)
                .context("Failed to create HTTP report source")?;
            Ok(Arc::new(source))
        }
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Loading reports...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up; returns the path that was loaded, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(config::CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), None))
        }
    }
}
