//! Text and JSON output of a rendered widget.
//!
//! The text form lays the widget out top to bottom: the metric tabs, then
//! the single body panel chosen for the current state.

use crate::analysis::overview::{format_change, SeriesPoint};
use crate::query::FunnelQueries;
use crate::widget::renderer::{OverviewPanel, StatsPanel, WidgetHeader};
use crate::widget::{Panel, RenderedWidget};
use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::path::Path;

/// Widest bar drawn in the stats chart.
const BAR_WIDTH: usize = 40;

/// Generate the plain text view of a widget.
pub fn generate_text_report(widget: &RenderedWidget) -> String {
    let mut output = String::new();

    output.push_str("# Search Funnel\n\n");
    output.push_str(&generate_header_section(&widget.header));

    match &widget.panel {
        Panel::Loading { blocks } => {
            output.push_str("Loading reports...\n");
            for block in blocks {
                output.push_str(&format!("  [ preview {} x {} ]\n", block.width, block.height));
            }
        }
        Panel::ReportError { module, error } => {
            output.push_str(&format!("## Error from {}\n\n", module));
            output.push_str(&format!("- **Code:** `{}`\n", error.code));
            output.push_str(&format!("- **Message:** {}\n", error.message));
        }
        Panel::ReportZero { module } => {
            output.push_str(&format!(
                "## No data from {}\n\nNo data is available for this period yet.\n",
                module
            ));
        }
        Panel::Ready { overview, stats } => {
            output.push_str(&generate_overview_section(overview));
            output.push_str(&generate_stats_section(stats));
        }
    }

    output
}

fn generate_header_section(header: &WidgetHeader) -> String {
    let tabs: Vec<String> = header
        .metrics
        .iter()
        .enumerate()
        .map(|(i, metric)| {
            if i == header.selected_stats {
                format!("[{}]", metric.label)
            } else {
                metric.label.to_string()
            }
        })
        .collect();

    format!("{}\n\n", tabs.join(" | "))
}

fn generate_overview_section(overview: &OverviewPanel) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Overview (last {} days)\n\n", overview.date_range_length));
    for datapoint in &overview.datapoints {
        section.push_str(&format!("- **{}:** {}", datapoint.label, datapoint.formatted));
        if let Some(change) = datapoint.change {
            section.push_str(&format!(" ({})", format_change(change)));
        }
        section.push('\n');
    }
    if overview.analytics_cta {
        section.push_str("\nConnect Analytics to see visitors, goals and bounce rate.\n");
    }
    section.push('\n');

    section
}

fn generate_stats_section(stats: &StatsPanel) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", stats.label));
    if stats.series.is_empty() {
        section.push_str("No data for this metric.\n");
        return section;
    }

    for (point, bar) in stats.series.iter().zip(bars(&stats.series)) {
        section.push_str(&format!("{:>10} {:<width$} {}\n", point.date, bar, point.value, width = BAR_WIDTH));
    }

    section
}

fn bars(series: &[SeriesPoint]) -> Vec<String> {
    let max = series.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    series
        .iter()
        .map(|p| {
            let len = if max > 0.0 {
                ((p.value / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            "#".repeat(len)
        })
        .collect()
}

/// Generate a JSON view of a widget.
pub fn generate_json_report(widget: &RenderedWidget) -> Result<String> {
    serde_json::to_string_pretty(widget).map_err(Into::into)
}

/// Descriptors of a selection as JSON, keyed by slot.
pub fn generate_queries_json(queries: &FunnelQueries) -> Result<String> {
    let entries: Vec<_> = queries
        .iter()
        .map(|(slot, descriptor)| {
            json!({
                "slot": slot.as_str(),
                "module": slot.module(),
                "descriptor": descriptor,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).map_err(Into::into)
}

/// Write output to a file, or stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(content.as_bytes())?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            handle.flush()?;
        }
    }
    Ok(())
}
