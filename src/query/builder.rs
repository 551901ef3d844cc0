//! Query descriptor construction.
//!
//! Builds the five report descriptors of the search funnel from an explicit
//! [`Selection`]. Nothing here reads ambient state: the reference date, the
//! date range and the entity URL are all passed in.

use crate::datastore::ModuleRegistry;
use crate::models::{MetricSpec, ModuleSlug, QueryDescriptor, SourceSlot};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Highest selectable tab index.
pub const MAX_TAB_INDEX: usize = 4;

/// Selection state the widget is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Number of days in the current period.
    pub date_range_days: u32,
    /// Whether reports also cover the preceding period of equal length.
    pub compare_mode: bool,
    /// URL of the entity being viewed, if any.
    pub entity_url: Option<String>,
    /// Selected funnel metric tab, 0 to 4.
    pub selected_tab: usize,
    /// Date the ranges are computed from (usually today).
    pub reference_date: NaiveDate,
}

/// Invalid selection state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("date range must cover at least one day")]
    EmptyDateRange,

    #[error("tab index {0} is out of range (expected 0-{max})", max = MAX_TAB_INDEX)]
    TabOutOfRange(usize),

    #[error("a {days} day range ending {offset_days} days before {reference} is not a valid date range")]
    DateOutOfRange {
        reference: NaiveDate,
        days: u32,
        offset_days: u32,
    },
}

impl Selection {
    pub fn new(reference_date: NaiveDate, date_range_days: u32) -> Self {
        Self {
            date_range_days,
            compare_mode: true,
            entity_url: None,
            selected_tab: 0,
            reference_date,
        }
    }

    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.date_range_days == 0 {
            return Err(SelectionError::EmptyDateRange);
        }
        if self.selected_tab > MAX_TAB_INDEX {
            return Err(SelectionError::TabOutOfRange(self.selected_tab));
        }
        Ok(())
    }

    /// The entity URL when it parses as an absolute URL.
    ///
    /// Anything else counts as no URL at all.
    pub fn valid_entity_url(&self) -> Option<&str> {
        self.entity_url.as_deref().filter(|url| is_url(url))
    }
}

/// Returns true when `candidate` parses as an absolute URL.
pub fn is_url(candidate: &str) -> bool {
    reqwest::Url::parse(candidate).is_ok()
}

/// Per-module offset between the reference date and the last reported day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOffsets {
    pub search_console: u32,
    pub analytics: u32,
}

impl Default for DateOffsets {
    fn default() -> Self {
        Self {
            search_console: 1,
            analytics: 1,
        }
    }
}

impl From<&crate::config::DatesConfig> for DateOffsets {
    fn from(config: &crate::config::DatesConfig) -> Self {
        Self {
            search_console: config.search_console_offset_days,
            analytics: config.analytics_offset_days,
        }
    }
}

/// Current and compare periods for one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub compare_start: NaiveDate,
    pub compare_end: NaiveDate,
}

impl DateRange {
    /// Computes the period of `days` days ending `offset_days` before `reference`,
    /// and the equally long period immediately before it.
    ///
    /// Fails when any of the four dates falls outside the representable range.
    pub fn ending_before(reference: NaiveDate, days: u32, offset_days: u32) -> Result<Self, SelectionError> {
        let span = Days::new(u64::from(days.max(1)) - 1);
        let range = reference
            .checked_sub_days(Days::new(u64::from(offset_days)))
            .and_then(|end| {
                let start = end.checked_sub_days(span)?;
                let compare_end = start.checked_sub_days(Days::new(1))?;
                let compare_start = compare_end.checked_sub_days(span)?;
                Some(Self {
                    start,
                    end,
                    compare_start,
                    compare_end,
                })
            });

        range.ok_or(SelectionError::DateOutOfRange {
            reference,
            days,
            offset_days,
        })
    }
}

/// The descriptors requested for one render pass, in slot priority order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelQueries {
    entries: Vec<(SourceSlot, QueryDescriptor)>,
}

impl FunnelQueries {
    /// Descriptor for a slot, `None` when the slot is not requested.
    pub fn get(&self, slot: SourceSlot) -> Option<&QueryDescriptor> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SourceSlot, QueryDescriptor)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when `descriptor` is requested from `module` in this pass.
    pub fn contains(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> bool {
        self.entries
            .iter()
            .any(|(slot, d)| slot.module() == module && d == descriptor)
    }
}

/// Builds the funnel descriptors for `selection`.
///
/// Analytics slots are only requested when the registry reports the
/// analytics module as connected.
pub fn build_queries(
    selection: &Selection,
    offsets: DateOffsets,
    registry: &dyn ModuleRegistry,
) -> Result<FunnelQueries, SelectionError> {
    selection.validate()?;

    let url = selection.valid_entity_url();
    if url.is_none() && selection.entity_url.is_some() {
        debug!("Ignoring entity URL that is not a valid URL");
    }

    let days = selection.date_range_days;
    let search_console = DateRange::ending_before(
        selection.reference_date,
        days,
        offsets.search_console,
    )?;

    let primary_start = if selection.compare_mode {
        search_console.compare_start
    } else {
        search_console.start
    };
    let primary = QueryDescriptor::new(primary_start, search_console.end)
        .with_dimensions(["date"])
        .with_url_filter(url);

    let mut entries = vec![(SourceSlot::Primary, primary)];

    if registry.is_module_connected(ModuleSlug::Analytics) {
        let analytics = DateRange::ending_before(selection.reference_date, days, offsets.analytics)?;
        let base = if selection.compare_mode {
            QueryDescriptor::new(analytics.start, analytics.end)
                .with_compare_range(analytics.compare_start, analytics.compare_end)
        } else {
            QueryDescriptor::new(analytics.start, analytics.end)
        };

        let visitors_overview = base
            .clone()
            .with_metrics(vec![MetricSpec::new("ga:users").with_alias("Total Users")])
            .with_dimensions(["ga:channelGrouping"])
            .with_dimension_filter("ga:channelGrouping", "Organic Search")
            .with_url_filter(url);
        let visitors_stats = visitors_overview
            .clone()
            .with_dimensions(["ga:date", "ga:channelGrouping"]);

        let goals_overview = base
            .with_metrics(vec![
                MetricSpec::new("ga:goalCompletionsAll").with_alias("Goal Completions"),
                MetricSpec::new("ga:bounceRate"),
            ])
            .with_url_filter(url);
        let goals_stats = goals_overview.clone().with_dimensions(["ga:date"]);

        entries.push((SourceSlot::SecondaryOverview, visitors_overview));
        entries.push((SourceSlot::SecondaryStats, visitors_stats));
        entries.push((SourceSlot::TertiaryOverview, goals_overview));
        entries.push((SourceSlot::TertiaryStats, goals_stats));
    } else {
        debug!("Analytics not connected, skipping analytics reports");
    }

    Ok(FunnelQueries { entries })
}
