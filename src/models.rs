//! Data models for the search funnel widget.
//!
//! This module contains the core data structures shared by the query
//! builder, the report store and the widget: report requests, report
//! payloads, per-query results and the source slots they are bound to.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Reporting module a query is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleSlug {
    /// Search Console (impressions, clicks).
    SearchConsole,
    /// Analytics (users, goals, bounce rate).
    Analytics,
}

impl ModuleSlug {
    /// Returns the slug used in module registries and REST routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleSlug::SearchConsole => "search-console",
            ModuleSlug::Analytics => "analytics",
        }
    }
}

impl fmt::Display for ModuleSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named position of a query in the funnel.
///
/// Declaration order is the error priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceSlot {
    Primary,
    SecondaryOverview,
    SecondaryStats,
    TertiaryOverview,
    TertiaryStats,
}

impl SourceSlot {
    /// All slots in priority order.
    pub const ALL: [SourceSlot; 5] = [
        SourceSlot::Primary,
        SourceSlot::SecondaryOverview,
        SourceSlot::SecondaryStats,
        SourceSlot::TertiaryOverview,
        SourceSlot::TertiaryStats,
    ];

    /// Position of the slot in [`SourceSlot::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Module that serves reports for this slot.
    pub fn module(self) -> ModuleSlug {
        match self {
            SourceSlot::Primary => ModuleSlug::SearchConsole,
            _ => ModuleSlug::Analytics,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSlot::Primary => "primary",
            SourceSlot::SecondaryOverview => "secondaryOverview",
            SourceSlot::SecondaryStats => "secondaryStats",
            SourceSlot::TertiaryOverview => "tertiaryOverview",
            SourceSlot::TertiaryStats => "tertiaryStats",
        }
    }
}

impl fmt::Display for SourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric requested from a report, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric expression (e.g. `ga:users`).
    pub expression: String,
    /// Display alias returned as the column header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl MetricSpec {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Describes one report request.
///
/// Two descriptors with the same fields address the same report; the
/// report store uses the descriptor itself as its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_filters: Option<BTreeMap<String, String>>,
}

impl QueryDescriptor {
    /// Creates a descriptor covering `start_date..=end_date`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            compare_start_date: None,
            compare_end_date: None,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            url_filter: None,
            dimension_filters: None,
        }
    }

    pub fn with_compare_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.compare_start_date = Some(start);
        self.compare_end_date = Some(end);
        self
    }

    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricSpec>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_dimension_filter(mut self, dimension: &str, value: &str) -> Self {
        self.dimension_filters
            .get_or_insert_with(BTreeMap::new)
            .insert(dimension.to_string(), value.to_string());
        self
    }

    pub fn with_url_filter(mut self, url: Option<&str>) -> Self {
        self.url_filter = url.map(str::to_string);
        self
    }

    /// Metric expressions in request order.
    pub fn metric_expressions(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.expression.as_str()).collect()
    }
}

/// A single report row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportRow {
    /// Dimension values, in the order the descriptor requested them.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Metric values, in `ReportData::headers` order.
    #[serde(default)]
    pub values: Vec<f64>,
}

impl ReportRow {
    pub fn value(&self, column: usize) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// A fetched report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportData {
    /// Names of the value columns.
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
    /// Column totals; index 0 is the current period, index 1 the compare period.
    #[serde(default)]
    pub totals: Vec<Vec<f64>>,
}

impl ReportData {
    /// Index of the value column with the given header.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// Opaque error returned by the data layer (WordPress REST error shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// State of one report query as seen by the widget.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryResult {
    pub data: Option<ReportData>,
    pub loading: bool,
    pub error: Option<ErrorInfo>,
}

impl QueryResult {
    /// Result for a slot whose module is not connected. No request is made.
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn resolved(data: ReportData) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn failed(error: ErrorInfo) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// A report failure attributed to the slot it happened in.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{which} report from {} failed: {cause}", .which.module())]
pub struct SourceError {
    pub which: SourceSlot,
    pub cause: ErrorInfo,
}

impl SourceError {
    /// Module whose report failed.
    pub fn module(&self) -> ModuleSlug {
        self.which.module()
    }
}

/// One selectable metric of the funnel header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunnelMetric {
    pub id: &'static str,
    pub color: &'static str,
    pub label: &'static str,
    /// Report column for Search Console metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<&'static str>,
    pub service: ModuleSlug,
}

/// The five funnel metrics, in tab order.
pub const FUNNEL_METRICS: [FunnelMetric; 5] = [
    FunnelMetric {
        id: "impressions",
        color: "#4285f4",
        label: "Impressions",
        metric: Some("impressions"),
        service: ModuleSlug::SearchConsole,
    },
    FunnelMetric {
        id: "clicks",
        color: "#27bcd4",
        label: "Clicks",
        metric: Some("clicks"),
        service: ModuleSlug::SearchConsole,
    },
    FunnelMetric {
        id: "users",
        color: "#1b9688",
        label: "Users",
        metric: None,
        service: ModuleSlug::Analytics,
    },
    FunnelMetric {
        id: "goals",
        color: "#673ab7",
        label: "Goals",
        metric: None,
        service: ModuleSlug::Analytics,
    },
    FunnelMetric {
        id: "bounce-rate",
        color: "#673ab7",
        label: "Bounce Rate",
        metric: None,
        service: ModuleSlug::Analytics,
    },
];
