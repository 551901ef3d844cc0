//! Composite status of the funnel queries.
//!
//! Folds the five per-slot query results into one view state. The fold
//! never fails; it only classifies.

use crate::models::{QueryResult, ReportData, SourceError, SourceSlot};
use serde::Serialize;

/// Query results indexed by slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunnelResults {
    results: [QueryResult; 5],
}

impl FunnelResults {
    /// Collect results by asking `f` for each slot in priority order.
    pub fn collect(mut f: impl FnMut(SourceSlot) -> QueryResult) -> Self {
        Self {
            results: SourceSlot::ALL.map(|slot| f(slot)),
        }
    }

    pub fn get(&self, slot: SourceSlot) -> &QueryResult {
        &self.results[slot.index()]
    }

    pub fn set(&mut self, slot: SourceSlot, result: QueryResult) {
        self.results[slot.index()] = result;
    }

    /// Results paired with their slots, in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceSlot, &QueryResult)> {
        SourceSlot::ALL.into_iter().zip(self.results.iter())
    }

    /// Data of a slot, if it resolved with data.
    pub fn data(&self, slot: SourceSlot) -> Option<&ReportData> {
        self.get(slot).data.as_ref()
    }
}

/// The one panel the widget shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewState {
    Loading,
    Error(SourceError),
    Empty,
    Ready,
}

/// Derived status of all funnel queries together with the results.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeStatus {
    loading: bool,
    error: Option<SourceError>,
    empty: bool,
    state: ViewState,
    results: FunnelResults,
    analytics_connected: bool,
}

impl CompositeStatus {
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// First error in slot priority order. Never computed while loading.
    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }

    /// Whether the primary report is a zero report.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn results(&self) -> &FunnelResults {
        &self.results
    }

    /// Whether the analytics module was connected when the queries were built.
    pub fn analytics_connected(&self) -> bool {
        self.analytics_connected
    }

    /// Record the module registry's answer for analytics. `aggregate`
    /// assumes a connected module.
    pub fn with_analytics_connected(mut self, connected: bool) -> Self {
        self.analytics_connected = connected;
        self
    }
}

/// Fold the funnel results into a composite status.
///
/// Loading beats error beats empty beats ready. A primary error beats a
/// primary zero report; a primary zero report hides errors from the
/// other slots.
pub fn aggregate(results: FunnelResults) -> CompositeStatus {
    if results.iter().any(|(_, r)| r.loading) {
        return CompositeStatus {
            loading: true,
            error: None,
            empty: false,
            state: ViewState::Loading,
            results,
            analytics_connected: true,
        };
    }

    let error = first_error(&results);
    let primary = results.get(SourceSlot::Primary);
    let empty = primary.error.is_none() && is_zero_report(primary.data.as_ref());

    let state = match &error {
        Some(e) if e.which == SourceSlot::Primary => ViewState::Error(e.clone()),
        _ if empty => ViewState::Empty,
        Some(e) => ViewState::Error(e.clone()),
        None => ViewState::Ready,
    };

    CompositeStatus {
        loading: false,
        error,
        empty,
        state,
        results,
        analytics_connected: true,
    }
}

/// First error in slot priority order.
pub fn first_error(results: &FunnelResults) -> Option<SourceError> {
    results.iter().find_map(|(which, result)| {
        result.error.as_ref().map(|cause| SourceError {
            which,
            cause: cause.clone(),
        })
    })
}

/// True when a report was fetched but holds nothing to show: no rows,
/// or current-period totals that are all exactly zero.
///
/// Reports without a totals block (Search Console) are totalled from their
/// rows. Missing data is not a zero report.
pub fn is_zero_report(data: Option<&ReportData>) -> bool {
    match data {
        None => false,
        Some(report) if report.rows.is_empty() => true,
        Some(report) => match report.totals.first().filter(|totals| !totals.is_empty()) {
            Some(totals) => all_zero(totals),
            None => all_zero(&row_totals(report)),
        },
    }
}

/// Sum of every value column across the rows.
fn row_totals(report: &ReportData) -> Vec<f64> {
    let columns = report.rows.iter().map(|row| row.values.len()).max().unwrap_or(0);
    (0..columns)
        .map(|column| report.rows.iter().filter_map(|row| row.value(column)).sum::<f64>())
        .collect()
}

fn all_zero(totals: &[f64]) -> bool {
    !totals.is_empty() && totals.iter().all(|v| *v == 0.0)
}
