//! View rendering for the search funnel widget.
//!
//! Maps a [`CompositeStatus`] to exactly one panel and wraps it in the
//! rendering shell. Rendering is a pure function of the status and the
//! selection; it is recomputed on every pass.

use crate::analysis::overview::{self, Datapoint, SeriesPoint, ValueFormat};
use crate::analysis::{CompositeStatus, FunnelResults, ViewState};
use crate::models::{ErrorInfo, FunnelMetric, ModuleSlug, ReportData, SourceSlot, FUNNEL_METRICS};
use crate::query::Selection;
use serde::Serialize;

/// Fixed-size placeholder shown while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreviewBlock {
    pub width: &'static str,
    pub height: &'static str,
}

pub const LOADING_BLOCKS: [PreviewBlock; 2] = [
    PreviewBlock {
        width: "100%",
        height: "190px",
    },
    PreviewBlock {
        width: "100%",
        height: "270px",
    },
];

/// Header listing the funnel metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetHeader {
    pub metrics: Vec<FunnelMetric>,
    pub selected_stats: usize,
}

/// Overview of all funnel figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewPanel {
    pub datapoints: Vec<Datapoint>,
    pub selected_stats: usize,
    pub date_range_length: u32,
    /// Analytics is not connected; show the activation prompt instead of its figures.
    pub analytics_cta: bool,
}

/// Chart of the selected metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPanel {
    /// Slot whose report feeds the chart.
    pub source: SourceSlot,
    /// Column index within that report.
    pub selected_stats: usize,
    pub label: String,
    pub color: &'static str,
    pub series: Vec<SeriesPoint>,
}

/// Body of the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "camelCase")]
pub enum Panel {
    Loading {
        blocks: Vec<PreviewBlock>,
    },
    ReportError {
        module: ModuleSlug,
        error: ErrorInfo,
    },
    ReportZero {
        module: ModuleSlug,
    },
    Ready {
        overview: OverviewPanel,
        stats: StatsPanel,
    },
}

/// A widget ready for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedWidget {
    pub header: WidgetHeader,
    pub no_padding: bool,
    pub panel: Panel,
}

impl RenderedWidget {
    pub fn is_error(&self) -> bool {
        matches!(self.panel, Panel::ReportError { .. })
    }
}

/// Container components supplied by the surrounding dashboard.
pub trait WidgetShell {
    type Output;

    fn widget(&self, header: WidgetHeader, no_padding: bool, body: Panel) -> Self::Output;

    fn report_zero(&self, module: ModuleSlug) -> Panel {
        Panel::ReportZero { module }
    }

    fn report_error(&self, module: ModuleSlug, error: &ErrorInfo) -> Panel {
        Panel::ReportError {
            module,
            error: error.clone(),
        }
    }
}

/// Shell producing a [`RenderedWidget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardShell;

impl WidgetShell for StandardShell {
    type Output = RenderedWidget;

    fn widget(&self, header: WidgetHeader, no_padding: bool, panel: Panel) -> RenderedWidget {
        RenderedWidget {
            header,
            no_padding,
            panel,
        }
    }
}

/// Which report and column feed the stats chart for a tab.
///
/// Tabs 3 and 4 address the goals report, whose columns are ordered
/// goals, bounce rate: the column is `tab - 3`.
pub fn stats_selection(selected_tab: usize) -> (SourceSlot, usize) {
    match selected_tab {
        0 | 1 => (SourceSlot::Primary, selected_tab),
        2 => (SourceSlot::SecondaryStats, 0),
        _ => (SourceSlot::TertiaryStats, selected_tab.saturating_sub(3)),
    }
}

/// Render the widget for the given status.
pub fn render<S: WidgetShell>(status: &CompositeStatus, selection: &Selection, shell: &S) -> S::Output {
    let header = WidgetHeader {
        metrics: FUNNEL_METRICS.to_vec(),
        selected_stats: selection.selected_tab,
    };

    match status.state() {
        ViewState::Loading => shell.widget(
            header,
            true,
            Panel::Loading {
                blocks: LOADING_BLOCKS.to_vec(),
            },
        ),
        ViewState::Error(error) => {
            let body = shell.report_error(error.module(), &error.cause);
            shell.widget(header, false, body)
        }
        ViewState::Empty => {
            let body = shell.report_zero(ModuleSlug::SearchConsole);
            shell.widget(header, false, body)
        }
        ViewState::Ready => {
            let body = Panel::Ready {
                overview: overview_panel(status.results(), selection, status.analytics_connected()),
                stats: stats_panel(status.results(), selection),
            };
            shell.widget(header, true, body)
        }
    }
}

fn overview_panel(results: &FunnelResults, selection: &Selection, analytics_connected: bool) -> OverviewPanel {
    let days = selection.date_range_days as usize;
    let mut datapoints = results
        .data(SourceSlot::Primary)
        .map(|data| overview::search_console_datapoints(data, days, selection.compare_mode))
        .unwrap_or_default();

    if let Some(visitors) = results.data(SourceSlot::SecondaryOverview) {
        datapoints.extend(overview::totals_datapoint(
            visitors,
            0,
            "users",
            "Unique Visitors from Search",
            ValueFormat::Count,
        ));
    }

    if let Some(goals) = results.data(SourceSlot::TertiaryOverview) {
        datapoints.extend(overview::totals_datapoint(
            goals,
            0,
            "goals",
            "Goals",
            ValueFormat::Count,
        ));
        datapoints.extend(overview::totals_datapoint(
            goals,
            1,
            "bounce-rate",
            "Bounce Rate",
            ValueFormat::Percent,
        ));
    }

    OverviewPanel {
        datapoints,
        selected_stats: selection.selected_tab,
        date_range_length: selection.date_range_days,
        analytics_cta: !analytics_connected,
    }
}

fn stats_panel(results: &FunnelResults, selection: &Selection) -> StatsPanel {
    let tab = selection.selected_tab.min(FUNNEL_METRICS.len() - 1);
    let (source, selected_stats) = stats_selection(tab);
    let metric = FUNNEL_METRICS[tab];

    let label = match source {
        SourceSlot::SecondaryStats => "Unique Visitors",
        SourceSlot::TertiaryStats if selected_stats == 0 => "Goals",
        SourceSlot::TertiaryStats => "Bounce Rate %",
        _ => metric.label,
    };

    let series = results
        .data(source)
        .map(|data| stats_series(data, source, selected_stats, selection))
        .unwrap_or_default();

    StatsPanel {
        source,
        selected_stats,
        label: label.to_string(),
        color: metric.color,
        series,
    }
}

fn stats_series(
    data: &ReportData,
    source: SourceSlot,
    selected_stats: usize,
    selection: &Selection,
) -> Vec<SeriesPoint> {
    match source {
        SourceSlot::Primary => {
            let column = FUNNEL_METRICS[selected_stats]
                .metric
                .and_then(|name| data.column(name));
            let last_days = Some(selection.date_range_days as usize);
            column
                .map(|c| overview::series(data, c, last_days))
                .unwrap_or_default()
        }
        _ => overview::series(data, selected_stats, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::models::{QueryResult, ReportRow};
    use chrono::NaiveDate;

    fn selection(tab: usize) -> Selection {
        let mut sel = Selection::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 2);
        sel.selected_tab = tab;
        sel
    }

    fn report(headers: &[&str], rows: Vec<(&str, Vec<f64>)>, totals: Vec<Vec<f64>>) -> ReportData {
        ReportData {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|(date, values)| ReportRow {
                    dimensions: vec![date.to_string()],
                    values,
                })
                .collect(),
            totals,
        }
    }

    fn ready_results() -> FunnelResults {
        FunnelResults::collect(|slot| {
            let data = match slot {
                SourceSlot::Primary => report(
                    &["clicks", "impressions"],
                    vec![
                        ("2026-10-15", vec![1.0, 10.0]),
                        ("2026-10-16", vec![2.0, 20.0]),
                        ("2026-10-17", vec![3.0, 30.0]),
                        ("2026-10-18", vec![4.0, 40.0]),
                    ],
                    vec![],
                ),
                SourceSlot::SecondaryOverview => {
                    report(&["Total Users"], vec![("Organic Search", vec![70.0])], vec![vec![70.0], vec![35.0]])
                }
                SourceSlot::SecondaryStats => report(
                    &["Total Users"],
                    vec![("20261017", vec![30.0]), ("20261018", vec![40.0])],
                    vec![],
                ),
                SourceSlot::TertiaryOverview => report(
                    &["Goal Completions", "ga:bounceRate"],
                    vec![],
                    vec![vec![6.0, 48.25], vec![3.0, 50.0]],
                ),
                SourceSlot::TertiaryStats => report(
                    &["Goal Completions", "ga:bounceRate"],
                    vec![("20261017", vec![2.0, 47.0]), ("20261018", vec![4.0, 49.5])],
                    vec![],
                ),
            };
            QueryResult::resolved(data)
        })
    }

    fn render_ready(tab: usize) -> RenderedWidget {
        let status = aggregate(ready_results());
        render(&status, &selection(tab), &StandardShell)
    }

    fn stats_of(widget: &RenderedWidget) -> &StatsPanel {
        match &widget.panel {
            Panel::Ready { stats, .. } => stats,
            other => panic!("expected ready panel, got {:?}", other),
        }
    }

    #[test]
    fn test_stats_selection_mapping() {
        assert_eq!(stats_selection(0), (SourceSlot::Primary, 0));
        assert_eq!(stats_selection(1), (SourceSlot::Primary, 1));
        assert_eq!(stats_selection(2), (SourceSlot::SecondaryStats, 0));
        assert_eq!(stats_selection(3), (SourceSlot::TertiaryStats, 0));
        assert_eq!(stats_selection(4), (SourceSlot::TertiaryStats, 1));
    }

    #[test]
    fn test_loading_renders_placeholders_only() {
        let mut results = ready_results();
        results.set(SourceSlot::TertiaryStats, QueryResult::pending());
        let widget = render(&aggregate(results), &selection(0), &StandardShell);

        assert!(widget.no_padding);
        assert_eq!(
            widget.panel,
            Panel::Loading {
                blocks: LOADING_BLOCKS.to_vec()
            }
        );
    }

    #[test]
    fn test_error_renders_single_panel() {
        let mut results = ready_results();
        results.set(
            SourceSlot::SecondaryStats,
            QueryResult::failed(ErrorInfo::new("rest_forbidden", "Forbidden")),
        );
        let widget = render(&aggregate(results), &selection(0), &StandardShell);

        assert!(widget.is_error());
        match widget.panel {
            Panel::ReportError { module, error } => {
                assert_eq!(module, ModuleSlug::Analytics);
                assert_eq!(error.code, "rest_forbidden");
            }
            other => panic!("unexpected panel {:?}", other),
        }
    }

    #[test]
    fn test_empty_renders_zero_panel() {
        let mut results = ready_results();
        results.set(SourceSlot::Primary, QueryResult::resolved(ReportData::default()));
        let widget = render(&aggregate(results), &selection(0), &StandardShell);

        assert_eq!(
            widget.panel,
            Panel::ReportZero {
                module: ModuleSlug::SearchConsole
            }
        );
    }

    #[test]
    fn test_tab_zero_and_one_use_primary_series() {
        let widget = render_ready(0);
        let stats = stats_of(&widget);
        assert_eq!(stats.source, SourceSlot::Primary);
        assert_eq!(stats.label, "Impressions");
        // Only the current period (last two days) is charted.
        assert_eq!(
            stats.series.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![30.0, 40.0]
        );

        let widget = render_ready(1);
        let stats = stats_of(&widget);
        assert_eq!(stats.selected_stats, 1);
        assert_eq!(stats.series[1].value, 4.0);
        assert_eq!(stats.color, "#27bcd4");
    }

    #[test]
    fn test_tab_two_uses_secondary_stats() {
        let widget = render_ready(2);
        let stats = stats_of(&widget);
        assert_eq!(stats.source, SourceSlot::SecondaryStats);
        assert_eq!(stats.selected_stats, 0);
        assert_eq!(stats.label, "Unique Visitors");
        assert_eq!(stats.series[1].value, 40.0);
    }

    #[test]
    fn test_tabs_three_and_four_shift_index() {
        let widget = render_ready(3);
        let stats = stats_of(&widget);
        assert_eq!(stats.source, SourceSlot::TertiaryStats);
        assert_eq!(stats.selected_stats, 0);
        assert_eq!(stats.series[0].value, 2.0);

        let widget = render_ready(4);
        let stats = stats_of(&widget);
        assert_eq!(stats.source, SourceSlot::TertiaryStats);
        assert_eq!(stats.selected_stats, 1);
        assert_eq!(stats.label, "Bounce Rate %");
        assert_eq!(stats.series[1].value, 49.5);
    }

    #[test]
    fn test_overview_datapoints() {
        let widget = render_ready(0);
        let overview = match &widget.panel {
            Panel::Ready { overview, .. } => overview,
            other => panic!("unexpected panel {:?}", other),
        };

        let ids: Vec<_> = overview.datapoints.iter().map(|d| d.metric_id).collect();
        assert_eq!(ids, vec!["impressions", "clicks", "users", "goals", "bounce-rate"]);
        assert!(!overview.analytics_cta);
        assert_eq!(overview.datapoints[0].value, 70.0);
        assert_eq!(overview.datapoints[2].change, Some(100.0));
        assert_eq!(overview.datapoints[4].formatted, "48.25%");
    }

    #[test]
    fn test_overview_without_analytics_shows_cta() {
        let mut results = ready_results();
        for slot in &SourceSlot::ALL[1..] {
            results.set(*slot, QueryResult::inactive());
        }
        let status = aggregate(results).with_analytics_connected(false);
        let widget = render(&status, &selection(4), &StandardShell);

        match &widget.panel {
            Panel::Ready { overview, stats } => {
                assert!(overview.analytics_cta);
                assert_eq!(overview.datapoints.len(), 2);
                assert!(stats.series.is_empty());
            }
            other => panic!("unexpected panel {:?}", other),
        }
    }

    #[test]
    fn test_cta_follows_registry_not_data() {
        // Connected module whose reports carried no data: no prompt.
        let mut results = ready_results();
        for slot in &SourceSlot::ALL[1..] {
            results.set(*slot, QueryResult::inactive());
        }
        let widget = render(&aggregate(results), &selection(0), &StandardShell);
        match &widget.panel {
            Panel::Ready { overview, .. } => assert!(!overview.analytics_cta),
            other => panic!("unexpected panel {:?}", other),
        }

        // Disconnected module: prompt even though data is present.
        let status = aggregate(ready_results()).with_analytics_connected(false);
        let widget = render(&status, &selection(0), &StandardShell);
        match &widget.panel {
            Panel::Ready { overview, .. } => assert!(overview.analytics_cta),
            other => panic!("unexpected panel {:?}", other),
        }
    }
}
