//! The search funnel widget.
//!
//! [`FunnelWidget`] runs one render pass: build descriptors, select their
//! results from the data layer, fold them, render. [`WidgetSession`] repeats
//! passes as reports resolve until the view settles.

pub mod renderer;
pub mod session;

pub use renderer::{render, Panel, RenderedWidget, StandardShell, WidgetShell};
pub use session::WidgetSession;

use crate::analysis::{aggregate, CompositeStatus, FunnelResults};
use crate::datastore::{DataLayer, ModuleRegistry};
use crate::models::{ModuleSlug, QueryResult};
use crate::query::{build_queries, DateOffsets, FunnelQueries, Selection, SelectionError};

/// One render pass of the funnel widget over its collaborators.
pub struct FunnelWidget<'a> {
    data: &'a dyn DataLayer,
    registry: &'a dyn ModuleRegistry,
    offsets: DateOffsets,
}

impl<'a> FunnelWidget<'a> {
    pub fn new(data: &'a dyn DataLayer, registry: &'a dyn ModuleRegistry, offsets: DateOffsets) -> Self {
        Self {
            data,
            registry,
            offsets,
        }
    }

    /// Build descriptors and fold their current results.
    pub fn compose(&self, selection: &Selection) -> Result<(FunnelQueries, CompositeStatus), SelectionError> {
        let queries = build_queries(selection, self.offsets, self.registry)?;
        let results = self.collect(&queries);
        let connected = self.registry.is_module_connected(ModuleSlug::Analytics);
        Ok((queries, aggregate(results).with_analytics_connected(connected)))
    }

    /// Results for every slot. Slots without a descriptor are inactive and
    /// never reach the data layer.
    ///
    /// A slot is loading until the data layer reports its resolution as
    /// finished. The finished check runs before the result is selected, so
    /// a report resolving in between still counts as loading for this pass.
    pub fn collect(&self, queries: &FunnelQueries) -> FunnelResults {
        FunnelResults::collect(|slot| match queries.get(slot) {
            Some(descriptor) => {
                let module = slot.module();
                let finished = self.data.has_finished_resolution(module, descriptor);
                let mut result = self.data.get_result(module, descriptor);
                result.loading = !finished;
                result
            }
            None => QueryResult::inactive(),
        })
    }

    pub fn render<S: WidgetShell>(&self, selection: &Selection, shell: &S) -> Result<S::Output, SelectionError> {
        let (_, status) = self.compose(selection)?;
        Ok(renderer::render(&status, selection, shell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ViewState;
    use crate::datastore::StaticRegistry;
    use crate::models::{ErrorInfo, QueryDescriptor, ReportData, ReportRow, SourceSlot};
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// Data layer with fixed results per module and dimensions, recording calls.
    #[derive(Default)]
    struct MockDataLayer {
        results: HashMap<(ModuleSlug, Vec<String>), QueryResult>,
        unfinished: HashSet<(ModuleSlug, Vec<String>)>,
        calls: Mutex<Vec<(ModuleSlug, QueryDescriptor)>>,
    }

    impl MockDataLayer {
        fn with(mut self, module: ModuleSlug, dimensions: &[&str], result: QueryResult) -> Self {
            let key = (module, dimensions.iter().map(|d| d.to_string()).collect());
            self.results.insert(key, result);
            self
        }

        /// Report a resolution as unfinished whatever its result says.
        fn still_resolving(mut self, module: ModuleSlug, dimensions: &[&str]) -> Self {
            self.unfinished
                .insert((module, dimensions.iter().map(|d| d.to_string()).collect()));
            self
        }

        fn calls_for(&self, module: ModuleSlug) -> usize {
            self.calls.lock().iter().filter(|(m, _)| *m == module).count()
        }
    }

    impl DataLayer for MockDataLayer {
        fn get_result(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> QueryResult {
            self.calls.lock().push((module, descriptor.clone()));
            self.results
                .get(&(module, descriptor.dimensions.clone()))
                .cloned()
                .unwrap_or_else(QueryResult::pending)
        }

        fn has_finished_resolution(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> bool {
            let key = (module, descriptor.dimensions.clone());
            !self.unfinished.contains(&key) && self.results.get(&key).map_or(false, |r| !r.loading)
        }
    }

    fn selection() -> Selection {
        Selection::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 28)
    }

    fn one_row() -> ReportData {
        ReportData {
            headers: vec!["clicks".to_string(), "impressions".to_string()],
            rows: vec![ReportRow {
                dimensions: vec!["2026-10-18".to_string()],
                values: vec![1.0, 5.0],
            }],
            totals: vec![vec![1.0, 5.0]],
        }
    }

    fn resolved_everywhere() -> MockDataLayer {
        MockDataLayer::default()
            .with(ModuleSlug::SearchConsole, &["date"], QueryResult::resolved(one_row()))
            .with(ModuleSlug::Analytics, &["ga:channelGrouping"], QueryResult::resolved(one_row()))
            .with(
                ModuleSlug::Analytics,
                &["ga:date", "ga:channelGrouping"],
                QueryResult::resolved(one_row()),
            )
            .with(ModuleSlug::Analytics, &[], QueryResult::resolved(one_row()))
            .with(ModuleSlug::Analytics, &["ga:date"], QueryResult::resolved(one_row()))
    }

    #[test]
    fn test_ready_when_everything_resolved() {
        let data = resolved_everywhere();
        let registry = StaticRegistry::new([ModuleSlug::SearchConsole, ModuleSlug::Analytics]);
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let (queries, status) = widget.compose(&selection()).unwrap();
        assert_eq!(queries.len(), 5);
        assert_eq!(status.state(), &ViewState::Ready);
    }

    #[test]
    fn test_secondary_loading_renders_loading() {
        let data = MockDataLayer::default()
            .with(ModuleSlug::SearchConsole, &["date"], QueryResult::resolved(one_row()))
            .with(ModuleSlug::Analytics, &["ga:channelGrouping"], QueryResult::pending());
        let registry = StaticRegistry::new([ModuleSlug::SearchConsole, ModuleSlug::Analytics]);
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let rendered = widget.render(&selection(), &StandardShell).unwrap();
        assert!(matches!(rendered.panel, Panel::Loading { .. }));
    }

    #[test]
    fn test_disabled_module_never_selected() {
        let data = resolved_everywhere();
        let registry = StaticRegistry::new([ModuleSlug::SearchConsole]);
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let (_, status) = widget.compose(&selection()).unwrap();
        for slot in &SourceSlot::ALL[1..] {
            assert_eq!(status.results().get(*slot), &QueryResult::inactive());
        }
        assert_eq!(data.calls_for(ModuleSlug::Analytics), 0);
        assert_eq!(data.calls_for(ModuleSlug::SearchConsole), 1);
        assert_eq!(status.state(), &ViewState::Ready);
    }

    #[test]
    fn test_primary_error_over_secondary_error() {
        let data = resolved_everywhere()
            .with(
                ModuleSlug::SearchConsole,
                &["date"],
                QueryResult::failed(ErrorInfo::new("X", "primary failed")),
            )
            .with(
                ModuleSlug::Analytics,
                &["ga:channelGrouping"],
                QueryResult::failed(ErrorInfo::new("Y", "secondary failed")),
            );
        let registry = StaticRegistry::new([ModuleSlug::SearchConsole, ModuleSlug::Analytics]);
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let rendered = widget.render(&selection(), &StandardShell).unwrap();
        match rendered.panel {
            Panel::ReportError { module, error } => {
                assert_eq!(module, ModuleSlug::SearchConsole);
                assert_eq!(error.code, "X");
            }
            other => panic!("unexpected panel {:?}", other),
        }
    }

    #[test]
    fn test_invalid_selection_is_rejected() {
        let data = resolved_everywhere();
        let registry = StaticRegistry::default();
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let mut sel = selection();
        sel.selected_tab = 9;
        assert_eq!(
            widget.render(&sel, &StandardShell).unwrap_err(),
            SelectionError::TabOutOfRange(9)
        );
        assert!(data.calls.lock().is_empty());
    }

    #[test]
    fn test_unfinished_resolution_is_loading() {
        // The result carries no loading flag, but the resolution is not finished.
        let data = resolved_everywhere().still_resolving(ModuleSlug::Analytics, &["ga:date"]);
        let registry = StaticRegistry::new([ModuleSlug::SearchConsole, ModuleSlug::Analytics]);
        let widget = FunnelWidget::new(&data, &registry, DateOffsets::default());

        let (_, status) = widget.compose(&selection()).unwrap();
        assert!(status.results().get(SourceSlot::TertiaryStats).loading);
        assert_eq!(status.state(), &ViewState::Loading);
    }

    #[test]
    fn test_analytics_cta_from_registry() {
        let data = resolved_everywhere();

        let connected = StaticRegistry::new([ModuleSlug::SearchConsole, ModuleSlug::Analytics]);
        let widget = FunnelWidget::new(&data, &connected, DateOffsets::default());
        let (_, status) = widget.compose(&selection()).unwrap();
        assert!(status.analytics_connected());

        let search_only = StaticRegistry::new([ModuleSlug::SearchConsole]);
        let widget = FunnelWidget::new(&data, &search_only, DateOffsets::default());
        match widget.render(&selection(), &StandardShell).unwrap().panel {
            Panel::Ready { overview, .. } => assert!(overview.analytics_cta),
            other => panic!("unexpected panel {:?}", other),
        }
    }
}
