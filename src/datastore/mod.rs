//! Data layer for report queries.
//!
//! The widget only talks to the [`DataLayer`] and [`ModuleRegistry`]
//! traits. [`ReportStore`] is the memoizing implementation backed by a
//! [`ReportSource`] (fixture file or report service).

pub mod source;
pub mod store;

pub use source::{FetchError, FixtureSource, HttpSource, ReportSource};
pub use store::{ReportStore, Resolved};

use crate::models::{ModuleSlug, QueryDescriptor, QueryResult};
use std::collections::BTreeSet;

/// Read access to report query state.
pub trait DataLayer {
    /// Current state of the report `descriptor` from `module`.
    ///
    /// Selecting a report that was never requested starts its resolution.
    fn get_result(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> QueryResult;

    /// True once the report has resolved, successfully or not.
    fn has_finished_resolution(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> bool;
}

/// Knows which reporting modules are active and connected.
pub trait ModuleRegistry {
    fn is_module_connected(&self, module: ModuleSlug) -> bool;
}

/// Registry with a fixed set of connected modules.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    connected: BTreeSet<ModuleSlug>,
}

impl StaticRegistry {
    pub fn new(connected: impl IntoIterator<Item = ModuleSlug>) -> Self {
        Self {
            connected: connected.into_iter().collect(),
        }
    }

    /// Registry matching the widget settings.
    pub fn from_config(config: &crate::config::WidgetConfig) -> Self {
        let mut connected = vec![ModuleSlug::SearchConsole];
        if config.analytics_connected {
            connected.push(ModuleSlug::Analytics);
        }
        Self::new(connected)
    }
}

impl ModuleRegistry for StaticRegistry {
    fn is_module_connected(&self, module: ModuleSlug) -> bool {
        self.connected.contains(&module)
    }
}
