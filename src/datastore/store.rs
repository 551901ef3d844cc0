//! Memoizing report store.
//!
//! Every distinct `(module, descriptor)` pair is fetched at most once.
//! The first selection of a report spawns its fetch on the tokio runtime;
//! later selections read the cached state. Each finished resolution is
//! announced on a broadcast channel so that views can re-render.

use super::source::{FetchError, ReportSource};
use super::DataLayer;
use crate::models::{ErrorInfo, ModuleSlug, QueryDescriptor, QueryResult, ReportData};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type CacheKey = (ModuleSlug, QueryDescriptor);

const NOTIFY_CAPACITY: usize = 64;

/// Announcement that a report finished resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub module: ModuleSlug,
    pub descriptor: QueryDescriptor,
}

#[derive(Debug, Clone)]
enum Resolution {
    Pending,
    Finished(Result<ReportData, ErrorInfo>),
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<CacheKey, Resolution>,
    fetches: usize,
}

/// Report store shared by all widgets of a session.
pub struct ReportStore {
    cache: Arc<Mutex<Cache>>,
    source: Arc<dyn ReportSource>,
    runtime: Handle,
    timeout: Duration,
    notifier: broadcast::Sender<Resolved>,
}

impl ReportStore {
    /// Create a store that spawns fetches on `runtime`.
    pub fn new(source: Arc<dyn ReportSource>, runtime: Handle) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            cache: Arc::new(Mutex::new(Cache::default())),
            source,
            runtime,
            timeout: Duration::from_secs(30),
            notifier,
        }
    }

    /// Upper bound for a single fetch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Receive an event for every resolution finished after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Resolved> {
        self.notifier.subscribe()
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.cache.lock().fetches
    }

    fn resolution(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> Resolution {
        let key = (module, descriptor.clone());
        {
            let mut cache = self.cache.lock();
            if let Some(resolution) = cache.entries.get(&key) {
                return resolution.clone();
            }
            cache.entries.insert(key.clone(), Resolution::Pending);
            cache.fetches += 1;
        }

        self.spawn_fetch(key);
        Resolution::Pending
    }

    fn spawn_fetch(&self, (module, descriptor): CacheKey) {
        let cache = Arc::clone(&self.cache);
        let source = Arc::clone(&self.source);
        let notifier = self.notifier.clone();
        let timeout = self.timeout;

        info!(
            "Fetching {} report {}..{}",
            module, descriptor.start_date, descriptor.end_date
        );

        self.runtime.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, source.fetch(module, &descriptor)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
            };

            let outcome = outcome.map_err(|e| {
                warn!("{} report failed: {}", module, e);
                ErrorInfo::from(e)
            });

            debug!("{} report resolved (ok: {})", module, outcome.is_ok());

            cache
                .lock()
                .entries
                .insert((module, descriptor.clone()), Resolution::Finished(outcome));

            // No subscribers is fine.
            let _ = notifier.send(Resolved { module, descriptor });
        });
    }
}

impl DataLayer for ReportStore {
    fn get_result(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> QueryResult {
        match self.resolution(module, descriptor) {
            Resolution::Pending => QueryResult::pending(),
            Resolution::Finished(Ok(data)) => QueryResult::resolved(data),
            Resolution::Finished(Err(error)) => QueryResult::failed(error),
        }
    }

    fn has_finished_resolution(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> bool {
        matches!(
            self.cache.lock().entries.get(&(module, descriptor.clone())),
            Some(Resolution::Finished(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::source::{FixtureSource, ReportFixture};
    use crate::models::ReportRow;
    use chrono::NaiveDate;

    fn descriptor(day: u32) -> QueryDescriptor {
        let date = NaiveDate::from_ymd_opt(2026, 9, day).unwrap();
        QueryDescriptor::new(date, date).with_dimensions(["date"])
    }

    fn fixture(delay_ms: u64) -> ReportFixture {
        ReportFixture {
            module: ModuleSlug::SearchConsole,
            dimensions: vec!["date".to_string()],
            metrics: vec![],
            url: None,
            delay_ms,
            response: Some(ReportData {
                headers: vec!["clicks".to_string(), "impressions".to_string()],
                rows: vec![ReportRow {
                    dimensions: vec!["2026-09-01".to_string()],
                    values: vec![4.0, 90.0],
                }],
                totals: vec![],
            }),
            error: None,
        }
    }

    fn store(fixtures: Vec<ReportFixture>) -> ReportStore {
        ReportStore::new(Arc::new(FixtureSource::new(fixtures)), Handle::current())
    }

    async fn wait_for(rx: &mut broadcast::Receiver<Resolved>) -> Resolved {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("resolution timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_first_selection_is_pending_then_resolves() {
        let store = store(vec![fixture(0)]);
        let mut rx = store.subscribe();
        let d = descriptor(1);

        let first = store.get_result(ModuleSlug::SearchConsole, &d);
        assert!(first.loading);
        assert!(first.data.is_none());
        assert!(!store.has_finished_resolution(ModuleSlug::SearchConsole, &d));

        let resolved = wait_for(&mut rx).await;
        assert_eq!(resolved.descriptor, d);

        let result = store.get_result(ModuleSlug::SearchConsole, &d);
        assert!(!result.loading);
        assert_eq!(result.data.map(|r| r.rows.len()), Some(1));
        assert!(store.has_finished_resolution(ModuleSlug::SearchConsole, &d));
    }

    #[tokio::test]
    async fn test_fetches_once_per_descriptor() {
        let store = store(vec![fixture(5)]);
        let mut rx = store.subscribe();

        for _ in 0..10 {
            store.get_result(ModuleSlug::SearchConsole, &descriptor(1));
        }
        assert_eq!(store.fetch_count(), 1);

        wait_for(&mut rx).await;
        store.get_result(ModuleSlug::SearchConsole, &descriptor(1));
        assert_eq!(store.fetch_count(), 1);

        // Structurally different descriptor is a different report.
        store.get_result(ModuleSlug::SearchConsole, &descriptor(2));
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_has_finished_resolution_does_not_fetch() {
        let store = store(vec![fixture(0)]);
        assert!(!store.has_finished_resolution(ModuleSlug::SearchConsole, &descriptor(1)));
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_cached_as_error() {
        let store = store(vec![]);
        let mut rx = store.subscribe();
        let d = descriptor(1);

        store.get_result(ModuleSlug::Analytics, &d);
        wait_for(&mut rx).await;

        let result = store.get_result(ModuleSlug::Analytics, &d);
        assert!(!result.loading);
        assert_eq!(result.error.map(|e| e.code), Some("no_fixture".to_string()));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let store = store(vec![fixture(2_000)]).with_timeout(Duration::from_millis(20));
        let mut rx = store.subscribe();
        let d = descriptor(1);

        store.get_result(ModuleSlug::SearchConsole, &d);
        wait_for(&mut rx).await;

        let result = store.get_result(ModuleSlug::SearchConsole, &d);
        assert_eq!(result.error.map(|e| e.code), Some("timeout".to_string()));
    }
}
