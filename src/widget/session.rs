//! Render loop driven by report resolutions.

use super::renderer::{self, RenderedWidget, StandardShell};
use super::FunnelWidget;
use crate::datastore::{ModuleRegistry, ReportStore};
use crate::query::{DateOffsets, Selection, SelectionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Stand-in for an unbounded settle timeout (about 30 years).
const FAR_DEADLINE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A widget bound to a report store, re-rendered as reports resolve.
pub struct WidgetSession {
    store: Arc<ReportStore>,
    registry: Arc<dyn ModuleRegistry + Send + Sync>,
    offsets: DateOffsets,
    selection: Selection,
    renders: usize,
    stale_dropped: usize,
}

impl WidgetSession {
    pub fn new(
        store: Arc<ReportStore>,
        registry: Arc<dyn ModuleRegistry + Send + Sync>,
        offsets: DateOffsets,
        selection: Selection,
    ) -> Self {
        Self {
            store,
            registry,
            offsets,
            selection,
            renders: 0,
            stale_dropped: 0,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Number of render passes so far.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Resolutions ignored because they belonged to another selection.
    pub fn stale_dropped(&self) -> usize {
        self.stale_dropped
    }

    /// Render once with the current cache state.
    pub fn render(&mut self) -> Result<RenderedWidget, SelectionError> {
        let widget = FunnelWidget::new(&*self.store, &*self.registry, self.offsets);
        self.renders += 1;
        widget.render(&self.selection, &StandardShell)
    }

    /// Render until the view leaves the loading state or `timeout` elapses.
    ///
    /// Only resolutions of reports requested by the current selection
    /// trigger a new pass. On timeout the last (loading) view is returned.
    pub async fn settle(&mut self, timeout: Duration) -> Result<RenderedWidget, SelectionError> {
        let deadline = settle_deadline(Instant::now(), timeout);
        let mut resolutions = self.store.subscribe();

        loop {
            let widget = FunnelWidget::new(&*self.store, &*self.registry, self.offsets);
            let (queries, status) = widget.compose(&self.selection)?;
            self.renders += 1;

            if !status.is_loading() {
                info!("Widget settled after {} render passes", self.renders);
                if status.is_empty() {
                    debug!("Primary report holds no data");
                }
                return Ok(renderer::render(&status, &self.selection, &StandardShell));
            }

            loop {
                match tokio::time::timeout_at(deadline, resolutions.recv()).await {
                    Err(_) => {
                        warn!("Reports still loading after {:?}", timeout);
                        return Ok(renderer::render(&status, &self.selection, &StandardShell));
                    }
                    Ok(Ok(resolved)) if queries.contains(resolved.module, &resolved.descriptor) => {
                        debug!("{} report resolved, re-rendering", resolved.module);
                        break;
                    }
                    Ok(Ok(resolved)) => {
                        debug!("Dropping stale {} report resolution", resolved.module);
                        self.stale_dropped += 1;
                    }
                    Ok(Err(RecvError::Lagged(skipped))) => {
                        debug!("Missed {} resolution events, re-rendering", skipped);
                        break;
                    }
                    Ok(Err(RecvError::Closed)) => {
                        return Ok(renderer::render(&status, &self.selection, &StandardShell));
                    }
                }
            }
        }
    }
}

/// `start + timeout`, or a deadline far enough away to never fire when
/// the sum is not representable.
fn settle_deadline(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_DEADLINE)
}
