//! Report sources.
//!
//! A [`ReportSource`] performs the actual fetch for one report. Two
//! sources are provided:
//! - [`FixtureSource`]: canned reports from a JSON fixture file
//! - [`HttpSource`]: the site's report service over HTTP

use crate::models::{ErrorInfo, ModuleSlug, QueryDescriptor, ReportData};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure while fetching a report.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no fixture matches {module} report with dimensions [{dimensions}]")]
    NoFixture { module: ModuleSlug, dimensions: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("report service returned HTTP {status}")]
    Status { status: u16, error: Option<ErrorInfo> },

    #[error("failed to decode report: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("report request timed out after {0}s")]
    Timeout(u64),

    /// Error reported by the source itself.
    #[error("{0}")]
    Report(ErrorInfo),
}

impl From<FetchError> for ErrorInfo {
    fn from(error: FetchError) -> Self {
        let message = error.to_string();
        match error {
            FetchError::Report(info) => info,
            FetchError::Status {
                error: Some(info), ..
            } => info,
            FetchError::Status { status, error: None } => ErrorInfo {
                code: "http_error".to_string(),
                message: format!("Report service returned HTTP {}", status),
                data: Some(serde_json::json!({ "status": status })),
            },
            FetchError::NoFixture { .. } => ErrorInfo::new("no_fixture", message),
            FetchError::Http(_) => ErrorInfo::new("fetch_error", message),
            FetchError::Decode(_) => ErrorInfo::new("invalid_response", message),
            FetchError::Timeout(_) => ErrorInfo::new("timeout", message),
        }
    }
}

/// Fetches one report.
pub trait ReportSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        module: ModuleSlug,
        descriptor: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<ReportData, FetchError>>;
}

/// One canned report in a fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportFixture {
    pub module: ModuleSlug,
    /// Dimensions the request must ask for.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Metric expressions the request must ask for.
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Only match requests filtered to this URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Simulated latency.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub response: Option<ReportData>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl ReportFixture {
    fn matches(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> bool {
        self.module == module
            && self.dimensions == descriptor.dimensions
            && self.metrics.iter().map(String::as_str).eq(descriptor.metric_expressions())
            && self
                .url
                .as_ref()
                .map_or(true, |url| descriptor.url_filter.as_ref() == Some(url))
    }
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    reports: Vec<ReportFixture>,
}

/// Serves reports from fixtures.
///
/// The first fixture whose matchers all agree with the request wins;
/// dates are not matched. A fixture without `response` or `error`
/// resolves to an empty report.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    fixtures: Vec<ReportFixture>,
}

impl FixtureSource {
    pub fn new(fixtures: Vec<ReportFixture>) -> Self {
        Self { fixtures }
    }

    /// Load fixtures from a JSON file of the form `{"reports": [...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse fixture file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(content)?;
        debug!("Loaded {} report fixtures", file.reports.len());
        Ok(Self::new(file.reports))
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    fn find(&self, module: ModuleSlug, descriptor: &QueryDescriptor) -> Option<&ReportFixture> {
        self.fixtures.iter().find(|f| f.matches(module, descriptor))
    }
}

impl ReportSource for FixtureSource {
    fn fetch<'a>(
        &'a self,
        module: ModuleSlug,
        descriptor: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<ReportData, FetchError>> {
        async move {
            let fixture = self
                .find(module, descriptor)
                .ok_or_else(|| FetchError::NoFixture {
                    module,
                    dimensions: descriptor.dimensions.join(", "),
                })?;

            if fixture.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(fixture.delay_ms)).await;
            }

            match (&fixture.error, &fixture.response) {
                (Some(error), _) => Err(FetchError::Report(error.clone())),
                (None, Some(data)) => Ok(data.clone()),
                (None, None) => Ok(ReportData::default()),
            }
        }
        .boxed()
    }
}

/// Fetches reports from the site's report service.
///
/// Requests go to `{base_url}/modules/{slug}/data/report` with the
/// descriptor encoded as query parameters. Successful responses carry a
/// [`ReportData`] body; failures carry an [`ErrorInfo`] body.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    /// Report endpoint for a module.
    pub fn report_url(&self, module: ModuleSlug) -> String {
        format!("{}/modules/{}/data/report", self.base_url, module)
    }

    /// Encode a descriptor as query parameters.
    pub fn query_params(descriptor: &QueryDescriptor) -> Result<Vec<(&'static str, String)>, FetchError> {
        let mut params = vec![
            ("startDate", descriptor.start_date.to_string()),
            ("endDate", descriptor.end_date.to_string()),
        ];

        if let (Some(start), Some(end)) = (descriptor.compare_start_date, descriptor.compare_end_date) {
            params.push(("compareStartDate", start.to_string()));
            params.push(("compareEndDate", end.to_string()));
        }
        if !descriptor.dimensions.is_empty() {
            params.push(("dimensions", descriptor.dimensions.join(",")));
        }
        if !descriptor.metrics.is_empty() {
            params.push(("metrics", serde_json::to_string(&descriptor.metrics)?));
        }
        if let Some(ref url) = descriptor.url_filter {
            params.push(("url", url.clone()));
        }
        if let Some(ref filters) = descriptor.dimension_filters {
            params.push(("dimensionFilters", serde_json::to_string(filters)?));
        }

        Ok(params)
    }

    async fn fetch_report(
        &self,
        module: ModuleSlug,
        descriptor: &QueryDescriptor,
    ) -> Result<ReportData, FetchError> {
        let url = self.report_url(module);
        let params = Self::query_params(descriptor)?;

        debug!("GET {} ({} params)", url, params.len());

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout_seconds)
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                error: serde_json::from_str::<ErrorInfo>(&body).ok(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl ReportSource for HttpSource {
    fn fetch<'a>(
        &'a self,
        module: ModuleSlug,
        descriptor: &'a QueryDescriptor,
    ) -> BoxFuture<'a, Result<ReportData, FetchError>> {
        self.fetch_report(module, descriptor).boxed()
    }
}
