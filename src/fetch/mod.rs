//! Source fetching subsystem.
//!
//! # Data Flow
//! ```text
//! TimeWindow
//!     → jaeger.rs (GET /api/traces, µs range, basic auth) → normalize::traces
//!     → loki.rs   (GET query_range, ns range)              → normalize::logs
//!     → Harvest (normalized Table + counters)
//! ```
//!
//! # Design Decisions
//! - One shared reqwest client with connect and request deadlines
//! - Transport errors and 5xx are retried with backoff before surfacing
//! - Loki status failures degrade to an empty harvest; Jaeger ones surface

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::error::FetchError;
use crate::model::{RecordKind, Table};
use crate::normalize::NormalizeStats;
use crate::planner::TimeWindow;

pub mod jaeger;
pub mod loki;

pub use jaeger::JaegerFetcher;
pub use loki::LokiFetcher;

/// Normalized output of one fetch.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub rows: Table,
    pub stats: NormalizeStats,
}

/// A remote backend that can be queried for a time window and yields rows.
pub trait Source {
    fn kind(&self) -> RecordKind;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Fetch and normalize everything in `window`.
    fn collect(&self, window: TimeWindow) -> impl Future<Output = Result<Harvest, FetchError>> + Send;
}

/// Shared HTTP client with the configured deadlines.
pub fn build_client(timeouts: &TimeoutConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.request_secs))
        .user_agent(concat!("telemetry-loader/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn transport_error(endpoint: &str, timeout: Duration, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            endpoint: endpoint.to_string(),
            timeout,
        }
    } else {
        FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

/// Read a response body, mapping non-success statuses to [`FetchError::Status`].
pub(crate) async fn success_body(
    endpoint: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<String, FetchError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(endpoint, timeout, e))?;
    if !status.is_success() {
        return Err(FetchError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: truncate(body, 512),
        });
    }
    Ok(body)
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
