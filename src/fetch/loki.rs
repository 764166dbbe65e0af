//! Loki `query_range` client.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::{LogSourceConfig, RetryConfig, TimeoutConfig};
use crate::error::FetchError;
use crate::fetch::{success_body, transport_error, Harvest, Source};
use crate::model::RecordKind;
use crate::normalize::{normalize_log_lines, LogFieldNaming};
use crate::observability::metrics;
use crate::planner::TimeWindow;
use crate::resilience::retries::retry_fetch;

#[derive(Debug, Clone, Deserialize)]
pub struct LokiResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: LokiData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LokiData {
    #[serde(default)]
    pub result: Vec<LokiStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LokiStream {
    /// `[timestamp_ns, line]` pairs.
    #[serde(default)]
    pub values: Vec<(String, String)>,
}

impl LokiResponse {
    /// Raw log lines in stream order.
    pub fn into_lines(self) -> Vec<String> {
        self.data
            .result
            .into_iter()
            .flat_map(|stream| stream.values.into_iter().map(|(_, line)| line))
            .collect()
    }
}

/// Log fetcher for one LogQL query.
#[derive(Debug, Clone)]
pub struct LokiFetcher {
    client: reqwest::Client,
    endpoint: Url,
    query: String,
    limit: u32,
    naming: LogFieldNaming,
    retries: RetryConfig,
    timeout: Duration,
}

impl LokiFetcher {
    pub fn new(
        client: reqwest::Client,
        config: &LogSourceConfig,
        retries: &RetryConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.endpoint)?,
            query: config.query.clone(),
            limit: config.limit,
            naming: config.field_naming,
            retries: retries.clone(),
            timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    pub fn query_params(&self, window: &TimeWindow) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("start", window.start_nanos().to_string()),
            ("end", window.end_nanos().to_string()),
            ("limit", self.limit.to_string()),
        ]
    }

    /// Fetch raw log lines for `window`.
    ///
    /// A non-success status after retries is logged and yields no lines;
    /// transport and decode failures are returned.
    pub async fn fetch(&self, window: &TimeWindow) -> Result<Vec<String>, FetchError> {
        match retry_fetch(&self.retries, "loki", || self.fetch_once(window)).await {
            Ok(lines) => Ok(lines),
            Err(FetchError::Status { status, body, .. }) => {
                tracing::error!(status, body = %body, %window, "Error fetching logs");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_once(&self, window: &TimeWindow) -> Result<Vec<String>, FetchError> {
        let endpoint = self.endpoint.as_str();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&self.query_params(window))
            .send()
            .await
            .map_err(|e| transport_error(endpoint, self.timeout, e))?;
        let body = success_body(endpoint, self.timeout, response).await?;

        let parsed: LokiResponse = serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok(parsed.into_lines())
    }
}

impl Source for LokiFetcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Logs
    }

    fn name(&self) -> &str {
        "loki"
    }

    fn collect(&self, window: TimeWindow) -> impl Future<Output = Result<Harvest, FetchError>> + Send {
        async move {
            let lines = self.fetch(&window).await?;
            let (rows, stats) = normalize_log_lines(&lines, self.naming);
            metrics::record_fetched(RecordKind::Logs, stats.records);
            tracing::info!(
                lines = lines.len(),
                records = stats.records,
                dropped = stats.dropped,
                %window,
                "Logs fetched successfully"
            );
            Ok(Harvest { rows, stats })
        }
    }
}
