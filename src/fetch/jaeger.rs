//! Jaeger query API client.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::{Credentials, RetryConfig, TimeoutConfig, TraceSourceConfig};
use crate::error::FetchError;
use crate::fetch::{success_body, transport_error, Harvest, Source};
use crate::model::RecordKind;
use crate::normalize::normalize_traces;
use crate::observability::metrics;
use crate::planner::TimeWindow;
use crate::resilience::retries::retry_fetch;

/// `GET /api/traces` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JaegerResponse {
    #[serde(default)]
    pub data: Option<Vec<JaegerTrace>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JaegerTrace {
    #[serde(rename = "traceID", default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub spans: Vec<JaegerSpan>,
    #[serde(default)]
    pub processes: HashMap<String, JaegerProcess>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaegerSpan {
    #[serde(rename = "spanID", default)]
    pub span_id: Option<String>,
    #[serde(rename = "traceID", default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub operation_name: Option<String>,
    /// Epoch microseconds.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Microseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub tags: Vec<JaegerTag>,
    #[serde(rename = "processID", default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub process: Option<JaegerProcess>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaegerProcess {
    #[serde(default)]
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JaegerTag {
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// Trace fetcher for one service/operation.
#[derive(Clone)]
pub struct JaegerFetcher {
    client: reqwest::Client,
    endpoint: Url,
    service: String,
    operation: Option<String>,
    limit: u32,
    credentials: Option<Credentials>,
    retries: RetryConfig,
    timeout: Duration,
}

impl JaegerFetcher {
    pub fn new(
        client: reqwest::Client,
        config: &TraceSourceConfig,
        retries: &RetryConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.endpoint)?,
            service: config.service.clone(),
            operation: config.operation.clone(),
            limit: config.limit,
            credentials: config.credentials.clone(),
            retries: retries.clone(),
            timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    /// Query parameters for `window`; `operation` only when configured.
    pub fn query_params(&self, window: &TimeWindow) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("service", self.service.clone()),
            ("start", window.start_micros().to_string()),
            ("end", window.end_micros().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(operation) = &self.operation {
            params.push(("operation", operation.clone()));
        }
        params
    }

    /// Fetch all traces in `window`, retrying transient failures.
    pub async fn fetch(&self, window: &TimeWindow) -> Result<Vec<JaegerTrace>, FetchError> {
        retry_fetch(&self.retries, "jaeger", || self.fetch_once(window)).await
    }

    async fn fetch_once(&self, window: &TimeWindow) -> Result<Vec<JaegerTrace>, FetchError> {
        let endpoint = self.endpoint.as_str();
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&self.query_params(window));
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(endpoint, self.timeout, e))?;
        let body = success_body(endpoint, self.timeout, response).await?;

        let parsed: JaegerResponse = serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.data {
            Some(traces) if !traces.is_empty() => Ok(traces),
            _ => Err(FetchError::NoData {
                service: self.service.clone(),
            }),
        }
    }
}

impl Source for JaegerFetcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Spans
    }

    fn name(&self) -> &str {
        "jaeger"
    }

    fn collect(&self, window: TimeWindow) -> impl Future<Output = Result<Harvest, FetchError>> + Send {
        async move {
            let traces = self.fetch(&window).await?;
            let (rows, stats) = normalize_traces(&traces);
            metrics::record_fetched(RecordKind::Spans, stats.records);
            tracing::info!(
                service = %self.service,
                traces = traces.len(),
                spans = stats.records,
                dropped = stats.dropped,
                %window,
                "Traces fetched"
            );
            Ok(Harvest { rows, stats })
        }
    }
}

impl std::fmt::Debug for JaegerFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JaegerFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("service", &self.service)
            .field("operation", &self.operation)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}
