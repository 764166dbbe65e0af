//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the loader.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::normalize::LogFieldNaming;
use crate::planner::WindowPlan;

/// Root configuration for the loaders.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoaderConfig {
    /// Where datasets, daily captures and backups live.
    pub storage: StorageConfig,

    /// Jaeger trace source.
    pub traces: TraceSourceConfig,

    /// Loki log source.
    pub logs: LogSourceConfig,

    /// Batch or continuous operation.
    pub schedule: ScheduleConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Optional DVC push of the data directory.
    pub archive: ArchiveConfig,

    /// Offline span/log join.
    pub enrich: EnrichConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Storage layout and backup retention.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory.
    pub data_dir: PathBuf,

    /// Keep at most this many backup directories per dataset. Unset keeps
    /// every backup; set it (e.g. `max_backups = 48`) to turn on pruning.
    pub max_backups: Option<usize>,

    /// Delete backup directories older than this many days. Unset disables
    /// age-based pruning.
    pub max_backup_age_days: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_backups: None,
            max_backup_age_days: None,
        }
    }
}

/// What to do when a fetch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Log, skip the rest of the cycle, try again next cycle.
    #[default]
    SkipCycle,
    /// Stop the loader.
    Abort,
}

/// Fetch window settings shared by both sources.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// How far back each cycle looks, in seconds.
    pub lookback_secs: u64,

    /// Split the window into chunks of this many seconds.
    #[serde(default)]
    pub chunk_secs: Option<u64>,
}

impl WindowConfig {
    pub fn plan(&self) -> WindowPlan {
        WindowPlan {
            lookback: Duration::from_secs(self.lookback_secs),
            chunk: self.chunk_secs.map(Duration::from_secs),
        }
    }
}

/// Jaeger query API source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceSourceConfig {
    /// Query endpoint, e.g. "http://jaeger:16686/api/traces".
    pub endpoint: String,

    /// Service to query.
    pub service: String,

    /// Operation filter; omitted from the query when unset.
    pub operation: Option<String>,

    /// Maximum traces per query.
    pub limit: u32,

    /// Dataset name used in file names.
    pub dataset: String,

    /// Env var holding the basic-auth user.
    pub username_env: String,

    /// Env var holding the basic-auth password.
    pub password_env: String,

    /// Basic-auth credentials, filled from the environment at load time.
    #[serde(skip)]
    pub credentials: Option<Credentials>,

    pub window: WindowConfig,

    pub on_fetch_failure: FetchFailurePolicy,
}

impl Default for TraceSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:16686/api/traces".to_string(),
            service: "sr-api".to_string(),
            operation: Some("/upload".to_string()),
            limit: 25_000,
            dataset: "upload_spans".to_string(),
            username_env: "JAEGER_USERNAME".to_string(),
            password_env: "JAEGER_PASSWORD".to_string(),
            credentials: None,
            window: WindowConfig {
                lookback_secs: 24 * 3600,
                chunk_secs: None,
            },
            on_fetch_failure: FetchFailurePolicy::SkipCycle,
        }
    }
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Loki query_range source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSourceConfig {
    /// Query endpoint, e.g. "http://loki:3100/loki/api/v1/query_range".
    pub endpoint: String,

    /// LogQL selector.
    pub query: String,

    /// Maximum entries per query.
    pub limit: u32,

    /// Dataset name used in file names.
    pub dataset: String,

    /// Column naming for extra payload keys.
    pub field_naming: LogFieldNaming,

    pub window: WindowConfig,

    pub on_fetch_failure: FetchFailurePolicy,
}

impl Default for LogSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3100/loki/api/v1/query_range".to_string(),
            query: "{container_name=\"/sr-api\"} |= `` | json | __error__=``".to_string(),
            limit: 5000,
            dataset: "logs".to_string(),
            field_naming: LogFieldNaming::Verbatim,
            window: WindowConfig {
                lookback_secs: 30 * 60,
                chunk_secs: None,
            },
            on_fetch_failure: FetchFailurePolicy::SkipCycle,
        }
    }
}

/// Scheduler operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Run one cycle and exit.
    #[default]
    Batch,
    /// Run cycles forever on a fixed interval.
    Continuous,
}

/// Scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: RunMode,

    /// Sleep between cycles in continuous mode, in seconds.
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Batch,
            interval_secs: 30 * 60,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Whole request timeout in seconds.
    pub request_secs: u64,

    /// Deadline for each archival subprocess in seconds.
    pub archive_command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            archive_command_secs: 300,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// DVC archival configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Enable `dvc add` / `git commit` / `dvc push` after each cycle.
    pub enabled: bool,

    /// Commit message for the data pointer file.
    pub commit_message: String,

    /// Repository working directory; defaults to the process cwd.
    pub repo_dir: Option<PathBuf>,

    /// DVC executable.
    pub dvc_command: String,

    /// Git executable.
    pub git_command: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            commit_message: "Update telemetry data".to_string(),
            repo_dir: None,
            dvc_command: "dvc".to_string(),
            git_command: "git".to_string(),
        }
    }
}

/// Offline enrichment output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// CSV file the joined spans are written to.
    pub output: PathBuf,

    /// Prefix for log columns whose names collide with span columns.
    pub collision_prefix: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("enriched_spans.csv"),
            collision_prefix: "log_".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json: bool,

    /// Also append logs to this file.
    pub log_file: Option<PathBuf>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            log_file: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.logs.limit, 5000);
        assert_eq!(config.traces.window.lookback_secs, 86_400);
        assert_eq!(config.schedule.mode, RunMode::Batch);
        assert_eq!(config.traces.on_fetch_failure, FetchFailurePolicy::SkipCycle);
        assert!(!config.archive.enabled);
        assert_eq!(config.storage.max_backups, None);
        assert_eq!(config.storage.max_backup_age_days, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LoaderConfig = toml::from_str(
            r#"
            [logs]
            endpoint = "http://loki:3100/loki/api/v1/query_range"
            field_naming = "prefixed"
            window = { lookback_secs = 86400, chunk_secs = 3600 }

            [schedule]
            mode = "continuous"
            "#,
        )
        .unwrap();

        assert_eq!(config.logs.field_naming, LogFieldNaming::Prefixed);
        assert_eq!(config.logs.limit, 5000);
        assert_eq!(config.logs.window.plan().chunk, Some(Duration::from_secs(3600)));
        assert_eq!(config.schedule.mode, RunMode::Continuous);
        assert_eq!(config.schedule.interval_secs, 1800);
        assert_eq!(config.traces.service, "sr-api");
    }

    #[test]
    fn test_credentials_are_redacted() {
        let creds = Credentials {
            username: "ops".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
