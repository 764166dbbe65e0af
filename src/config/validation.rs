//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoints and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoaderConfig → Result<(), Vec<ValidationError>>

use url::Url;

use crate::config::schema::{LoaderConfig, WindowConfig};

/// Longest lookback or chunk accepted: 100 years. Keeps window bounds
/// inside the nanosecond-since-epoch range Loki queries use.
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 86_400;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &LoaderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_endpoint(&mut errors, "traces.endpoint", &config.traces.endpoint);
    check_endpoint(&mut errors, "logs.endpoint", &config.logs.endpoint);
    check_window(&mut errors, "traces.window", &config.traces.window);
    check_window(&mut errors, "logs.window", &config.logs.window);

    if config.traces.service.trim().is_empty() {
        errors.push(ValidationError::new("traces.service", "must not be empty"));
    }
    if config.traces.limit == 0 {
        errors.push(ValidationError::new("traces.limit", "must be greater than 0"));
    }
    if config.logs.limit == 0 {
        errors.push(ValidationError::new("logs.limit", "must be greater than 0"));
    }
    for (field, dataset) in [
        ("traces.dataset", &config.traces.dataset),
        ("logs.dataset", &config.logs.dataset),
    ] {
        if dataset.is_empty() || dataset.contains(['/', '\\']) {
            errors.push(ValidationError::new(field, "must be a plain file-name fragment"));
        }
    }
    if config.traces.dataset == config.logs.dataset {
        errors.push(ValidationError::new("logs.dataset", "must differ from traces.dataset"));
    }
    if config.schedule.interval_secs == 0 {
        errors.push(ValidationError::new("schedule.interval_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.storage.max_backups == Some(0) {
        errors.push(ValidationError::new("storage.max_backups", "must be at least 1 when set"));
    }
    if config.archive.enabled && config.archive.commit_message.trim().is_empty() {
        errors.push(ValidationError::new("archive.commit_message", "must not be empty"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_endpoint(errors: &mut Vec<ValidationError>, field: &str, endpoint: &str) {
    match Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, e.to_string())),
    }
}

fn check_window(errors: &mut Vec<ValidationError>, field: &str, window: &WindowConfig) {
    if window.lookback_secs == 0 {
        errors.push(ValidationError::new(
            format!("{field}.lookback_secs"),
            "must be greater than 0",
        ));
    } else if window.lookback_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::new(
            format!("{field}.lookback_secs"),
            format!("must be at most {MAX_WINDOW_SECS}"),
        ));
    }
    match window.chunk_secs {
        Some(0) => errors.push(ValidationError::new(
            format!("{field}.chunk_secs"),
            "must be greater than 0 when set",
        )),
        Some(secs) if secs > MAX_WINDOW_SECS => errors.push(ValidationError::new(
            format!("{field}.chunk_secs"),
            format!("must be at most {MAX_WINDOW_SECS}"),
        )),
        _ => {}
    }
}
