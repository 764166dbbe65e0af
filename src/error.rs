//! Error taxonomy for the loader pipeline.
//!
//! # Propagation
//! ```text
//! ConversionError      → per tag: skipped and counted
//! MalformedRecordError → per record: dropped and counted
//! FetchError           → per cycle: FetchFailurePolicy decides (skip or abort);
//!                        NoData counts as an empty window
//! PersistenceError     → per cycle: fatal for the cycle, scheduler keeps going
//! ArchivalError        → always logged and swallowed
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A tag value could not be coerced into the hinted type.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("cannot convert {value} to {target}")]
pub struct ConversionError {
    /// Rendered source value.
    pub value: String,
    /// Target type hint.
    pub target: &'static str,
}

/// A fetched record is missing required fields or cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedRecordError {
    /// A required identifier or timestamp is absent.
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field is present but has the wrong shape.
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The payload is not a JSON object.
    #[error("unparseable payload: {0}")]
    Unparseable(String),
}

/// Errors raised while querying a remote backend.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, reset, TLS).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded its deadline.
    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// Backend answered with a non-success status.
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body is not the expected JSON document.
    #[error("invalid response body from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Trace query succeeded but carried no traces.
    #[error("no traces found for service {service}")]
    NoData { service: String },

    /// Fetch abandoned because shutdown was requested.
    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode { .. } | FetchError::NoData { .. } | FetchError::Cancelled => false,
        }
    }
}

/// Disk write, read or move failure in the merge store.
///
/// Arrow and Parquet errors are boxed to keep the enum small.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(Box<arrow::error::ArrowError>),

    #[error("Parquet error: {0}")]
    Parquet(Box<parquet::errors::ParquetError>),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("store has no backing directory")]
    Detached,
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

impl From<arrow::error::ArrowError> for PersistenceError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Arrow(Box::new(err))
    }
}

impl From<parquet::errors::ParquetError> for PersistenceError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::Parquet(Box::new(err))
    }
}

/// Failure of the optional version-control archival step.
#[derive(Debug, Error)]
pub enum ArchivalError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Why a whole cycle did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server_error = FetchError::Status {
            endpoint: "http://jaeger".into(),
            status: 503,
            body: String::new(),
        };
        assert!(server_error.is_retryable());

        let not_found = FetchError::Status {
            endpoint: "http://jaeger".into(),
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_retryable());

        assert!(!FetchError::NoData { service: "sr-api".into() }.is_retryable());
        assert!(FetchError::Timeout {
            endpoint: "http://loki".into(),
            timeout: Duration::from_secs(5)
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ConversionError {
            value: "abc".into(),
            target: "int",
        };
        assert_eq!(err.to_string(), "cannot convert abc to int");

        let err = MalformedRecordError::MissingField("spanID");
        assert!(err.to_string().contains("spanID"));
    }
}
