//! Structured log line flattening.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::MalformedRecordError;
use crate::model::value::from_epoch_millis;
use crate::model::{LogRecord, RecordKind, Scalar, Table};
use crate::normalize::NormalizeStats;
use crate::observability::metrics;

/// Column naming for payload keys other than `time`, `level` and `message`.
///
/// One policy applies to a whole dataset; mixing them would split the same
/// field across two columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFieldNaming {
    /// Keep payload keys as they are (`span_id` stays `span_id`).
    #[default]
    Verbatim,
    /// Prefix payload keys with `add_`.
    Prefixed,
}

impl LogFieldNaming {
    pub fn column_for(&self, key: &str) -> String {
        match self {
            Self::Verbatim => key.to_string(),
            Self::Prefixed => format!("{}{}", LogRecord::EXTRA_PREFIX, key),
        }
    }
}

/// Parse every line; malformed lines are dropped and counted.
pub fn normalize_log_lines(lines: &[String], naming: LogFieldNaming) -> (Table, NormalizeStats) {
    let mut table = Table::with_columns(RecordKind::Logs.fixed_columns().iter().copied());
    let mut stats = NormalizeStats::default();

    for line in lines {
        match log_record(line, naming) {
            Ok(record) => {
                stats.records += 1;
                table.push(record.into_row());
            }
            Err(e) => {
                stats.dropped += 1;
                metrics::record_dropped(RecordKind::Logs, "malformed");
                tracing::warn!(error = %e, "Dropping malformed log line");
            }
        }
    }

    if stats.records == 0 {
        tracing::warn!("No log entries to parse");
    } else {
        tracing::debug!(records = stats.records, "Log entries parsed");
    }
    (table, stats)
}

/// Parse one JSON log line.
pub fn log_record(line: &str, naming: LogFieldNaming) -> Result<LogRecord, MalformedRecordError> {
    let payload: Map<String, Value> = serde_json::from_str(line)
        .map_err(|e| MalformedRecordError::Unparseable(e.to_string()))?;

    let raw_time = payload
        .get(LogRecord::TIME)
        .ok_or(MalformedRecordError::MissingField(LogRecord::TIME))?;
    let time = epoch_millis(raw_time)
        .and_then(from_epoch_millis)
        .ok_or_else(|| MalformedRecordError::InvalidField {
            field: LogRecord::TIME,
            reason: format!("{raw_time} is not epoch milliseconds"),
        })?;

    let mut fields = IndexMap::with_capacity(payload.len().saturating_sub(3));
    let mut level = String::new();
    let mut message = String::new();
    for (key, value) in &payload {
        match key.as_str() {
            LogRecord::TIME => {}
            LogRecord::LEVEL => level = text(value),
            LogRecord::MESSAGE => message = text(value),
            other => {
                fields.insert(naming.column_for(other), Scalar::from_json(value));
            }
        }
    }

    Ok(LogRecord {
        time,
        level,
        message,
        fields,
    })
}

fn epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|x| x as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
