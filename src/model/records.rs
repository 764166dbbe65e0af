//! Span and log records, and the per-entity column layout.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::model::table::Row;
use crate::model::value::Scalar;

/// The two entities the loader persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Spans,
    Logs,
}

/// How a column is typed when reloaded from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnHint {
    /// Identifiers and free text: never reinterpreted.
    Text,
    Timestamp,
    Infer,
}

impl RecordKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spans => "spans",
            Self::Logs => "logs",
        }
    }

    /// Primary dedup column.
    pub const fn key_column(&self) -> &'static str {
        match self {
            Self::Spans => SpanRecord::SPAN_ID,
            Self::Logs => LogRecord::TIME,
        }
    }

    /// Columns every table of this kind starts with.
    pub const fn fixed_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Spans => &[
                SpanRecord::SPAN_ID,
                SpanRecord::TRACE_ID,
                SpanRecord::OPERATION_NAME,
                SpanRecord::SERVICE_NAME,
                SpanRecord::START_TIME,
                SpanRecord::DURATION,
            ],
            Self::Logs => &[LogRecord::LEVEL, LogRecord::MESSAGE, LogRecord::TIME],
        }
    }

    pub fn column_hint(&self, column: &str) -> ColumnHint {
        match self {
            Self::Spans => match column {
                SpanRecord::START_TIME => ColumnHint::Timestamp,
                SpanRecord::SPAN_ID
                | SpanRecord::TRACE_ID
                | SpanRecord::OPERATION_NAME
                | SpanRecord::SERVICE_NAME => ColumnHint::Text,
                _ => ColumnHint::Infer,
            },
            Self::Logs => match column {
                LogRecord::TIME => ColumnHint::Timestamp,
                LogRecord::LEVEL | LogRecord::MESSAGE => ColumnHint::Text,
                c if c.ends_with("span_id") || c.ends_with("trace_id") => ColumnHint::Text,
                _ => ColumnHint::Infer,
            },
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One distributed-tracing span, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub span_id: String,
    pub trace_id: String,
    pub operation_name: Option<String>,
    pub service_name: Option<String>,
    pub start_time: DateTime<Utc>,
    /// Microseconds.
    pub duration: Option<i64>,
    /// `tag_<key>` → coerced value, in tag order.
    pub tags: IndexMap<String, Scalar>,
}

impl SpanRecord {
    pub const SPAN_ID: &'static str = "spanID";
    pub const TRACE_ID: &'static str = "traceID";
    pub const OPERATION_NAME: &'static str = "operationName";
    pub const SERVICE_NAME: &'static str = "serviceName";
    pub const START_TIME: &'static str = "startTime";
    pub const DURATION: &'static str = "duration";
    pub const TAG_PREFIX: &'static str = "tag_";

    pub fn into_row(self) -> Row {
        let mut row = Row::with_capacity(6 + self.tags.len());
        row.insert(Self::SPAN_ID.to_string(), Scalar::Text(self.span_id));
        row.insert(Self::TRACE_ID.to_string(), Scalar::Text(self.trace_id));
        row.insert(Self::OPERATION_NAME.to_string(), self.operation_name.into());
        row.insert(Self::SERVICE_NAME.to_string(), self.service_name.into());
        row.insert(Self::START_TIME.to_string(), Scalar::Timestamp(self.start_time));
        row.insert(Self::DURATION.to_string(), self.duration.into());
        row.extend(self.tags);
        row
    }
}

/// One structured log line, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub level: String,
    pub message: String,
    /// Remaining payload keys, already named per the field-naming policy.
    pub fields: IndexMap<String, Scalar>,
}

impl LogRecord {
    pub const TIME: &'static str = "time";
    pub const LEVEL: &'static str = "level";
    pub const MESSAGE: &'static str = "message";
    pub const EXTRA_PREFIX: &'static str = "add_";

    pub fn into_row(self) -> Row {
        let mut row = Row::with_capacity(3 + self.fields.len());
        row.insert(Self::LEVEL.to_string(), Scalar::Text(self.level));
        row.insert(Self::MESSAGE.to_string(), Scalar::Text(self.message));
        row.insert(Self::TIME.to_string(), Scalar::Timestamp(self.time));
        row.extend(self.fields);
        row
    }
}
