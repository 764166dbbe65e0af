//! Jaeger trace flattening.

use indexmap::IndexMap;

use crate::error::MalformedRecordError;
use crate::fetch::jaeger::{JaegerSpan, JaegerTrace};
use crate::model::value::from_epoch_micros;
use crate::model::{RecordKind, SpanRecord, Table};
use crate::normalize::coerce::convert_tag_value;
use crate::normalize::NormalizeStats;
use crate::observability::metrics;

const DEFAULT_TAG_TYPE: &str = "string";

/// Flatten every span of every trace into one table.
pub fn normalize_traces(traces: &[JaegerTrace]) -> (Table, NormalizeStats) {
    let mut table = Table::with_columns(RecordKind::Spans.fixed_columns().iter().copied());
    let mut stats = NormalizeStats::default();

    for trace in traces {
        for span in &trace.spans {
            match span_record(span, trace, &mut stats) {
                Ok(record) => {
                    stats.records += 1;
                    table.push(record.into_row());
                }
                Err(e) => {
                    stats.dropped += 1;
                    metrics::record_dropped(RecordKind::Spans, "malformed");
                    tracing::warn!(
                        trace_id = trace.trace_id.as_deref().unwrap_or_default(),
                        error = %e,
                        "Dropping malformed span"
                    );
                }
            }
        }
    }

    (table, stats)
}

/// Build one span record. Tags that fail coercion are skipped and counted.
pub fn span_record(
    span: &JaegerSpan,
    trace: &JaegerTrace,
    stats: &mut NormalizeStats,
) -> Result<SpanRecord, MalformedRecordError> {
    let span_id = span
        .span_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or(MalformedRecordError::MissingField(SpanRecord::SPAN_ID))?;
    let trace_id = span
        .trace_id
        .clone()
        .or_else(|| trace.trace_id.clone())
        .ok_or(MalformedRecordError::MissingField(SpanRecord::TRACE_ID))?;
    let micros = span
        .start_time
        .ok_or(MalformedRecordError::MissingField(SpanRecord::START_TIME))?;
    let start_time =
        from_epoch_micros(micros).ok_or_else(|| MalformedRecordError::InvalidField {
            field: SpanRecord::START_TIME,
            reason: format!("{micros} is out of range"),
        })?;

    // Inline process first, then the trace-level process table.
    let service_name = span
        .process
        .as_ref()
        .and_then(|p| p.service_name.clone())
        .or_else(|| {
            span.process_id
                .as_ref()
                .and_then(|pid| trace.processes.get(pid))
                .and_then(|p| p.service_name.clone())
        });

    let mut tags = IndexMap::with_capacity(span.tags.len());
    for tag in &span.tags {
        let hint = tag.kind.as_deref().unwrap_or(DEFAULT_TAG_TYPE);
        match convert_tag_value(&tag.value, hint) {
            Ok(value) => {
                tags.insert(format!("{}{}", SpanRecord::TAG_PREFIX, tag.key), value);
            }
            Err(e) => {
                stats.skipped_tags += 1;
                tracing::debug!(span_id = %span_id, tag = %tag.key, error = %e, "Skipping tag");
            }
        }
    }

    Ok(SpanRecord {
        span_id,
        trace_id,
        operation_name: span.operation_name.clone(),
        service_name,
        start_time,
        duration: span.duration,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scalar;
    use serde_json::json;

    fn traces() -> Vec<JaegerTrace> {
        serde_json::from_value(json!([
            {
                "traceID": "t1",
                "processes": { "p1": { "serviceName": "sr-api" } },
                "spans": [
                    {
                        "spanID": "a",
                        "traceID": "t1",
                        "operationName": "/upload",
                        "processID": "p1",
                        "startTime": 1_710_430_000_000_000i64,
                        "duration": 1500,
                        "tags": [
                            { "key": "http.status_code", "type": "int64", "value": 200 },
                            { "key": "error", "type": "bool", "value": false },
                            { "key": "retries", "type": "int", "value": "n/a" }
                        ]
                    },
                    {
                        "traceID": "t1",
                        "operationName": "orphan",
                        "startTime": 1_710_430_000_000_001i64
                    }
                ]
            },
            {
                "traceID": "t2",
                "spans": [
                    {
                        "spanID": "b",
                        "operationName": "db",
                        "process": { "serviceName": "postgres" },
                        "startTime": 1_710_430_000_500_000i64,
                        "duration": 20,
                        "tags": [{ "key": "db.statement", "value": "select 1" }]
                    }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_flattens_spans_with_tags() {
        let (table, stats) = normalize_traces(&traces());

        assert_eq!(stats, NormalizeStats { records: 2, dropped: 1, skipped_tags: 1 });
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, "serviceName"), &Scalar::Text("sr-api".into()));
        assert_eq!(table.cell(0, "tag_http.status_code"), &Scalar::Int(200));
        assert_eq!(table.cell(0, "tag_error"), &Scalar::Bool(false));
        assert!(!table.has_column("tag_retries"));
        assert_eq!(table.cell(0, "duration"), &Scalar::Int(1500));
    }

    #[test]
    fn test_span_falls_back_to_trace_fields() {
        let (table, _) = normalize_traces(&traces());

        assert_eq!(table.cell(1, "traceID"), &Scalar::Text("t2".into()));
        assert_eq!(table.cell(1, "serviceName"), &Scalar::Text("postgres".into()));
        assert_eq!(table.cell(1, "tag_db.statement"), &Scalar::Text("select 1".into()));
        let expected = from_epoch_micros(1_710_430_000_500_000).unwrap();
        assert_eq!(table.cell(1, "startTime"), &Scalar::Timestamp(expected));
    }

    #[test]
    fn test_missing_span_id_is_malformed() {
        let trace = &traces()[0];
        let mut stats = NormalizeStats::default();
        let err = span_record(&trace.spans[1], trace, &mut stats).unwrap_err();
        assert_eq!(err, MalformedRecordError::MissingField("spanID"));
    }
}
