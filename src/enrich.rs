//! Offline span enrichment.
//!
//! # Data Flow
//! ```text
//! full_<spans>.csv + backups/<spans>/**/*.csv
//!     → detached MergeStore (dedup on spanID, drop all-null columns)
//! full_<logs>.{parquet,csv}
//!     → span_id / add_span_id renamed to spanID
//!     → left join spans ⋈ logs → CSV
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::model::{RecordKind, SpanRecord, Table};
use crate::store::{csv, Cleaning, DatasetLayout, Format, MergeStore, RetentionPolicy};

/// Log columns that carry the span identifier, in preference order.
const LOG_SPAN_COLUMNS: [&str; 2] = ["span_id", "add_span_id"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub span_files: usize,
    pub spans: usize,
    pub logs: usize,
    pub rows: usize,
    pub output: PathBuf,
}

/// Every span CSV: the cumulative one first, then backups oldest first.
pub fn span_files(layout: &DatasetLayout) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut files = Vec::new();
    let cumulative = layout.cumulative(Format::Csv);
    if cumulative.is_file() {
        files.push(cumulative);
    }

    let pattern = layout.backups_dir().join("**").join("*.csv");
    for entry in glob::glob(&pattern.to_string_lossy())? {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable backup entry"),
        }
    }
    Ok(files)
}

/// Union of every span snapshot, deduplicated and without empty columns.
pub fn collect_spans(files: &[PathBuf]) -> Table {
    let mut store = MergeStore::detached(RecordKind::Spans, Cleaning::DropEmptyColumns);
    for path in files {
        match csv::read_table(path, RecordKind::Spans) {
            Ok(table) => {
                store.merge(table);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping span file"),
        }
    }
    store.into_table()
}

/// Rename the log span-identifier column to the span key. Returns whether
/// the logs can be joined at all.
pub fn align_log_key(logs: &mut Table) -> bool {
    if logs.has_column(SpanRecord::SPAN_ID) {
        return true;
    }
    LOG_SPAN_COLUMNS
        .iter()
        .any(|column| logs.rename_column(column, SpanRecord::SPAN_ID))
}

pub fn enrich(
    spans: &DatasetLayout,
    logs: &DatasetLayout,
    output: &Path,
    prefix: &str,
) -> Result<EnrichReport, PersistenceError> {
    let files = span_files(spans)?;
    if files.is_empty() {
        tracing::warn!(dir = %spans.root().display(), "No span CSV files found");
    }
    let span_table = collect_spans(&files);

    let mut log_table = MergeStore::open(RecordKind::Logs, logs.clone(), RetentionPolicy::keep_all())?
        .into_table();
    let log_rows = log_table.len();

    let enriched = if align_log_key(&mut log_table) {
        span_table.left_join(&log_table, SpanRecord::SPAN_ID, prefix)
    } else {
        tracing::warn!("Logs carry no span identifier column, writing spans unchanged");
        span_table.clone()
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }
    csv::write_table(output, &enriched)?;

    let report = EnrichReport {
        span_files: files.len(),
        spans: span_table.len(),
        logs: log_rows,
        rows: enriched.len(),
        output: output.to_path_buf(),
    };
    tracing::info!(
        span_files = report.span_files,
        spans = report.spans,
        logs = report.logs,
        rows = report.rows,
        output = %output.display(),
        "Enriched spans written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::csv;
    use crate::model::Scalar;
    use indexmap::indexmap;
    use tempfile::TempDir;

    #[test]
    fn test_align_log_key_prefers_span_id() {
        let mut logs = Table::with_columns(["time", "add_span_id"]);
        assert!(align_log_key(&mut logs));
        assert!(logs.has_column("spanID"));

        let mut unrelated = Table::with_columns(["time", "message"]);
        assert!(!align_log_key(&mut unrelated));
    }

    #[test]
    fn test_collect_spans_dedups_across_files() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");

        let mut a = Table::with_columns(["spanID", "tag_empty"]);
        a.push(indexmap! { "spanID".to_string() => Scalar::from("s1") });
        csv::write_table(&first, &a).unwrap();

        let mut b = Table::new();
        b.push(indexmap! { "spanID".to_string() => Scalar::from("s1") });
        b.push(indexmap! { "spanID".to_string() => Scalar::from("s2") });
        csv::write_table(&second, &b).unwrap();

        let spans = collect_spans(&[first, second, dir.path().join("missing.csv")]);

        assert_eq!(spans.len(), 2);
        assert!(!spans.has_column("tag_empty"));
    }
}
