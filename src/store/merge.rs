//! Cumulative, deduplicated dataset state.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::PersistenceError;
use crate::model::{RecordKind, Table};
use crate::observability::metrics;
use crate::store::layout::{DatasetLayout, Format};
use crate::store::rotation::{self, RetentionPolicy};
use crate::store::snapshot::{write_pair, StagedPair};
use crate::store::{csv, parquet};

/// Where the in-memory table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Loaded { rows: usize, source: PathBuf },
}

/// Extra clean-up applied while merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cleaning {
    #[default]
    AsIs,
    /// Remove columns that are null in every row.
    DropEmptyColumns,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Rows new to the store.
    pub appended: usize,
    /// Incoming rows discarded because their key was already present.
    pub duplicates: usize,
    /// Rows held after the merge.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub rows: usize,
    pub backup: Option<PathBuf>,
    pub pruned: usize,
}

/// Owns one dataset's cumulative table and its on-disk snapshots.
#[derive(Debug)]
pub struct MergeStore {
    kind: RecordKind,
    key: String,
    layout: Option<DatasetLayout>,
    retention: RetentionPolicy,
    cleaning: Cleaning,
    table: Table,
    state: StoreState,
}

impl MergeStore {
    /// Load the cumulative dataset: Parquet first, then CSV, else empty.
    ///
    /// An unreadable snapshot is an error rather than an empty start, so a
    /// damaged file is never silently replaced by a shorter history.
    pub fn open(
        kind: RecordKind,
        layout: DatasetLayout,
        retention: RetentionPolicy,
    ) -> Result<Self, PersistenceError> {
        let parquet_path = layout.cumulative(Format::Parquet);
        let csv_path = layout.cumulative(Format::Csv);

        let (table, state) = if parquet_path.is_file() {
            match parquet::read_table(&parquet_path) {
                Ok(table) => loaded(table, parquet_path),
                Err(e) if csv_path.is_file() => {
                    tracing::warn!(
                        path = %parquet_path.display(),
                        error = %e,
                        "Parquet snapshot unreadable, falling back to CSV"
                    );
                    loaded(csv::read_table(&csv_path, kind)?, csv_path)
                }
                Err(e) => return Err(e),
            }
        } else if csv_path.is_file() {
            loaded(csv::read_table(&csv_path, kind)?, csv_path)
        } else {
            (Table::with_columns(kind.fixed_columns().iter().copied()), StoreState::Empty)
        };

        match &state {
            StoreState::Loaded { rows, source } => {
                tracing::info!(kind = %kind, rows, source = %source.display(), "Loaded existing dataset")
            }
            StoreState::Empty => tracing::info!(kind = %kind, "No existing dataset, starting empty"),
        }

        let mut store = Self {
            kind,
            key: kind.key_column().to_string(),
            layout: Some(layout),
            retention,
            cleaning: Cleaning::AsIs,
            table,
            state,
        };
        for column in kind.fixed_columns() {
            store.table.add_column(*column);
        }
        Ok(store)
    }

    /// In-memory store with no backing directory.
    pub fn detached(kind: RecordKind, cleaning: Cleaning) -> Self {
        Self {
            kind,
            key: kind.key_column().to_string(),
            layout: None,
            retention: RetentionPolicy::keep_all(),
            cleaning,
            table: Table::new(),
            state: StoreState::Empty,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Append `batch` and drop rows whose key is already present.
    ///
    /// Earlier rows win, so merging the same batch twice changes nothing.
    pub fn merge(&mut self, batch: Table) -> MergeOutcome {
        let before = self.table.len();
        let incoming = batch.len();

        self.table.append(batch);
        let duplicates = self.table.dedup_by(&self.key);
        if self.cleaning == Cleaning::DropEmptyColumns {
            let dropped = self.table.drop_empty_columns();
            if !dropped.is_empty() {
                tracing::debug!(kind = %self.kind, columns = ?dropped, "Dropped empty columns");
            }
        }

        let outcome = MergeOutcome {
            appended: self.table.len() - before.min(self.table.len()),
            duplicates,
            total: self.table.len(),
        };
        if duplicates > 0 {
            metrics::record_duplicates(self.kind, duplicates);
        }
        tracing::debug!(
            kind = %self.kind,
            incoming,
            appended = outcome.appended,
            duplicates,
            total = outcome.total,
            "Merged batch"
        );
        outcome
    }

    fn layout(&self) -> Result<&DatasetLayout, PersistenceError> {
        self.layout.as_ref().ok_or(PersistenceError::Detached)
    }

    fn write_daily(&self, fresh: &Table, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        let layout = self.layout()?;
        let root = layout.root();
        fs::create_dir_all(root).map_err(|e| PersistenceError::io(root, e))?;
        let date = now.date_naive();
        write_pair(
            fresh,
            &layout.daily(date, Format::Csv),
            &layout.daily(date, Format::Parquet),
        )
    }

    fn stage_cumulative(&self) -> Result<StagedPair, PersistenceError> {
        let layout = self.layout()?;
        StagedPair::stage(
            &self.table,
            &layout.cumulative(Format::Csv),
            &layout.cumulative(Format::Parquet),
        )
    }

    /// Write the daily pair for `fresh` and the cumulative pair, without rotating.
    pub fn snapshot(&self, fresh: &Table, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        self.write_daily(fresh, now)?;
        self.stage_cumulative()?.commit()
    }

    /// Back up the current on-disk cumulative pair.
    pub fn rotate(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>, PersistenceError> {
        rotation::rotate(self.layout()?, now)
    }

    /// Daily pair, then the cumulative pair staged, previous one backed up,
    /// new one committed, and old backups pruned.
    pub fn persist(&mut self, fresh: &Table, now: DateTime<Utc>) -> Result<PersistReport, PersistenceError> {
        self.write_daily(fresh, now)?;
        let staged = self.stage_cumulative()?;
        let backup = self.rotate(now)?;
        staged.commit()?;

        let layout = self.layout()?.clone();
        let pruned = match rotation::prune(&layout, &self.retention, now) {
            Ok(removed) => removed.len(),
            Err(e) => {
                tracing::warn!(dataset = layout.dataset(), error = %e, "Backup pruning failed");
                0
            }
        };

        self.state = StoreState::Loaded {
            rows: self.table.len(),
            source: layout.cumulative(Format::Parquet),
        };
        metrics::record_dataset_rows(self.kind, self.table.len());
        tracing::info!(
            dataset = layout.dataset(),
            rows = self.table.len(),
            fresh = fresh.len(),
            backup = backup.as_ref().map(|p| p.display().to_string()),
            "Dataset saved"
        );

        Ok(PersistReport {
            rows: self.table.len(),
            backup,
            pruned,
        })
    }
}

fn loaded(table: Table, source: PathBuf) -> (Table, StoreState) {
    let rows = table.len();
    (table, StoreState::Loaded { rows, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Row, Scalar};
    use crate::store::{csv, parquet};
    use crate::store::layout::temp_path;
    use chrono::TimeZone;
    use indexmap::indexmap;
    use tempfile::TempDir;

    fn span(id: &str, op: &str) -> Row {
        indexmap! {
            "spanID".to_string() => Scalar::from(id),
            "traceID".to_string() => Scalar::from("t1"),
            "operationName".to_string() => Scalar::from(op),
        }
    }

    fn batch(rows: Vec<Row>) -> Table {
        rows.into_iter().collect()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, 0, 0).unwrap()
    }

    fn open(dir: &TempDir) -> MergeStore {
        MergeStore::open(
            RecordKind::Spans,
            DatasetLayout::new(dir.path(), "spans"),
            RetentionPolicy::keep_all(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = MergeStore::detached(RecordKind::Spans, Cleaning::AsIs);
        let rows = batch(vec![span("a", "x"), span("b", "y")]);

        let first = store.merge(rows.clone());
        let snapshot = store.table().clone();
        let second = store.merge(rows);

        assert_eq!(first.appended, 2);
        assert_eq!(second.appended, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(store.table(), &snapshot);
    }

    #[test]
    fn test_first_batch_wins() {
        let mut store = MergeStore::detached(RecordKind::Spans, Cleaning::AsIs);
        store.merge(batch(vec![span("a", "old")]));
        store.merge(batch(vec![span("a", "new"), span("b", "y")]));

        assert_eq!(store.len(), 2);
        assert_eq!(store.table().cell(0, "operationName"), &Scalar::from("old"));
    }

    #[test]
    fn test_drop_empty_columns_cleaning() {
        let mut store = MergeStore::detached(RecordKind::Spans, Cleaning::DropEmptyColumns);
        let mut rows = Table::with_columns(["spanID", "tag_unused"]);
        rows.push(indexmap! { "spanID".to_string() => Scalar::from("a") });

        store.merge(rows);

        assert!(!store.table().has_column("tag_unused"));
    }

    #[test]
    fn test_open_empty_has_fixed_columns() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        assert_eq!(store.state(), &StoreState::Empty);
        assert_eq!(
            store.table().columns().collect::<Vec<_>>(),
            RecordKind::Spans.fixed_columns().to_vec()
        );
    }

    #[test]
    fn test_persist_then_reopen() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let fresh = batch(vec![span("a", "x"), span("b", "y")]);
        store.merge(fresh.clone());
        let report = store.persist(&fresh, at(10)).unwrap();

        assert_eq!(report.rows, 2);
        assert!(report.backup.is_none());
        assert!(dir.path().join("daily_spans_2024-03-15.csv").is_file());
        assert!(dir.path().join("daily_spans_2024-03-15.parquet").is_file());

        let reopened = open(&dir);
        assert!(matches!(reopened.state(), StoreState::Loaded { rows: 2, .. }));
        assert_eq!(reopened.table().cell(1, "operationName"), &Scalar::from("y"));
    }

    #[test]
    fn test_snapshot_writes_daily_and_cumulative_without_backup() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path(), "spans");
        let mut store = open(&dir);
        // the raw cycle rows keep their duplicate
        let fresh = batch(vec![span("a", "x"), span("a", "again"), span("b", "y")]);
        store.merge(fresh.clone());

        store.snapshot(&fresh, at(10)).unwrap();

        let date = at(10).date_naive();
        let daily = csv::read_table(&layout.daily(date, Format::Csv), RecordKind::Spans).unwrap();
        assert_eq!(daily.len(), 3);
        let daily = parquet::read_table(&layout.daily(date, Format::Parquet)).unwrap();
        assert_eq!(daily.len(), 3);

        let cumulative = parquet::read_table(&layout.cumulative(Format::Parquet)).unwrap();
        assert_eq!(cumulative.len(), 2);
        assert!(layout.cumulative(Format::Csv).is_file());
        assert!(!layout.backups_dir().exists());
    }

    #[test]
    fn test_second_persist_creates_one_backup_with_both_formats() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let first = batch(vec![span("a", "x")]);
        store.merge(first.clone());
        store.persist(&first, at(10)).unwrap();

        let second = batch(vec![span("b", "y")]);
        store.merge(second.clone());
        let report = store.persist(&second, at(11)).unwrap();

        let backup = report.backup.unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path().join("backups/spans")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(backup.join("full_spans.csv").is_file());
        assert!(backup.join("full_spans.parquet").is_file());

        // the backup holds the previous state
        let previous = parquet::read_table(&backup.join("full_spans.parquet")).unwrap();
        assert_eq!(previous.len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_last_snapshot_loadable() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path(), "spans");
        let mut store = open(&dir);
        let first = batch(vec![span("a", "x")]);
        store.merge(first.clone());
        store.persist(&first, at(10)).unwrap();

        fs::create_dir(temp_path(&layout.cumulative(Format::Parquet))).unwrap();
        let second = batch(vec![span("b", "y")]);
        store.merge(second.clone());
        assert!(store.persist(&second, at(11)).is_err());

        let reopened = open(&dir);
        assert_eq!(reopened.len(), 1);
        assert!(!layout.backups_dir().exists());
    }

    #[test]
    fn test_detached_store_cannot_persist() {
        let mut store = MergeStore::detached(RecordKind::Logs, Cleaning::AsIs);
        let err = store.persist(&Table::new(), at(10)).unwrap_err();
        assert!(matches!(err, PersistenceError::Detached));
    }
}
