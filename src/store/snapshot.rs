//! Atomic CSV + Parquet snapshot writes.
//!
//! Every file goes to `<name>.tmp` first and is renamed over the live path
//! only once both formats were written. An uncommitted stage removes its
//! temp files on drop.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::model::Table;
use crate::store::layout::{temp_path, Format};
use crate::store::{csv, parquet};

/// Temp files written and waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedPair {
    pending: Vec<(PathBuf, PathBuf)>,
}

impl StagedPair {
    /// Write `table` to the temp siblings of `csv_path` and `parquet_path`.
    pub fn stage(table: &Table, csv_path: &Path, parquet_path: &Path) -> Result<Self, PersistenceError> {
        let mut staged = Self { pending: Vec::with_capacity(2) };
        for (format, path) in [(Format::Csv, csv_path), (Format::Parquet, parquet_path)] {
            let tmp = temp_path(path);
            // registered before writing so a partial file is cleaned up too
            staged.pending.push((tmp.clone(), path.to_path_buf()));
            match format {
                Format::Csv => csv::write_table(&tmp, table)?,
                Format::Parquet => parquet::write_table(&tmp, table)?,
            }
        }
        Ok(staged)
    }

    /// Rename every temp file over its live path, Parquet first.
    ///
    /// Parquet is the reload source, so a failure after it landed still
    /// reopens the new state; the stale CSV is reported.
    pub fn commit(mut self) -> Result<(), PersistenceError> {
        let mut committed = 0;
        while let Some((tmp, live)) = self.pending.last().cloned() {
            if let Err(e) = fs::rename(&tmp, &live) {
                if committed > 0 {
                    tracing::warn!(
                        path = %live.display(),
                        error = %e,
                        "Snapshot pair partially committed, live formats disagree"
                    );
                }
                return Err(PersistenceError::io(&live, e));
            }
            self.pending.pop();
            committed += 1;
        }
        Ok(())
    }
}

impl Drop for StagedPair {
    fn drop(&mut self) {
        for (tmp, _) in self.pending.drain(..) {
            if tmp.is_file() {
                if let Err(e) = fs::remove_file(&tmp) {
                    tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Write both formats and commit them.
pub fn write_pair(table: &Table, csv_path: &Path, parquet_path: &Path) -> Result<(), PersistenceError> {
    StagedPair::stage(table, csv_path, parquet_path)?.commit()
}
