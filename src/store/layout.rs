//! On-disk naming of one dataset's artifacts.
//!
//! ```text
//! <data_dir>/full_<dataset>.{csv,parquet}
//! <data_dir>/daily_<dataset>_<YYYY-MM-DD>.{csv,parquet}
//! <data_dir>/backups/<dataset>/<YYYY-MM-DD_HH-MM-SS>[_<n>]/
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Parquet,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Csv, Format::Parquet];

    pub const fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
    dataset: String,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dataset: dataset.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Deduplicated history of every cycle.
    pub fn cumulative(&self, format: Format) -> PathBuf {
        self.root
            .join(format!("full_{}.{}", self.dataset, format.extension()))
    }

    /// Raw rows fetched by the cycles of one day.
    pub fn daily(&self, date: NaiveDate, format: Format) -> PathBuf {
        self.root.join(format!(
            "daily_{}_{}.{}",
            self.dataset,
            date.format("%Y-%m-%d"),
            format.extension()
        ))
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups").join(&self.dataset)
    }
}

/// Sibling path a file is written to before being renamed into place.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        let layout = DatasetLayout::new("data", "upload_spans");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        assert_eq!(
            layout.cumulative(Format::Parquet),
            Path::new("data/full_upload_spans.parquet")
        );
        assert_eq!(
            layout.daily(date, Format::Csv),
            Path::new("data/daily_upload_spans_2024-03-05.csv")
        );
        assert_eq!(layout.backups_dir(), Path::new("data/backups/upload_spans"));
    }

    #[test]
    fn test_temp_path_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("data/full_logs.csv")),
            Path::new("data/full_logs.csv.tmp")
        );
    }
}
