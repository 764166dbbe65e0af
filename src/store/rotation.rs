//! Backup rotation and retention.
//!
//! # Responsibilities
//! - Copy the live cumulative pair into one timestamped backup directory
//! - Prune backup directories by count and age
//!
//! # Design Decisions
//! - Files are copied into a hidden staging directory which is then renamed,
//!   so a backup directory is either complete or absent
//! - Same-second collisions get a `_<n>` suffix instead of overwriting
//! - Directories whose names do not parse as a backup timestamp are ignored

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::config::StorageConfig;
use crate::error::PersistenceError;
use crate::store::layout::{DatasetLayout, Format};

const BACKUP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const STAGING_PREFIX: &str = ".staging-";

/// How many backup directories to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_backups: Option<usize>,
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn keep_all() -> Self {
        Self::default()
    }
}

impl From<&StorageConfig> for RetentionPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_backups: config.max_backups,
            max_age: config
                .max_backup_age_days
                .map(|days| Duration::from_secs(days.saturating_mul(24 * 60 * 60))),
        }
    }
}

/// Copy the live cumulative files into a new backup directory.
///
/// Returns `None` when there is nothing to back up yet.
pub fn rotate(layout: &DatasetLayout, now: DateTime<Utc>) -> Result<Option<PathBuf>, PersistenceError> {
    let sources: Vec<PathBuf> = Format::ALL
        .iter()
        .map(|f| layout.cumulative(*f))
        .filter(|p| p.is_file())
        .collect();
    if sources.is_empty() {
        return Ok(None);
    }

    let backups = layout.backups_dir();
    fs::create_dir_all(&backups).map_err(|e| PersistenceError::io(&backups, e))?;
    let target = unique_backup_dir(&backups, now);
    let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let staging = backups.join(format!("{STAGING_PREFIX}{name}"));

    if let Err(e) = copy_into(&sources, &staging).and_then(|()| {
        fs::rename(&staging, &target).map_err(|e| PersistenceError::io(&target, e))
    }) {
        if staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        return Err(e);
    }

    tracing::info!(backup = %target.display(), files = sources.len(), "Backup created");
    Ok(Some(target))
}

fn copy_into(sources: &[PathBuf], dir: &Path) -> Result<(), PersistenceError> {
    fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = dir.join(name);
        fs::copy(source, &dest).map_err(|e| PersistenceError::io(&dest, e))?;
    }
    Ok(())
}

fn unique_backup_dir(backups: &Path, now: DateTime<Utc>) -> PathBuf {
    let base = now.format(BACKUP_FORMAT).to_string();
    let mut candidate = backups.join(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = backups.join(format!("{base}_{n}"));
        n += 1;
    }
    candidate
}

/// Timestamp encoded in a backup directory name, suffix ignored.
fn backup_time(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.get(..19)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Backup directories, oldest first.
pub fn list_backups(layout: &DatasetLayout) -> Result<Vec<PathBuf>, PersistenceError> {
    let backups = layout.backups_dir();
    if !backups.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(&backups).map_err(|e| PersistenceError::io(&backups, e))?;

    let mut found: Vec<(DateTime<Utc>, u32, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io(&backups, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }
        let Some(time) = backup_time(name) else {
            continue;
        };
        let suffix = name
            .get(20..)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        found.push((time, suffix, path));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, _, path)| path).collect())
}

/// Delete backups beyond the retention policy. Returns the removed paths.
pub fn prune(
    layout: &DatasetLayout,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut backups = list_backups(layout)?;
    let mut doomed = Vec::new();

    // An age reaching past the representable range expires nothing.
    let cutoff = policy
        .max_age
        .and_then(|age| TimeDelta::from_std(age).ok())
        .and_then(|age| now.checked_sub_signed(age));
    if let Some(cutoff) = cutoff {
        let (old, young): (Vec<_>, Vec<_>) = backups.into_iter().partition(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(backup_time)
                .is_some_and(|time| time < cutoff)
        });
        doomed.extend(old);
        backups = young;
    }

    if let Some(max) = policy.max_backups {
        let excess = backups.len().saturating_sub(max);
        doomed.extend(backups.drain(..excess));
    }

    for path in &doomed {
        fs::remove_dir_all(path).map_err(|e| PersistenceError::io(path, e))?;
    }
    if !doomed.is_empty() {
        tracing::info!(dataset = layout.dataset(), removed = doomed.len(), "Pruned old backups");
    }
    Ok(doomed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, DatasetLayout) {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path(), "spans");
        fs::write(layout.cumulative(Format::Csv), "spanID\na\n").unwrap();
        fs::write(layout.cumulative(Format::Parquet), b"PAR1").unwrap();
        (dir, layout)
    }

    fn at(hour: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, 0, sec).unwrap()
    }

    #[test]
    fn test_rotate_copies_both_formats() {
        let (_dir, layout) = seeded();

        let backup = rotate(&layout, at(10, 0)).unwrap().unwrap();

        assert!(backup.ends_with("backups/spans/2024-03-15_10-00-00"));
        assert!(backup.join("full_spans.csv").is_file());
        assert!(backup.join("full_spans.parquet").is_file());
        // live files untouched
        assert!(layout.cumulative(Format::Csv).is_file());
    }

    #[test]
    fn test_rotate_without_live_files_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let layout = DatasetLayout::new(dir.path(), "spans");
        assert!(rotate(&layout, at(10, 0)).unwrap().is_none());
        assert!(!layout.backups_dir().exists());
    }

    #[test]
    fn test_same_second_rotation_gets_suffix() {
        let (_dir, layout) = seeded();

        let first = rotate(&layout, at(10, 0)).unwrap().unwrap();
        let second = rotate(&layout, at(10, 0)).unwrap().unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("2024-03-15_10-00-00_1"));
        assert_eq!(list_backups(&layout).unwrap(), vec![first, second]);
    }

    #[test]
    fn test_prune_by_count_keeps_newest() {
        let (_dir, layout) = seeded();
        for sec in 0..4 {
            rotate(&layout, at(10, sec)).unwrap();
        }

        let policy = RetentionPolicy {
            max_backups: Some(2),
            max_age: None,
        };
        let removed = prune(&layout, &policy, at(11, 0)).unwrap();

        assert_eq!(removed.len(), 2);
        let kept = list_backups(&layout).unwrap();
        assert!(kept[0].ends_with("2024-03-15_10-00-02"));
        assert!(kept[1].ends_with("2024-03-15_10-00-03"));
    }

    #[test]
    fn test_prune_by_age() {
        let (_dir, layout) = seeded();
        rotate(&layout, at(1, 0)).unwrap();
        rotate(&layout, at(9, 0)).unwrap();

        let policy = RetentionPolicy {
            max_backups: None,
            max_age: Some(Duration::from_secs(4 * 3600)),
        };
        prune(&layout, &policy, at(10, 0)).unwrap();

        let kept = list_backups(&layout).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].ends_with("2024-03-15_09-00-00"));
    }

    #[test]
    fn test_unrelated_directories_are_left_alone() {
        let (_dir, layout) = seeded();
        fs::create_dir_all(layout.backups_dir().join("manual-copy")).unwrap();
        rotate(&layout, at(10, 0)).unwrap();

        let policy = RetentionPolicy {
            max_backups: Some(0),
            max_age: None,
        };
        prune(&layout, &policy, at(11, 0)).unwrap();

        assert!(layout.backups_dir().join("manual-copy").is_dir());
        assert!(list_backups(&layout).unwrap().is_empty());
    }

    #[test]
    fn test_unbounded_age_expires_nothing() {
        let (_dir, layout) = seeded();
        rotate(&layout, at(1, 0)).unwrap();

        let config = StorageConfig {
            max_backup_age_days: Some(u64::MAX),
            ..StorageConfig::default()
        };
        let removed = prune(&layout, &RetentionPolicy::from(&config), at(10, 0)).unwrap();

        assert!(removed.is_empty());
        assert_eq!(list_backups(&layout).unwrap().len(), 1);
    }
}
