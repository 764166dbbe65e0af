//! Incremental merge store.
//!
//! # Data Flow
//! ```text
//! open:    full_<dataset>.parquet → else full_<dataset>.csv → else empty
//! merge:   cumulative ++ batch → dedup on key column (earlier rows win)
//! persist: daily pair → stage cumulative .tmp pair → rotate live pair into
//!          backups/<dataset>/<ts>/ → rename .tmp over live → prune backups
//! ```
//!
//! # Design Decisions
//! - The live cumulative files are only ever replaced by rename
//! - A failed stage leaves the previous snapshot and no new backup
//! - Parquet is the preferred reload source; CSV is the fallback

pub mod csv;
pub mod layout;
pub mod merge;
pub mod parquet;
pub mod rotation;
pub mod snapshot;

pub use layout::{DatasetLayout, Format};
pub use merge::{Cleaning, MergeOutcome, MergeStore, PersistReport, StoreState};
pub use rotation::RetentionPolicy;
