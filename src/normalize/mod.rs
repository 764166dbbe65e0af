//! Record normalization subsystem.
//!
//! # Data Flow
//! ```text
//! Jaeger traces → traces.rs → SpanRecord per span (tags via coerce.rs)
//! Loki lines    → logs.rs   → LogRecord per line
//!     → Row → Table handed to the merge store
//! ```
//!
//! # Design Decisions
//! - Bad records are dropped and counted, never abort the batch
//! - A tag that fails coercion is skipped; the span survives

pub mod coerce;
pub mod logs;
pub mod traces;

pub use coerce::convert_tag_value;
pub use logs::{normalize_log_lines, LogFieldNaming};
pub use traces::normalize_traces;

/// Per-batch normalization counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Records turned into rows.
    pub records: usize,
    /// Records dropped as malformed.
    pub dropped: usize,
    /// Tags skipped because coercion failed.
    pub skipped_tags: usize,
}

impl NormalizeStats {
    pub fn absorb(&mut self, other: NormalizeStats) {
        self.records += other.records;
        self.dropped += other.dropped;
        self.skipped_tags += other.skipped_tags;
    }
}
