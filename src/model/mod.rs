//! Data model shared by every pipeline stage.
//!
//! # Data Flow
//! ```text
//! raw JSON (Jaeger trace / Loki line)
//!     → SpanRecord / LogRecord (fixed fields + ordered extension map)
//!     → Row (sparse column → Scalar)
//!     → Table (ordered header, merged and persisted by the store)
//! ```

pub mod records;
pub mod table;
pub mod value;

pub use records::{ColumnHint, LogRecord, RecordKind, SpanRecord};
pub use table::{Row, Table};
pub use value::{parse_timestamp, Scalar, TIMESTAMP_FORMAT};
