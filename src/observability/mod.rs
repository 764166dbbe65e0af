//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All stages produce:
//!     → logging.rs (structured log events, one span per cycle with cycle_id)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout and optional log file
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
