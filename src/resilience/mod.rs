//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Query to a backend:
//!     → reqwest client deadlines (connect + request timeout)
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs)
//! Subprocess (archival):
//!     → timeouts.rs (deadline per command)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - 4xx responses other than 429 are never retried

pub mod backoff;
pub mod retries;
pub mod timeouts;
