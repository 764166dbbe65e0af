//! Incremental telemetry loader.
//!
//! Pulls spans from Jaeger and structured logs from Loki, normalizes them into
//! tables, merges each cycle into a deduplicated cumulative dataset and keeps
//! CSV + Parquet snapshots with timestamped backups.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌─────────────┐   ┌─────────┐
//!   │ planner  │──▶│   fetch   │──▶│ normalize │──▶│    store    │──▶│ archive │
//!   │ windows  │   │jaeger/loki│   │ rows      │   │ merge+files │   │  (dvc)  │
//!   └──────────┘   └───────────┘   └───────────┘   └─────────────┘   └─────────┘
//!         ▲                                                │
//!         └────────────── scheduler (one cycle / interval) ┘
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```

// Pipeline
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod planner;
pub mod scheduler;
pub mod store;

// Outer steps
pub mod archive;
pub mod enrich;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::LoaderConfig;
pub use lifecycle::Shutdown;
pub use scheduler::{CycleReport, Scheduler};
pub use store::MergeStore;
