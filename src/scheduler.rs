//! Cycle scheduling.
//!
//! # Responsibilities
//! - Run one fetch → normalize → merge → persist → archive cycle
//! - Repeat cycles on a fixed interval until shutdown
//!
//! # Design Decisions
//! - Chunked windows are fetched one after another; any chunk failure fails
//!   the whole cycle so a partial window is never persisted
//! - A source reporting no data contributes zero rows rather than an error
//! - Zero fetched rows skip persistence and archival
//! - Shutdown cancels an in-flight fetch or the inter-cycle sleep, never a write

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::archive::Archiver;
use crate::config::FetchFailurePolicy;
use crate::error::{CycleError, FetchError};
use crate::fetch::{Harvest, Source};
use crate::lifecycle::ShutdownSignal;
use crate::model::Table;
use crate::normalize::NormalizeStats;
use crate::observability::metrics;
use crate::planner::WindowPlan;
use crate::store::{MergeOutcome, MergeStore, PersistReport};

/// Result of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub windows: usize,
    pub stats: NormalizeStats,
    pub merge: MergeOutcome,
    /// `None` when nothing was fetched.
    pub persisted: Option<PersistReport>,
    pub archived: bool,
}

impl CycleReport {
    pub fn fetched(&self) -> usize {
        self.stats.records
    }
}

pub struct Scheduler<S> {
    source: S,
    store: MergeStore,
    plan: WindowPlan,
    interval: Duration,
    on_fetch_failure: FetchFailurePolicy,
    archiver: Option<Archiver>,
    shutdown: ShutdownSignal,
}

impl<S: Source> Scheduler<S> {
    pub fn new(
        source: S,
        store: MergeStore,
        plan: WindowPlan,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            store,
            plan,
            interval,
            on_fetch_failure: FetchFailurePolicy::default(),
            archiver: None,
            shutdown,
        }
    }

    pub fn with_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.on_fetch_failure = policy;
        self
    }

    pub fn with_archiver(mut self, archiver: Option<Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn store(&self) -> &MergeStore {
        &self.store
    }

    /// Run a single cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let kind = self.source.kind();
        let span = tracing::info_span!("cycle", cycle_id = %cycle_id, kind = %kind);

        let started = Instant::now();
        let result = self.cycle(cycle_id).instrument(span).await;
        let outcome = match &result {
            Ok(report) if report.persisted.is_some() => "ok",
            Ok(_) => "empty",
            Err(CycleError::Fetch(FetchError::Cancelled)) => "cancelled",
            Err(_) => "failed",
        };
        metrics::record_cycle(kind, outcome, started.elapsed());
        result
    }

    async fn cycle(&mut self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        let now = Utc::now();
        let windows = self.plan.windows(now);
        tracing::info!(source = self.source.name(), windows = windows.len(), "Cycle started");

        let mut fresh = Table::new();
        let mut stats = NormalizeStats::default();
        for window in &windows {
            let harvest = tokio::select! {
                harvest = self.source.collect(*window) => harvest,
                _ = self.shutdown.recv() => Err(FetchError::Cancelled),
            };
            match harvest {
                Ok(Harvest { rows, stats: batch }) => {
                    fresh.append(rows);
                    stats.absorb(batch);
                }
                Err(FetchError::NoData { service }) => {
                    tracing::info!(service = %service, %window, "No records in window");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if fresh.is_empty() {
            tracing::info!("No new records fetched, skipping save");
            return Ok(CycleReport {
                cycle_id,
                windows: windows.len(),
                stats,
                merge: MergeOutcome {
                    total: self.store.len(),
                    ..MergeOutcome::default()
                },
                persisted: None,
                archived: false,
            });
        }

        let merge = self.store.merge(fresh.clone());
        tracing::info!(
            fetched = fresh.len(),
            appended = merge.appended,
            duplicates = merge.duplicates,
            total = merge.total,
            "Merged into cumulative dataset"
        );
        let persisted = self.store.persist(&fresh, now)?;

        let archived = match &self.archiver {
            Some(archiver) => match archiver.archive().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Archival failed");
                    false
                }
            },
            None => false,
        };

        Ok(CycleReport {
            cycle_id,
            windows: windows.len(),
            stats,
            merge,
            persisted: Some(persisted),
            archived,
        })
    }

    /// Run cycles every `interval` until shutdown.
    ///
    /// Returns an error only when a fetch fails under
    /// [`FetchFailurePolicy::Abort`].
    pub async fn run_forever(&mut self) -> Result<(), CycleError> {
        tracing::info!(
            source = self.source.name(),
            interval_secs = self.interval.as_secs(),
            "Continuous mode started"
        );

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            match self.run_once().await {
                Ok(report) => tracing::info!(
                    cycle_id = %report.cycle_id,
                    fetched = report.fetched(),
                    total = report.merge.total,
                    "Cycle complete"
                ),
                Err(CycleError::Fetch(FetchError::Cancelled)) => break,
                Err(CycleError::Fetch(e)) if self.on_fetch_failure == FetchFailurePolicy::Abort => {
                    tracing::error!(error = %e, "Fetch failed, aborting");
                    return Err(CycleError::Fetch(e));
                }
                Err(e) => tracing::error!(error = %e, "Cycle failed, retrying next interval"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.recv() => break,
            }
        }

        tracing::info!("Continuous mode stopped");
        Ok(())
    }
}
