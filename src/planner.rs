//! Fetch window planning.
//!
//! # Responsibilities
//! - Compute the `[start, end)` window for a cycle from a lookback
//! - Split a window into consecutive fixed-size chunks for backfills
//!
//! # Design Decisions
//! - Pure: the caller supplies `now`
//! - The last chunk is clamped to `end`, so chunks tile the window exactly

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// An absolute half-open time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `end = now`, `start = now - lookback`, saturating at the earliest
    /// representable instant.
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: now
                .checked_sub_signed(to_delta(lookback))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: now,
        }
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn start_micros(&self) -> i64 {
        self.start.timestamp_micros()
    }

    pub fn end_micros(&self) -> i64 {
        self.end.timestamp_micros()
    }

    pub fn start_nanos(&self) -> i64 {
        self.start.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    pub fn end_nanos(&self) -> i64 {
        self.end.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    /// Consecutive sub-windows of `step`, ascending. Iterating again restarts.
    pub fn chunks(&self, step: Duration) -> Chunks {
        Chunks {
            next_start: self.start,
            end: self.end,
            step: to_delta(step),
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Lazy chunk sequence produced by [`TimeWindow::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks {
    next_start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl Iterator for Chunks {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        // A zero step would never advance.
        if self.next_start >= self.end || self.step <= TimeDelta::zero() {
            return None;
        }
        let start = self.next_start;
        let end = start
            .checked_add_signed(self.step)
            .map_or(self.end, |end| end.min(self.end));
        self.next_start = end;
        Some(TimeWindow { start, end })
    }
}

/// How a run turns "now" into the windows to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub lookback: Duration,
    pub chunk: Option<Duration>,
}

impl WindowPlan {
    pub fn windows(&self, now: DateTime<Utc>) -> Vec<TimeWindow> {
        let window = TimeWindow::lookback(now, self.lookback);
        match self.chunk {
            Some(step) => window.chunks(step).collect(),
            None => vec![window],
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
