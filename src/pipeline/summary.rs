//! Per-track outcomes and per-batch / per-run counts.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::enrichment::Stage;

/// What happened to one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Written to the combined store and its partition
    Persisted,
    /// Already in the store (or claimed by another worker in this batch)
    AlreadyProcessed,
    /// No strategy could find a media source
    Unresolved,
    /// The run was cancelled before the track finished
    Cancelled,
    /// A stage failed; the track was dropped
    Failed { stage: Stage, error: String },
}

impl TrackOutcome {
    pub fn failed(stage: Stage, error: impl ToString) -> Self {
        Self::Failed {
            stage,
            error: error.to_string(),
        }
    }
}

impl std::fmt::Display for TrackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackOutcome::Persisted => f.write_str("persisted"),
            TrackOutcome::AlreadyProcessed => f.write_str("already processed"),
            TrackOutcome::Unresolved => f.write_str("no media source"),
            TrackOutcome::Cancelled => f.write_str("cancelled"),
            TrackOutcome::Failed { stage, error } => write!(f, "{} failed: {}", stage, error),
        }
    }
}

/// Counts for one query's track batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &TrackOutcome) {
        match outcome {
            TrackOutcome::Persisted => self.succeeded += 1,
            TrackOutcome::AlreadyProcessed
            | TrackOutcome::Unresolved
            | TrackOutcome::Cancelled => self.skipped += 1,
            TrackOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    fn add(&mut self, other: &BatchSummary) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl<'a> FromIterator<&'a TrackOutcome> for BatchSummary {
    fn from_iter<I: IntoIterator<Item = &'a TrackOutcome>>(iter: I) -> Self {
        let mut summary = BatchSummary::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    /// Queries sent to the resolver
    pub queries: usize,
    /// Queries that resolved to no tracks
    pub unresolved_queries: usize,
    /// Tracks submitted to workers
    pub tracks: usize,
    /// Track outcomes summed over every batch
    pub totals: BatchSummary,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            queries: 0,
            unresolved_queries: 0,
            tracks: 0,
            totals: BatchSummary::default(),
            elapsed: Duration::ZERO,
            cancelled: false,
        }
    }
}

impl RunSummary {
    pub fn add_batch(&mut self, batch: &BatchSummary) {
        self.tracks += batch.total();
        self.totals.add(batch);
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run started {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "  Queries:  {} ({} without tracks)",
            self.queries, self.unresolved_queries
        )?;
        writeln!(f, "  Tracks:   {}", self.tracks)?;
        writeln!(f, "  ✓ Succeeded: {}", self.totals.succeeded)?;
        writeln!(f, "  - Skipped:   {}", self.totals.skipped)?;
        writeln!(f, "  ✗ Failed:    {}", self.totals.failed)?;
        write!(f, "  Elapsed:  {:.1}s", self.elapsed.as_secs_f64())?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
