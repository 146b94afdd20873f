//! Usage statistics as an explicit, side-effecting collaborator.
//!
//! The engine core never touches counters. [`crate::CandidateEngine`] hands a
//! [`UsageEvent`] to its [`UsageRecorder`] only after a logical request has
//! completed successfully.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which engine operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Single,
    Batch,
    Search,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestKind::Single => "single",
            RequestKind::Batch => "batch",
            RequestKind::Search => "search",
        };
        write!(f, "{s}")
    }
}

/// One successful logical request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub kind: RequestKind,
    /// Candidates delivered to the caller.
    pub accepted: usize,
    /// Generator attempts (single) or generator calls (batch); 0 for search.
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn new(kind: RequestKind, accepted: usize, attempts: u32) -> Self {
        Self {
            kind,
            accepted,
            attempts,
            at: Utc::now(),
        }
    }
}

/// Sink for successful-request statistics.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, event: &UsageEvent);
}

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsage;

impl UsageRecorder for NoopUsage {
    fn record(&self, _event: &UsageEvent) {}
}

/// Point-in-time copy of [`UsageCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub singles: u64,
    pub batches: u64,
    pub searches: u64,
    pub candidates_delivered: u64,
}

/// Lock-free per-instance counters.
#[derive(Debug, Default)]
pub struct UsageCounters {
    singles: AtomicU64,
    batches: AtomicU64,
    searches: AtomicU64,
    candidates_delivered: AtomicU64,
}

impl UsageCounters {
    pub const fn new() -> Self {
        Self {
            singles: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            searches: AtomicU64::new(0),
            candidates_delivered: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            singles: self.singles.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            candidates_delivered: self.candidates_delivered.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a CLI command, shutdown)
    /// rather than on every request.
    pub fn flush(&self) {
        let snap = self.snapshot();
        tracing::info!(
            metric = "usage.flush",
            singles = snap.singles,
            batches = snap.batches,
            searches = snap.searches,
            candidates_delivered = snap.candidates_delivered,
        );
    }

    pub fn reset(&self) {
        self.singles.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.searches.store(0, Ordering::Relaxed);
        self.candidates_delivered.store(0, Ordering::Relaxed);
    }
}

impl UsageRecorder for UsageCounters {
    fn record(&self, event: &UsageEvent) {
        let counter = match event.kind {
            RequestKind::Single => &self.singles,
            RequestKind::Batch => &self.batches,
            RequestKind::Search => &self.searches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.candidates_delivered
            .fetch_add(event.accepted as u64, Ordering::Relaxed);
        tracing::trace!(metric = "usage", kind = %event.kind, "counter incremented");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_kind_and_delivered() {
        let counters = UsageCounters::new();
        counters.record(&UsageEvent::new(RequestKind::Single, 1, 2));
        counters.record(&UsageEvent::new(RequestKind::Batch, 6, 1));
        counters.record(&UsageEvent::new(RequestKind::Search, 4, 0));
        counters.record(&UsageEvent::new(RequestKind::Search, 2, 0));

        let snap = counters.snapshot();
        assert_eq!(snap.singles, 1);
        assert_eq!(snap.batches, 1);
        assert_eq!(snap.searches, 2);
        assert_eq!(snap.candidates_delivered, 13);
    }

    #[test]
    fn test_reset_zeroes_all() {
        let counters = UsageCounters::new();
        counters.record(&UsageEvent::new(RequestKind::Single, 1, 1));
        counters.reset();
        assert_eq!(counters.snapshot(), UsageSnapshot::default());
    }

    #[test]
    fn test_request_kind_display_matches_serde() {
        assert_eq!(RequestKind::Batch.to_string(), "batch");
        assert_eq!(
            serde_json::to_string(&RequestKind::Search).unwrap(),
            "\"search\""
        );
    }
}
