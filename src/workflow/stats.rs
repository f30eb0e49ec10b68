// SPDX-License-Identifier: MIT

//! Per-workflow execution counters
//!
//! Counters live behind a shared handle: every clone of a `Workflow` sees the
//! same numbers, so readers polling the registry observe a run while it is
//! in flight. Each update changes its counters under a single lock.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::{Arc, Mutex, MutexGuard};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub triggered: u64,
    pub completed: u64,
    pub failed: u64,
    pub active: u64,
}

/// Shared, thread-safe workflow counters
#[derive(Debug, Clone, Default)]
pub struct WorkflowStats {
    inner: Arc<Mutex<StatsSnapshot>>,
}

impl WorkflowStats {
    pub fn from_snapshot(snapshot: StatsSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.lock()
    }

    pub fn triggered(&self) -> u64 {
        self.lock().triggered
    }

    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    pub fn failed(&self) -> u64 {
        self.lock().failed
    }

    pub fn active(&self) -> u64 {
        self.lock().active
    }

    /// Count a run as in flight until the returned guard settles it
    pub(crate) fn run_started(&self) -> ActiveRun {
        self.lock().active += 1;
        ActiveRun {
            stats: self.clone(),
            settled: false,
        }
    }

    /// A run refused before it started (no trigger, reentry, cycle)
    pub(crate) fn run_rejected(&self) {
        let mut s = self.lock();
        s.triggered += 1;
        s.failed += 1;
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        // Counters stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An in-flight run's hold on the `active` gauge
///
/// Dropping the guard without settling it (the run's future was dropped)
/// releases the gauge without touching the outcome counters.
#[must_use]
pub(crate) struct ActiveRun {
    stats: WorkflowStats,
    settled: bool,
}

impl ActiveRun {
    pub(crate) fn completed(mut self) {
        self.settle(|s| s.completed += 1);
    }

    pub(crate) fn failed(mut self) {
        self.settle(|s| s.failed += 1);
    }

    pub(crate) fn cancelled(mut self) {
        self.settle(|_| {});
    }

    fn settle(&mut self, outcome: impl FnOnce(&mut StatsSnapshot)) {
        let mut s = self.stats.lock();
        s.triggered += 1;
        outcome(&mut *s);
        s.active = s.active.saturating_sub(1);
        self.settled = true;
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if !self.settled {
            log::debug!("Run abandoned before finishing");
            let mut s = self.stats.lock();
            s.active = s.active.saturating_sub(1);
        }
    }
}

impl Serialize for WorkflowStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowStats {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StatsSnapshot::deserialize(deserializer).map(Self::from_snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let stats = WorkflowStats::default();
        let clone = stats.clone();

        let run = clone.run_started();
        assert_eq!(stats.active(), 1);

        run.completed();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                triggered: 1,
                completed: 1,
                failed: 0,
                active: 0,
            }
        );
    }

    #[test]
    fn test_from_snapshot_does_not_share() {
        let stats = WorkflowStats::default();
        stats.run_rejected();

        let copy = WorkflowStats::from_snapshot(stats.snapshot());
        copy.run_rejected();

        assert_eq!(stats.failed(), 1);
        assert_eq!(copy.failed(), 2);
    }

    #[test]
    fn test_failed_and_cancelled_runs() {
        let stats = WorkflowStats::default();
        stats.run_started().failed();
        stats.run_started().cancelled();

        let snap = stats.snapshot();
        assert_eq!(snap.triggered, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.active, 0);
    }

    #[test]
    fn test_rejected_run_counts_as_triggered() {
        let stats = WorkflowStats::default();
        stats.run_rejected();

        let snap = stats.snapshot();
        assert_eq!(snap.triggered, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.active, 0);
        assert!(snap.completed + snap.failed <= snap.triggered);
    }

    #[test]
    fn test_dropped_run_releases_active() {
        let stats = WorkflowStats::default();
        let first = stats.run_started();
        let second = stats.run_started();
        assert_eq!(stats.active(), 2);

        drop(first);
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.triggered(), 0);

        second.completed();
        assert_eq!(stats.active(), 0);
        assert_eq!(stats.completed(), 1);
    }

    #[test]
    fn test_serde_roundtrip_through_snapshot() {
        let stats = WorkflowStats::default();
        stats.run_started().completed();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["completed"], 1);

        let back: WorkflowStats = serde_json::from_value(json).unwrap();
        assert_eq!(back.snapshot(), stats.snapshot());
    }
}
