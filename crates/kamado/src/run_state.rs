//! Shared per-run accumulators.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use crate::sample::SampleResult;

/// What accuracy scoring sees for one sample index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccuracyRecord {
    /// The formatted result produced for the sample
    Completed(SampleResult),

    /// Prediction failed; the driver received an empty payload for this sample
    Failed,
}

impl AccuracyRecord {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Accumulators shared by every executor of a run.
///
/// Workers append concurrently; the summary reads snapshots after the run.
/// Accuracy records are only kept while accuracy mode is active, keyed by
/// sample index.
#[derive(Debug, Default)]
pub struct RunState {
    accuracy: AtomicBool,
    timings: Mutex<Vec<Duration>>,
    accuracy_records: Mutex<BTreeMap<usize, AccuracyRecord>>,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything and set the accuracy mode for the next run.
    pub fn reset(&self, accuracy: bool) {
        self.timings.lock().clear();
        self.accuracy_records.lock().clear();
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.accuracy.store(accuracy, Ordering::SeqCst);
    }

    pub fn accuracy_enabled(&self) -> bool {
        self.accuracy.load(Ordering::SeqCst)
    }

    pub fn record_timing(&self, elapsed: Duration) {
        self.timings.lock().push(elapsed);
    }

    /// Store formatted results for `indices`. Ignored outside accuracy mode.
    pub fn record_accuracy(&self, indices: &[usize], results: &[SampleResult]) {
        if !self.accuracy_enabled() {
            return;
        }
        let mut records = self.accuracy_records.lock();
        for (index, result) in indices.iter().zip(results) {
            records.insert(*index, AccuracyRecord::Completed(result.clone()));
        }
    }

    /// Count `indices` as failed and, in accuracy mode, mark them so scoring
    /// can tell a failure apart from a genuinely empty result.
    pub fn record_failures(&self, indices: &[usize]) {
        self.failed.fetch_add(indices.len() as u64, Ordering::SeqCst);
        if !self.accuracy_enabled() {
            return;
        }
        let mut records = self.accuracy_records.lock();
        for index in indices {
            records.insert(*index, AccuracyRecord::Failed);
        }
    }

    pub fn record_completions(&self, count: usize) {
        self.completed.fetch_add(count as u64, Ordering::SeqCst);
    }

    /// Snapshot of every recorded item latency, in recording order.
    pub fn timings(&self) -> Vec<Duration> {
        self.timings.lock().clone()
    }

    /// Snapshot of the accuracy records.
    pub fn accuracy_records(&self) -> BTreeMap<usize, AccuracyRecord> {
        self.accuracy_records.lock().clone()
    }

    /// Samples signaled to the completion sink, failed ones included.
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}
