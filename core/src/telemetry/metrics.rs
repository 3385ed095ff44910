use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counters shared by the scheduler thread and the pipeline owner.
pub struct MetricsRecorder {
    inner: Mutex<PipelineStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub published: u64,
    pub publish_errors: u64,
    pub samples_applied: u64,
    pub source_dropouts: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipelineStats::default()),
        }
    }

    pub fn record_tick(&self, skipped: u64) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.ticks += 1;
            stats.skipped_ticks += skipped;
        }
    }

    /// Counts timer boundaries dropped without running a tick.
    pub fn record_skipped(&self, boundaries: u64) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.skipped_ticks += boundaries;
        }
    }

    pub fn record_published(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.published += 1;
        }
    }

    pub fn record_publish_error(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.publish_errors += 1;
        }
    }

    pub fn record_samples(&self, applied: usize) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.samples_applied += applied as u64;
        }
    }

    pub fn record_source_dropout(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.source_dropouts += 1;
        }
    }

    pub fn snapshot(&self) -> PipelineStats {
        if let Ok(stats) = self.inner.lock() {
            *stats
        } else {
            PipelineStats::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
