//! Conversion metrics.
//!
//! Tracks conversion counts, tint outcomes and durations. Counters are
//! atomics; duration samples sit behind a mutex.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::TintOutcome;

/// Maximum number of duration samples kept in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Conversion metrics collector, shared by all conversion tasks.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    conversions_started: AtomicU64,
    conversions_succeeded: AtomicU64,
    conversions_failed: AtomicU64,
    conversions_timed_out: AtomicU64,
    conversions_cancelled: AtomicU64,
    repackaged: AtomicU64,
    tints_applied: AtomicU64,
    tints_skipped: AtomicU64,
    tints_failed: AtomicU64,
    total_output_bytes: AtomicU64,
    duration_samples: Mutex<VecDeque<Duration>>,
}

impl ConversionMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conversion start.
    pub fn record_started(&self) {
        self.conversions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful conversion.
    pub fn record_success(&self, duration: Duration, output_bytes: u64, repackaged: bool) {
        self.conversions_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_output_bytes
            .fetch_add(output_bytes, Ordering::Relaxed);
        if repackaged {
            self.repackaged.fetch_add(1, Ordering::Relaxed);
        }
        self.add_duration_sample(duration);
    }

    /// Record a failed conversion.
    pub fn record_failure(&self) {
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a timed-out conversion. Also counts as a failure.
    pub fn record_timeout(&self) {
        self.conversions_timed_out.fetch_add(1, Ordering::Relaxed);
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled conversion.
    pub fn record_cancelled(&self) {
        self.conversions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the result of the tint step.
    pub fn record_tint(&self, outcome: &TintOutcome) {
        let counter = match outcome {
            TintOutcome::NotRequested => return,
            TintOutcome::Applied => &self.tints_applied,
            TintOutcome::SkippedUnreadable { .. } => &self.tints_skipped,
            TintOutcome::Failed { .. } => &self.tints_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration);
        }
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut durations: Vec<Duration> = self
            .duration_samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        durations.sort();

        let percentile = |p: usize| -> Option<u64> {
            if durations.is_empty() {
                return None;
            }
            let idx = (durations.len() * p / 100).min(durations.len() - 1);
            Some(durations[idx].as_millis() as u64)
        };

        MetricsSnapshot {
            conversions_started: self.conversions_started.load(Ordering::Relaxed),
            conversions_succeeded: self.conversions_succeeded.load(Ordering::Relaxed),
            conversions_failed: self.conversions_failed.load(Ordering::Relaxed),
            conversions_timed_out: self.conversions_timed_out.load(Ordering::Relaxed),
            conversions_cancelled: self.conversions_cancelled.load(Ordering::Relaxed),
            repackaged: self.repackaged.load(Ordering::Relaxed),
            tints_applied: self.tints_applied.load(Ordering::Relaxed),
            tints_skipped: self.tints_skipped.load(Ordering::Relaxed),
            tints_failed: self.tints_failed.load(Ordering::Relaxed),
            total_output_bytes: self.total_output_bytes.load(Ordering::Relaxed),
            duration_p50_ms: percentile(50),
            duration_p95_ms: percentile(95),
            duration_p99_ms: percentile(99),
            sample_count: durations.len() as u64,
        }
    }
}

/// A point-in-time snapshot of conversion metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Conversions started.
    pub conversions_started: u64,
    /// Conversions that produced a GLB.
    pub conversions_succeeded: u64,
    /// Conversions that failed (including timeouts).
    pub conversions_failed: u64,
    /// Conversions killed by the timeout.
    pub conversions_timed_out: u64,
    /// Conversions cancelled by the caller.
    pub conversions_cancelled: u64,
    /// Successful conversions that went through GLTF + BIN repackaging.
    pub repackaged: u64,
    /// Tints applied.
    pub tints_applied: u64,
    /// Tints skipped because the GLB was unreadable.
    pub tints_skipped: u64,
    /// Tints that failed for other reasons.
    pub tints_failed: u64,
    /// Bytes of GLB produced.
    pub total_output_bytes: u64,
    /// P50 duration in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// P95 duration in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// P99 duration in milliseconds.
    pub duration_p99_ms: Option<u64>,
    /// Number of duration samples.
    pub sample_count: u64,
}
