//! Metrics Collector.
//!
//! Passive: components push [`MetricsEvent`]s, nothing here reads the skill
//! store. Counters are atomics; check latency keeps a bounded window of the
//! most recent samples for the rolling average.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LATENCY_WINDOW: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsEvent {
    Reused,
    Regenerated,
    RestoreSuggested,
    Archived,
    Restored,
    /// The external breaking-change check did not produce an answer
    CheckFailed,
    /// One staleness evaluation finished
    CheckLatency(Duration),
    /// A sweep lost a CAS race and left the record alone
    SweepSkipped,
}

#[derive(Debug)]
pub struct MetricsCollector {
    reused: AtomicU64,
    regenerated: AtomicU64,
    restore_suggested: AtomicU64,
    archived: AtomicU64,
    restored: AtomicU64,
    check_failures: AtomicU64,
    sweep_skipped: AtomicU64,
    checks: AtomicU64,
    latency_total_us: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
    window: usize,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl MetricsCollector {
    #[must_use]
    pub fn new(latency_window: usize) -> Self {
        let window = latency_window.max(1);
        Self {
            reused: AtomicU64::new(0),
            regenerated: AtomicU64::new(0),
            restore_suggested: AtomicU64::new(0),
            archived: AtomicU64::new(0),
            restored: AtomicU64::new(0),
            check_failures: AtomicU64::new(0),
            sweep_skipped: AtomicU64::new(0),
            checks: AtomicU64::new(0),
            latency_total_us: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    pub fn record(&self, event: MetricsEvent) {
        let counter = match event {
            MetricsEvent::Reused => &self.reused,
            MetricsEvent::Regenerated => &self.regenerated,
            MetricsEvent::RestoreSuggested => &self.restore_suggested,
            MetricsEvent::Archived => &self.archived,
            MetricsEvent::Restored => &self.restored,
            MetricsEvent::CheckFailed => &self.check_failures,
            MetricsEvent::SweepSkipped => &self.sweep_skipped,
            MetricsEvent::CheckLatency(latency) => {
                let mut window = self.latencies.lock();
                if window.len() == self.window {
                    window.pop_front();
                }
                window.push_back(latency);
                let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
                self.latency_total_us.fetch_add(micros, Ordering::Relaxed);
                &self.checks
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg_check_latency_ms, latency_samples) = {
            let window = self.latencies.lock();
            let samples = window.len();
            let avg = if samples == 0 {
                0.0
            } else {
                let total: Duration = window.iter().sum();
                total.as_secs_f64() * 1000.0 / samples as f64
            };
            (avg, samples)
        };

        MetricsSnapshot {
            reuse_count: self.reused.load(Ordering::Relaxed),
            regenerate_count: self.regenerated.load(Ordering::Relaxed),
            restore_then_reuse_count: self.restore_suggested.load(Ordering::Relaxed),
            archive_count: self.archived.load(Ordering::Relaxed),
            restore_count: self.restored.load(Ordering::Relaxed),
            check_failure_count: self.check_failures.load(Ordering::Relaxed),
            sweep_skipped_count: self.sweep_skipped.load(Ordering::Relaxed),
            staleness_checks: self.checks.load(Ordering::Relaxed),
            total_check_latency_us: self.latency_total_us.load(Ordering::Relaxed),
            avg_check_latency_ms,
            latency_samples,
        }
    }
}

/// Point-in-time view of the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub reuse_count: u64,
    pub regenerate_count: u64,
    pub restore_then_reuse_count: u64,
    pub archive_count: u64,
    pub restore_count: u64,
    pub check_failure_count: u64,
    pub sweep_skipped_count: u64,
    pub staleness_checks: u64,
    pub total_check_latency_us: u64,
    /// Rolling average over the latency window
    pub avg_check_latency_ms: f64,
    pub latency_samples: usize,
}

impl MetricsSnapshot {
    /// Counter values by persistent name; the rolling average is not
    /// additive and is left out.
    #[must_use]
    pub fn counters(&self) -> [(&'static str, u64); 9] {
        [
            ("reuse", self.reuse_count),
            ("regenerate", self.regenerate_count),
            ("restore_then_reuse", self.restore_then_reuse_count),
            ("archive", self.archive_count),
            ("restore", self.restore_count),
            ("check_failure", self.check_failure_count),
            ("sweep_skipped", self.sweep_skipped_count),
            ("staleness_checks", self.staleness_checks),
            ("check_latency_us", self.total_check_latency_us),
        ]
    }

    /// Rebuild a snapshot from persisted totals. The average is the lifetime
    /// mean rather than a rolling one.
    #[must_use]
    pub fn from_totals(totals: &std::collections::BTreeMap<String, u64>) -> Self {
        let get = |name: &str| totals.get(name).copied().unwrap_or(0);
        let checks = get("staleness_checks");
        let latency_us = get("check_latency_us");
        Self {
            reuse_count: get("reuse"),
            regenerate_count: get("regenerate"),
            restore_then_reuse_count: get("restore_then_reuse"),
            archive_count: get("archive"),
            restore_count: get("restore"),
            check_failure_count: get("check_failure"),
            sweep_skipped_count: get("sweep_skipped"),
            staleness_checks: checks,
            total_check_latency_us: latency_us,
            avg_check_latency_ms: if checks == 0 {
                0.0
            } else {
                latency_us as f64 / 1000.0 / checks as f64
            },
            latency_samples: usize::try_from(checks).unwrap_or(usize::MAX),
        }
    }
}
