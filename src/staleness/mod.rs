//! Staleness Detector.
//!
//! Evaluation order, first match wins:
//!
//! 1. Fingerprint mismatch is `Stale`.
//! 2. Revalidation window elapsed: ask the breaking-change checker, bounded by
//!    a timeout. A breaking change is `Stale`; a clean answer is `Fresh` and
//!    advances `last_verified_at`; no answer is `Unverifiable`.
//! 3. Otherwise `Fresh`.
//!
//! The detector never touches the store. The caller writes back the outcome
//! with a guarded update.

pub mod checker;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::ContextHash;
use crate::core::{Clock, Skill};
use crate::error::DsrError;
use crate::metrics::{MetricsCollector, MetricsEvent};

pub use checker::{BreakingChangeChecker, CheckReport, HttpChecker, NoopChecker};

pub const DEFAULT_REVALIDATION_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Fresh,
    Stale,
    Unverifiable,
}

/// Why a verdict was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Finding {
    HashMismatch,
    WithinWindow,
    CheckedClean,
    BreakingChange { details: Option<String> },
    CheckUnavailable { error: String },
}

/// Outcome of [`StalenessDetector::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub finding: Finding,
    /// Set only when an external check succeeded; the new `last_verified_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    const fn new(verdict: Verdict, finding: Finding) -> Self {
        Self {
            verdict,
            finding,
            verified_at: None,
        }
    }
}

pub struct StalenessDetector {
    checker: Arc<dyn BreakingChangeChecker>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    revalidation_window: chrono::Duration,
    check_timeout: Duration,
}

impl std::fmt::Debug for StalenessDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessDetector")
            .field("checker", &self.checker.name())
            .field("revalidation_window", &self.revalidation_window)
            .field("check_timeout", &self.check_timeout)
            .finish_non_exhaustive()
    }
}

impl StalenessDetector {
    #[must_use]
    pub fn new(
        checker: Arc<dyn BreakingChangeChecker>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            checker,
            clock,
            metrics,
            revalidation_window: chrono::Duration::days(i64::from(
                DEFAULT_REVALIDATION_WINDOW_DAYS,
            )),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_revalidation_window(mut self, window: chrono::Duration) -> Self {
        self.revalidation_window = window;
        self
    }

    #[must_use]
    pub const fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn revalidation_window(&self) -> chrono::Duration {
        self.revalidation_window
    }

    /// Decide whether `skill` may be reused for `fresh_hash`.
    pub fn evaluate(&self, skill: &Skill, fresh_hash: &ContextHash) -> Evaluation {
        let started = Instant::now();
        let evaluation = self.evaluate_inner(skill, fresh_hash);
        self.metrics
            .record(MetricsEvent::CheckLatency(started.elapsed()));
        debug!(
            skill_id = %skill.id,
            verdict = ?evaluation.verdict,
            finding = ?evaluation.finding,
            "staleness evaluated"
        );
        evaluation
    }

    fn evaluate_inner(&self, skill: &Skill, fresh_hash: &ContextHash) -> Evaluation {
        if skill.context_hash != *fresh_hash {
            return Evaluation::new(Verdict::Stale, Finding::HashMismatch);
        }

        let now = self.clock.now();
        if now - skill.verified_since() < self.revalidation_window {
            return Evaluation::new(Verdict::Fresh, Finding::WithinWindow);
        }

        match self.run_check(skill) {
            Ok(report) if report.breaking => Evaluation::new(
                Verdict::Stale,
                Finding::BreakingChange {
                    details: report.details,
                },
            ),
            Ok(_) => Evaluation {
                verdict: Verdict::Fresh,
                finding: Finding::CheckedClean,
                verified_at: Some(self.clock.now()),
            },
            Err(err) => {
                self.metrics.record(MetricsEvent::CheckFailed);
                warn!(
                    skill_id = %skill.id,
                    checker = self.checker.name(),
                    error = %err,
                    "breaking-change check unavailable; skill is unverifiable"
                );
                Evaluation::new(
                    Verdict::Unverifiable,
                    Finding::CheckUnavailable {
                        error: err.to_string(),
                    },
                )
            }
        }
    }

    /// Run the checker on a helper thread and wait at most `check_timeout`.
    ///
    /// On timeout the helper is abandoned; its late answer is dropped.
    fn run_check(&self, skill: &Skill) -> crate::Result<CheckReport> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let checker = Arc::clone(&self.checker);
        let snapshot = skill.clone();

        thread::Builder::new()
            .name("dsr-breaking-check".to_string())
            .spawn(move || {
                let _ = tx.send(checker.check(&snapshot));
            })?;

        match rx.recv_timeout(self.check_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DsrError::Timeout(format!(
                "breaking-change check exceeded {}ms",
                self.check_timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(DsrError::CheckFailed(
                "checker thread exited without an answer".to_string(),
            )),
        }
    }
}
