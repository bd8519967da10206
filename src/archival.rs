//! Archival Manager.
//!
//! The sweep demotes live skills idle for at least the inactivity threshold.
//! Each archival is guarded on the status and revision seen in the sweep's
//! snapshot, so any reuse that lands in between wins and the sweep skips the
//! record until the next cycle. Restore is the only way back to `Active`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::core::{Clock, Skill, SkillId, SkillStatus};
use crate::error::{DsrError, Result};
use crate::metrics::{MetricsCollector, MetricsEvent};
use crate::storage::{SkillFilter, SkillStore, SkillUpdate};

pub const DEFAULT_INACTIVITY_THRESHOLD_DAYS: u32 = 180;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Live skills looked at
    pub examined: u64,
    pub archived: u64,
    /// Eligible skills whose guard lost to a concurrent mutation
    pub skipped_due_to_race: u64,
}

pub struct ArchivalManager {
    store: Arc<dyn SkillStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    inactivity_threshold: chrono::Duration,
}

impl std::fmt::Debug for ArchivalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivalManager")
            .field("inactivity_threshold", &self.inactivity_threshold)
            .finish_non_exhaustive()
    }
}

impl ArchivalManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SkillStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            clock,
            metrics,
            inactivity_threshold: chrono::Duration::days(i64::from(
                DEFAULT_INACTIVITY_THRESHOLD_DAYS,
            )),
        }
    }

    #[must_use]
    pub const fn with_inactivity_threshold(mut self, threshold: chrono::Duration) -> Self {
        self.inactivity_threshold = threshold;
        self
    }

    /// Whether `skill` is eligible for archival at the current time.
    #[must_use]
    pub fn is_eligible(&self, skill: &Skill) -> bool {
        skill.status.is_live() && self.clock.now() - skill.last_activity() >= self.inactivity_threshold
    }

    /// One archival pass over all live skills.
    pub fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = self.clock.now();

        for status in [SkillStatus::Active, SkillStatus::Stale] {
            for skill in self.store.list(&SkillFilter::with_status(status))? {
                report.examined += 1;
                if now - skill.last_activity() < self.inactivity_threshold {
                    continue;
                }

                let update = SkillUpdate::transition(skill.status, SkillStatus::Archived, now)
                    .at_revision(skill.revision);
                if self.store.guarded_update(&skill.id, &update)? {
                    report.archived += 1;
                    self.metrics.record(MetricsEvent::Archived);
                    debug!(skill_id = %skill.id, domain = %skill.domain, "archived idle skill");
                } else {
                    report.skipped_due_to_race += 1;
                    self.metrics.record(MetricsEvent::SweepSkipped);
                    debug!(skill_id = %skill.id, "skill changed during sweep; skipped");
                }
            }
        }

        info!(
            examined = report.examined,
            archived = report.archived,
            skipped = report.skipped_due_to_race,
            "archival sweep complete"
        );
        Ok(report)
    }

    /// Bring an archived skill back to `Active`.
    pub fn restore(&self, id: &SkillId) -> Result<Skill> {
        let skill = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| DsrError::NotFound(id.to_string()))?;
        if skill.status != SkillStatus::Archived {
            return Err(invalid_state(id, skill.status));
        }

        let now = self.clock.now();
        if !self
            .store
            .compare_and_set_status(id, SkillStatus::Archived, SkillStatus::Active, now)?
        {
            let actual = self
                .store
                .get_by_id(id)?
                .map_or(SkillStatus::Archived, |current| current.status);
            return Err(invalid_state(id, actual));
        }

        self.metrics.record(MetricsEvent::Restored);
        info!(skill_id = %id, "restored skill");
        self.store
            .get_by_id(id)?
            .ok_or_else(|| DsrError::NotFound(id.to_string()))
    }

    /// Run [`sweep`](Self::sweep) every `interval` on a background thread.
    ///
    /// Errors are logged and the thread keeps going. Dropping the handle
    /// stops the thread.
    pub fn spawn(self: Arc<Self>, interval: Duration, sweep_on_start: bool) -> Result<SweeperHandle> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("dsr-archival-sweeper".to_string())
            .spawn(move || {
                if sweep_on_start {
                    self.sweep_logged();
                }
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => self.sweep_logged(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("archival sweeper stopped");
            })?;

        Ok(SweeperHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn sweep_logged(&self) {
        if let Err(err) = self.sweep() {
            error!(error = %err, "archival sweep failed");
        }
    }
}

fn invalid_state(id: &SkillId, actual: SkillStatus) -> DsrError {
    DsrError::InvalidState {
        skill_id: id.to_string(),
        expected: SkillStatus::Archived,
        actual,
    }
}

/// Owner of the background sweeper thread.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it. An in-flight sweep finishes first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("archival sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
