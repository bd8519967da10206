//! Reuse Decision Engine.
//!
//! The only component callers talk to. `decide` fingerprints the request,
//! looks up the newest matching skill, asks the detector about it and writes
//! the outcome back through one guarded update. It never generates content
//! and never restores on its own.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::context::SkillContext;
use crate::core::{Clock, Skill, SkillId, SkillStatus};
use crate::error::{DsrError, Result};
use crate::metrics::{MetricsCollector, MetricsEvent};
use crate::staleness::{StalenessDetector, Verdict};
use crate::storage::{SkillStore, SkillUpdate};

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Use this skill as-is. The store already recorded the reuse.
    Reuse(Skill),
    /// Generate a new skill; link it to `prior` when there is one.
    Regenerate { prior: Option<Skill> },
    /// A matching skill exists but is archived; restore it, then reuse it.
    RestoreThenReuse(Skill),
}

impl Decision {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reuse(_) => "reuse",
            Self::Regenerate { .. } => "regenerate",
            Self::RestoreThenReuse(_) => "restore_then_reuse",
        }
    }

    /// The skill the decision is about, if any.
    #[must_use]
    pub const fn skill(&self) -> Option<&Skill> {
        match self {
            Self::Reuse(skill) | Self::RestoreThenReuse(skill) => Some(skill),
            Self::Regenerate { prior } => prior.as_ref(),
        }
    }
}

pub struct ReuseEngine {
    store: Arc<dyn SkillStore>,
    detector: StalenessDetector,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
}

impl std::fmt::Debug for ReuseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReuseEngine")
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

impl ReuseEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn SkillStore>,
        detector: StalenessDetector,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            detector,
            clock,
            metrics,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SkillStore> {
        &self.store
    }

    /// Decide between reuse, regeneration and restore for `context`.
    ///
    /// Without an exact fingerprint match the answer is always `Regenerate`.
    /// Its prior is the newest skill of the same domain built on the same
    /// tools, so a version bump continues that lineage while an unrelated
    /// context starts a new one.
    pub fn decide(&self, context: &SkillContext) -> Result<Decision> {
        let hash = context.fingerprint();
        let Some(candidate) = self.store.get_by_hash(context.domain(), &hash)? else {
            let tool_names: BTreeSet<String> = context.tool_versions().keys().cloned().collect();
            let prior = self.store.latest_with_tools(context.domain(), &tool_names)?;
            debug!(
                domain = context.domain(),
                hash = %hash.short(),
                has_prior = prior.is_some(),
                "no skill for context"
            );
            return Ok(self.finish(Decision::Regenerate { prior }));
        };

        if candidate.status == SkillStatus::Archived {
            return Ok(self.finish(Decision::RestoreThenReuse(candidate)));
        }

        let evaluation = self.detector.evaluate(&candidate, &hash);
        let now = self.clock.now();
        let update = match evaluation.verdict {
            Verdict::Stale => {
                return Ok(self.finish(Decision::Regenerate {
                    prior: Some(candidate),
                }));
            }
            Verdict::Fresh => {
                let update = SkillUpdate::reuse(candidate.status, now);
                match evaluation.verified_at {
                    Some(at) => update.verified(at),
                    None => update,
                }
            }
            Verdict::Unverifiable => {
                SkillUpdate::reuse(candidate.status, now).with_status(SkillStatus::Stale)
            }
        };

        self.commit_reuse(&candidate.id, &update)
    }

    /// Persist a freshly generated skill for `context`, continuing the
    /// lineage of `prior` when given.
    pub fn record(
        &self,
        context: &SkillContext,
        prior: Option<&SkillId>,
        size_bytes: u64,
    ) -> Result<Skill> {
        let prior = match prior {
            Some(id) => Some(
                self.store
                    .get_by_id(id)?
                    .ok_or_else(|| DsrError::NotFound(id.to_string()))?,
            ),
            None => None,
        };
        let skill = Skill::new_generation(context, prior.as_ref(), size_bytes, self.clock.now());
        self.store.put(&skill)?;
        info!(
            skill_id = %skill.id,
            domain = %skill.domain,
            generation = skill.generation_count,
            "recorded skill"
        );
        Ok(skill)
    }

    fn commit_reuse(&self, id: &SkillId, update: &SkillUpdate) -> Result<Decision> {
        let committed = self.store.guarded_update(id, update)?;
        let current = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| DsrError::NotFound(id.to_string()))?;

        if !committed {
            debug!(
                skill_id = %id,
                expected = %update.expected_status,
                actual = %current.status,
                "reuse lost a concurrent update"
            );
            if current.status == SkillStatus::Archived {
                return Ok(self.finish(Decision::RestoreThenReuse(current)));
            }
        }
        Ok(self.finish(Decision::Reuse(current)))
    }

    fn finish(&self, decision: Decision) -> Decision {
        self.metrics.record(match &decision {
            Decision::Reuse(_) => MetricsEvent::Reused,
            Decision::Regenerate { .. } => MetricsEvent::Regenerated,
            Decision::RestoreThenReuse(_) => MetricsEvent::RestoreSuggested,
        });
        match decision.skill() {
            Some(skill) => info!(
                decision = decision.kind(),
                skill_id = %skill.id,
                domain = %skill.domain,
                status = %skill.status,
                generation = skill.generation_count,
                "decision"
            ),
            None => info!(decision = decision.kind(), "decision"),
        }
        decision
    }
}
