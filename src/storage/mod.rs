//! Storage layer for dsr
//!
//! [`SkillStore`] is the logical contract: insert-only records, lookups by id
//! and by `(domain, hash)`, and a single guarded mutation primitive. Two
//! backends implement it: [`MemoryStore`] (arena with per-record locks) and
//! [`Database`] (SQLite, one conditional `UPDATE` per transition).
//!
//! Nothing here deletes a skill. Archival is a status change.

pub mod events;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::ContextHash;
use crate::core::{Skill, SkillId, SkillStatus};
use crate::error::{DsrError, Result};

pub use events::{SkillEvent, SkillEventKind};
pub use memory::MemoryStore;
pub use sqlite::Database;

/// Selection for [`SkillStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillFilter {
    pub status: Option<SkillStatus>,
    pub domain: Option<String>,
}

impl SkillFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(status: SkillStatus) -> Self {
        Self {
            status: Some(status),
            domain: None,
        }
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(crate::context::normalize_domain(domain));
        self
    }

    #[must_use]
    pub fn matches(&self, skill: &Skill) -> bool {
        self.status.is_none_or(|status| skill.status == status)
            && self.domain.as_deref().is_none_or(|domain| skill.domain == domain)
    }
}

/// A conditional mutation of one skill record.
///
/// The update commits only if the stored status equals `expected_status`
/// (and, when set, the stored revision equals `expected_revision`). Every
/// commit bumps the revision and appends one audit event, atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillUpdate {
    pub expected_status: SkillStatus,
    pub expected_revision: Option<u64>,
    pub new_status: Option<SkillStatus>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub bump_generation: bool,
    pub event: SkillEventKind,
    pub at: DateTime<Utc>,
}

impl SkillUpdate {
    /// A lifecycle transition, with the stamps that transition implies:
    /// archival records `archived_at`, restore refreshes `last_used_at`.
    #[must_use]
    pub fn transition(expected: SkillStatus, new: SkillStatus, at: DateTime<Utc>) -> Self {
        Self {
            expected_status: expected,
            expected_revision: None,
            new_status: Some(new),
            last_used_at: (expected == SkillStatus::Archived && new == SkillStatus::Active)
                .then_some(at),
            last_verified_at: None,
            archived_at: (new == SkillStatus::Archived).then_some(at),
            bump_generation: false,
            event: SkillEventKind::for_transition(expected, new),
            at,
        }
    }

    /// A reuse: generation +1, `last_used_at = at`, and a stale skill
    /// becomes active again.
    #[must_use]
    pub fn reuse(expected: SkillStatus, at: DateTime<Utc>) -> Self {
        Self {
            expected_status: expected,
            expected_revision: None,
            new_status: (expected == SkillStatus::Stale).then_some(SkillStatus::Active),
            last_used_at: Some(at),
            last_verified_at: None,
            archived_at: None,
            bump_generation: true,
            event: SkillEventKind::Reused,
            at,
        }
    }

    /// Override the resulting status.
    #[must_use]
    pub fn with_status(mut self, status: SkillStatus) -> Self {
        self.new_status = (status != self.expected_status).then_some(status);
        self
    }

    /// Also advance `last_verified_at`.
    #[must_use]
    pub fn verified(mut self, at: DateTime<Utc>) -> Self {
        self.last_verified_at = Some(at);
        self
    }

    /// Additionally require the stored revision to match.
    #[must_use]
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    /// Status the record has after this update commits.
    #[must_use]
    pub fn resulting_status(&self) -> SkillStatus {
        self.new_status.unwrap_or(self.expected_status)
    }

    /// Apply to an in-memory record whose guards already matched.
    pub(crate) fn apply_to(&self, skill: &mut Skill) {
        if let Some(status) = self.new_status {
            skill.status = status;
        }
        if let Some(at) = self.last_used_at {
            skill.last_used_at = Some(at);
        }
        if let Some(at) = self.last_verified_at {
            skill.last_verified_at = Some(at);
        }
        if let Some(at) = self.archived_at {
            skill.archived_at = Some(at);
        }
        if self.bump_generation {
            skill.generation_count += 1;
        }
        skill.revision += 1;
    }

    pub(crate) fn guards_match(&self, skill: &Skill) -> bool {
        skill.status == self.expected_status
            && self.expected_revision.is_none_or(|revision| skill.revision == revision)
    }
}

/// Aggregate counts for the administrative surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_domain: BTreeMap<String, u64>,
    pub total_size_bytes: u64,
    /// Live skills whose revalidation window has elapsed
    pub due_for_revalidation: u64,
}

/// Logical skill persistence contract.
pub trait SkillStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id exists and with
    /// `InvalidLineage` if `previous_version_id` is not a valid ancestor.
    fn put(&self, skill: &Skill) -> Result<()>;

    fn get_by_id(&self, id: &SkillId) -> Result<Option<Skill>>;

    /// Most recently created skill for `(domain, hash)`.
    fn get_by_hash(&self, domain: &str, hash: &ContextHash) -> Result<Option<Skill>>;

    /// Skills matching `filter`, oldest first (ties in insertion order).
    fn list(&self, filter: &SkillFilter) -> Result<Vec<Skill>>;

    /// Apply `update` if its guards match. `Ok(false)` means the guard lost
    /// and nothing changed; an unknown id is `NotFound`.
    fn guarded_update(&self, id: &SkillId, update: &SkillUpdate) -> Result<bool>;

    /// Audit events for one skill, oldest first.
    fn events(&self, id: &SkillId) -> Result<Vec<SkillEvent>>;

    /// Atomic status transition; `false` when the stored status is not
    /// `expected`.
    fn compare_and_set_status(
        &self,
        id: &SkillId,
        expected: SkillStatus,
        new: SkillStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.guarded_update(id, &SkillUpdate::transition(expected, new, at))
    }

    /// Most recently created skill in `domain` whose dependencies are exactly
    /// `tool_names`. Versions and gaps may differ.
    fn latest_with_tools(
        &self,
        domain: &str,
        tool_names: &BTreeSet<String>,
    ) -> Result<Option<Skill>> {
        let mut skills = self.list(&SkillFilter::all().domain(domain))?;
        skills.retain(|skill| skill.has_tool_names(tool_names));
        Ok(skills.pop())
    }

    /// Walk the `previous_version_id` chain, newest first.
    fn history(&self, id: &SkillId) -> Result<Vec<Skill>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id.clone());

        while let Some(current) = next {
            if !seen.insert(current.clone()) {
                return Err(DsrError::InvalidLineage {
                    skill_id: id.to_string(),
                    reason: format!("history revisits {current}"),
                });
            }
            let skill = self
                .get_by_id(&current)?
                .ok_or_else(|| DsrError::NotFound(current.to_string()))?;
            next = skill.previous_version_id.clone();
            chain.push(skill);
        }

        Ok(chain)
    }

    /// Counts by status and domain; `revalidation_cutoff` marks skills last
    /// verified at or before it as due.
    fn stats(&self, revalidation_cutoff: DateTime<Utc>) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for status in SkillStatus::ALL {
            stats.by_status.insert(status.to_string(), 0);
        }
        for skill in self.list(&SkillFilter::all())? {
            stats.total += 1;
            *stats.by_status.entry(skill.status.to_string()).or_default() += 1;
            *stats.by_domain.entry(skill.domain.clone()).or_default() += 1;
            stats.total_size_bytes += skill.size_bytes;
            if skill.status.is_live() && skill.verified_since() <= revalidation_cutoff {
                stats.due_for_revalidation += 1;
            }
        }
        Ok(stats)
    }
}

/// Validate `previous_version_id` against the stored ancestor.
pub(crate) fn check_lineage(skill: &Skill, ancestor: Option<&Skill>) -> Result<()> {
    match (&skill.previous_version_id, ancestor) {
        (None, _) => Ok(()),
        (Some(prior), None) => Err(DsrError::InvalidLineage {
            skill_id: skill.id.to_string(),
            reason: format!("ancestor {prior} does not exist"),
        }),
        (Some(_), Some(ancestor)) => skill.validate_ancestor(ancestor),
    }
}
