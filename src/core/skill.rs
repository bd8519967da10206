//! Skill record and lifecycle status.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{ContextHash, SkillContext};
use crate::error::{DsrError, Result};

/// Opaque, immutable skill identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(String);

impl SkillId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkillId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SkillId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status.
///
/// `Active ⇄ Stale → Archived → Active`, where the last edge is an explicit
/// restore and never happens automatically.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Active,
    Stale,
    Archived,
}

impl SkillStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Stale, Self::Archived];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Archived => "archived",
        }
    }

    /// Whether the sweep may consider this status for archival.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Stale)
    }
}

impl fmt::Display for SkillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillStatus {
    type Err = DsrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "stale" => Ok(Self::Stale),
            "archived" => Ok(Self::Archived),
            other => Err(DsrError::Serialization(format!(
                "unknown skill status {other:?} (expected active|stale|archived)"
            ))),
        }
    }
}

/// A versioned, cacheable artifact tied to an environment fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    /// Normalized (trimmed, lower-cased) knowledge domain
    pub domain: String,
    pub context_hash: ContextHash,
    pub status: SkillStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Incremented on every reuse and carried forward on regeneration
    pub generation_count: u64,
    /// Back-reference to the skill this one superseded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<SkillId>,
    pub size_bytes: u64,
    pub dependency_versions: BTreeMap<String, String>,
    pub knowledge_gaps: BTreeSet<String>,
    /// Store-maintained optimistic version, bumped by every committed mutation
    #[serde(default)]
    pub revision: u64,
}

impl Skill {
    /// Build the record a caller persists after a REGENERATE decision.
    ///
    /// Without a prior the generation starts at 1; otherwise it continues the
    /// prior's count so the lineage never goes backwards.
    #[must_use]
    pub fn new_generation(
        context: &SkillContext,
        prior: Option<&Self>,
        size_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SkillId::generate(),
            domain: context.domain().to_string(),
            context_hash: context.fingerprint(),
            status: SkillStatus::Active,
            created_at: now,
            last_used_at: Some(now),
            last_verified_at: Some(now),
            archived_at: None,
            generation_count: prior.map_or(1, |p| p.generation_count + 1),
            previous_version_id: prior.map(|p| p.id.clone()),
            size_bytes,
            dependency_versions: context.tool_versions().clone(),
            knowledge_gaps: context.knowledge_gaps().clone(),
            revision: 0,
        }
    }

    /// Last time the skill was created, reused or restored.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_used_at.unwrap_or(self.created_at)
    }

    /// Start of the current revalidation window.
    ///
    /// A skill that has never been verified counts from its creation.
    #[must_use]
    pub fn verified_since(&self) -> DateTime<Utc> {
        self.last_verified_at.unwrap_or(self.created_at)
    }

    /// Whether the skill depends on exactly these tools, at any version.
    #[must_use]
    pub fn has_tool_names(&self, tool_names: &BTreeSet<String>) -> bool {
        self.dependency_versions.keys().eq(tool_names.iter())
    }

    /// Check that `ancestor` is an acceptable `previous_version_id` target.
    pub fn validate_ancestor(&self, ancestor: &Self) -> Result<()> {
        let reject = |reason: String| DsrError::InvalidLineage {
            skill_id: self.id.to_string(),
            reason,
        };

        if ancestor.id == self.id {
            return Err(reject("a skill cannot supersede itself".to_string()));
        }
        if ancestor.created_at >= self.created_at {
            return Err(reject(format!(
                "ancestor {} was created at {}, not before {}",
                ancestor.id, ancestor.created_at, self.created_at
            )));
        }
        if ancestor.generation_count >= self.generation_count {
            return Err(reject(format!(
                "generation {} does not advance ancestor generation {}",
                self.generation_count, ancestor.generation_count
            )));
        }
        Ok(())
    }
}
