//! Append-only audit trail of skill mutations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{SkillId, SkillStatus};
use crate::error::{DsrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillEventKind {
    Created,
    Reused,
    MarkedStale,
    Reactivated,
    Verified,
    Archived,
    Restored,
}

impl SkillEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Reused => "reused",
            Self::MarkedStale => "marked_stale",
            Self::Reactivated => "reactivated",
            Self::Verified => "verified",
            Self::Archived => "archived",
            Self::Restored => "restored",
        }
    }

    /// Event kind recorded for a plain status transition.
    #[must_use]
    pub const fn for_transition(from: SkillStatus, to: SkillStatus) -> Self {
        match (from, to) {
            (_, SkillStatus::Archived) => Self::Archived,
            (SkillStatus::Archived, _) => Self::Restored,
            (_, SkillStatus::Stale) => Self::MarkedStale,
            (SkillStatus::Stale, SkillStatus::Active) => Self::Reactivated,
            (SkillStatus::Active, SkillStatus::Active) => Self::Verified,
        }
    }
}

impl fmt::Display for SkillEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillEventKind {
    type Err = DsrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(Self::Created),
            "reused" => Ok(Self::Reused),
            "marked_stale" => Ok(Self::MarkedStale),
            "reactivated" => Ok(Self::Reactivated),
            "verified" => Ok(Self::Verified),
            "archived" => Ok(Self::Archived),
            "restored" => Ok(Self::Restored),
            other => Err(DsrError::Serialization(format!("unknown event kind {other:?}"))),
        }
    }
}

/// One committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEvent {
    /// Store-wide sequence number, strictly increasing
    pub seq: u64,
    pub skill_id: SkillId,
    pub kind: SkillEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<SkillStatus>,
    pub to_status: SkillStatus,
    pub at: DateTime<Utc>,
    /// Generation count after the mutation
    pub generation_count: u64,
}
