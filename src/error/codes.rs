//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Skill errors
//! - 3xx: Config errors
//! - 5xx: Network errors
//! - 6xx: Storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `SkillNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Skill errors (1xx)
    // ========================================
    /// E101: No skill with the requested id
    SkillNotFound,
    /// E102: A skill with this id already exists
    SkillConflict,
    /// E103: Skill is not in the status the operation requires
    SkillInvalidState,
    /// E104: previous_version_id does not point at a valid ancestor
    SkillInvalidLineage,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,
    /// E304: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Breaking-change service could not be reached
    NetworkUnreachable,
    /// E502: Breaking-change service did not answer in time
    NetworkTimeout,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Store could not be reached or opened
    StorageUnavailable,
    /// E602: SQLite reported an error
    DatabaseError,
    /// E603: Stored data could not be encoded or decoded
    SerializationError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E906: Filesystem operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric code.
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::SkillNotFound => 101,
            Self::SkillConflict => 102,
            Self::SkillInvalidState => 103,
            Self::SkillInvalidLineage => 104,

            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 304,

            Self::NetworkUnreachable => 501,
            Self::NetworkTimeout => 502,

            Self::StorageUnavailable => 601,
            Self::DatabaseError => 602,
            Self::SerializationError => 603,

            Self::IoError => 906,
        }
    }

    /// Get the code as a string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Default recovery hint for this code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::SkillNotFound => "Run `dsr list` to see known skills, including archived ones",
            Self::SkillConflict => "Skill ids must be freshly generated. Let `dsr record` assign the id",
            Self::SkillInvalidState => "Re-fetch the skill with `dsr show <id>` and retry with its current status",
            Self::SkillInvalidLineage => "The prior skill must exist, be older, and have a lower generation count",

            Self::ConfigInvalid => "Run `dsr config` to see current values. Check TOML syntax in config file",
            Self::ConfigMissingRequired => "Set the missing value in config.toml or via its DSR_* environment variable",

            Self::NetworkUnreachable => "Check the breaking-change service endpoint in [staleness] config",
            Self::NetworkTimeout => "The breaking-change service is slow. Raise staleness.check_timeout_ms if needed",

            Self::StorageUnavailable => "Check that the dsr root is readable and writable, or run `dsr init`",
            Self::DatabaseError => "The skill database reported an error. Check disk space and file permissions",
            Self::SerializationError => "Stored data could not be decoded. The record may be corrupted",

            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Whether the caller can reasonably act on this error and retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::SkillNotFound
            | Self::SkillConflict
            | Self::SkillInvalidState
            | Self::SkillInvalidLineage
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::NetworkUnreachable
            | Self::NetworkTimeout
            | Self::StorageUnavailable
            | Self::IoError => true,

            Self::DatabaseError | Self::SerializationError => false,
        }
    }

    /// Error category derived from the numeric range.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "skill",
            3 => "config",
            5 => "network",
            6 => "storage",
            9 => "internal",
            _ => "unknown",
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::SkillNotFound,
            Self::SkillConflict,
            Self::SkillInvalidState,
            Self::SkillInvalidLineage,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::NetworkUnreachable,
            Self::NetworkTimeout,
            Self::StorageUnavailable,
            Self::DatabaseError,
            Self::SerializationError,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
