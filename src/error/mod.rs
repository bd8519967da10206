//! Error handling for dsr.
//!
//! This module provides:
//! - [`DsrError`]: The main error enum for all dsr operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Serializable error with recovery hint and context

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::SkillStatus;

pub use codes::ErrorCode;

/// Main error type for dsr operations.
#[derive(Error, Debug)]
pub enum DsrError {
    #[error("Skill not found: {0}")]
    NotFound(String),

    #[error("Skill already exists: {0}")]
    Conflict(String),

    #[error("Skill '{skill_id}' is {actual}, expected {expected}")]
    InvalidState {
        skill_id: String,
        expected: SkillStatus,
        actual: SkillStatus,
    },

    #[error("Invalid lineage for skill '{skill_id}': {reason}")]
    InvalidLineage { skill_id: String, reason: String },

    #[error("Skill store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Breaking-change check failed: {0}")]
    CheckFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl DsrError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::SkillNotFound,
            Self::Conflict(_) => ErrorCode::SkillConflict,
            Self::InvalidState { .. } => ErrorCode::SkillInvalidState,
            Self::InvalidLineage { .. } => ErrorCode::SkillInvalidLineage,
            Self::StoreUnavailable(_) => ErrorCode::StorageUnavailable,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::CheckFailed(_) => ErrorCode::NetworkUnreachable,
            Self::Timeout(_) => ErrorCode::NetworkTimeout,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::NotFound(id) | Self::Conflict(id) => Some(serde_json::json!({ "skill_id": id })),
            Self::InvalidState {
                skill_id,
                expected,
                actual,
            } => Some(serde_json::json!({
                "skill_id": skill_id,
                "expected": expected,
                "actual": actual,
            })),
            Self::InvalidLineage { skill_id, reason } => {
                Some(serde_json::json!({ "skill_id": skill_id, "reason": reason }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_dsr_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Emitted on stdout in robot mode so orchestration layers can branch on
/// the code instead of parsing messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub numeric_code: u16,
    pub message: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub recoverable: bool,
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_dsr_error(err: &DsrError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&DsrError> for StructuredError {
    fn from(err: &DsrError) -> Self {
        Self::from_dsr_error(err)
    }
}

/// Result type alias using DsrError.
pub type Result<T> = std::result::Result<T, DsrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(DsrError::NotFound("x".into()).code(), ErrorCode::SkillNotFound);
        assert_eq!(DsrError::Conflict("x".into()).code(), ErrorCode::SkillConflict);
        assert_eq!(
            DsrError::InvalidState {
                skill_id: "x".into(),
                expected: SkillStatus::Archived,
                actual: SkillStatus::Active,
            }
            .code(),
            ErrorCode::SkillInvalidState
        );
        assert_eq!(
            DsrError::StoreUnavailable("locked".into()).code(),
            ErrorCode::StorageUnavailable
        );
    }

    #[test]
    fn test_every_code_is_produced_by_some_error() {
        let errors = [
            DsrError::NotFound("x".into()),
            DsrError::Conflict("x".into()),
            DsrError::InvalidState {
                skill_id: "x".into(),
                expected: SkillStatus::Archived,
                actual: SkillStatus::Active,
            },
            DsrError::InvalidLineage {
                skill_id: "x".into(),
                reason: "cycle".into(),
            },
            DsrError::StoreUnavailable("locked".into()),
            DsrError::Database(rusqlite::Error::QueryReturnedNoRows),
            DsrError::Io(io::Error::other("disk")),
            serde_json::from_str::<Value>("{").unwrap_err().into(),
            DsrError::Serialization("bad".into()),
            DsrError::Config("bad".into()),
            DsrError::MissingConfig("endpoint".into()),
            DsrError::CheckFailed("refused".into()),
            DsrError::Timeout("slow".into()),
        ];
        let produced: std::collections::HashSet<_> = errors.iter().map(DsrError::code).collect();
        for code in ErrorCode::all() {
            assert!(produced.contains(&code), "{code:?} is never produced");
        }
    }

    #[test]
    fn test_invalid_state_message_and_context() {
        let err = DsrError::InvalidState {
            skill_id: "abc".into(),
            expected: SkillStatus::Archived,
            actual: SkillStatus::Stale,
        };
        assert_eq!(err.to_string(), "Skill 'abc' is stale, expected archived");
        let ctx = err.context().unwrap();
        assert_eq!(ctx["expected"], "archived");
        assert_eq!(ctx["actual"], "stale");
    }

    #[test]
    fn test_structured_error_serialization() {
        let structured = DsrError::NotFound("missing-id".into()).to_structured();
        let json = serde_json::to_string(&structured).unwrap();
        assert!(json.contains("SKILL_NOT_FOUND"));
        assert!(json.contains("\"numeric_code\":101"));
        assert!(json.contains("\"category\":\"skill\""));
        assert!(json.contains("missing-id"));
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::SkillConflict, "duplicate");
        assert_eq!(err.to_string(), "[E102] duplicate");
    }
}
