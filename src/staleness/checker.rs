//! Breaking-change checker capability.
//!
//! The detector asks a checker whether any of a skill's recorded dependency
//! versions has had a breaking change. Checkers may block; the detector bounds
//! them with its own timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Skill;
use crate::error::{DsrError, Result};

/// Answer from a successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub breaking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckReport {
    #[must_use]
    pub const fn clean() -> Self {
        Self {
            breaking: false,
            details: None,
        }
    }

    #[must_use]
    pub fn breaking(details: impl Into<String>) -> Self {
        Self {
            breaking: true,
            details: Some(details.into()),
        }
    }
}

pub trait BreakingChangeChecker: Send + Sync {
    /// Report whether `skill`'s dependencies changed incompatibly. An `Err`
    /// means the question could not be answered.
    fn check(&self, skill: &Skill) -> Result<CheckReport>;

    fn name(&self) -> &'static str;
}

/// Never reports a breaking change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChecker;

impl BreakingChangeChecker for NoopChecker {
    fn check(&self, _skill: &Skill) -> Result<CheckReport> {
        Ok(CheckReport::clean())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    domain: &'a str,
    dependencies: &'a BTreeMap<String, String>,
}

/// POSTs `{domain, dependencies}` as JSON and expects
/// `{"breaking": bool, "details": string?}` back.
pub struct HttpChecker {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for HttpChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChecker")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpChecker {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        if endpoint.starts_with("http://") {
            tracing::debug!(endpoint, "breaking-change endpoint uses unencrypted HTTP");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DsrError::Config(format!("breaking-change http client: {err}")))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl BreakingChangeChecker for HttpChecker {
    fn check(&self, skill: &Skill) -> Result<CheckReport> {
        let request = CheckRequest {
            domain: &skill.domain,
            dependencies: &skill.dependency_versions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    DsrError::Timeout(format!("breaking-change check: {err}"))
                } else {
                    DsrError::CheckFailed(format!("request failed: {err}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(DsrError::CheckFailed(format!("HTTP {}", response.status())));
        }

        response
            .json::<CheckReport>()
            .map_err(|err| DsrError::CheckFailed(format!("response parse: {err}")))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
