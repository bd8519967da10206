//! Inbound request context.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::fingerprint::{ContextHash, fingerprint, normalize_domain};
use crate::error::{DsrError, Result};

/// The working environment a caller wants a skill for.
///
/// Produced by the orchestration layer after it has resolved the domain,
/// the installed tools and the knowledge gaps of the task at hand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillContext {
    domain: String,
    #[serde(default)]
    tool_versions: BTreeMap<String, String>,
    #[serde(default)]
    knowledge_gaps: BTreeSet<String>,
}

impl SkillContext {
    #[must_use]
    pub fn new(domain: &str) -> Self {
        Self {
            domain: normalize_domain(domain),
            tool_versions: BTreeMap::new(),
            knowledge_gaps: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_tool(mut self, name: &str, version: &str) -> Self {
        self.tool_versions
            .insert(name.trim().to_string(), version.trim().to_string());
        self
    }

    #[must_use]
    pub fn with_gap(mut self, gap: &str) -> Self {
        let gap = gap.trim();
        if !gap.is_empty() {
            self.knowledge_gaps.insert(gap.to_string());
        }
        self
    }

    /// Build from raw parts, e.g. CLI arguments.
    ///
    /// Tool specs use `name=version`; a spec without `=` or with an empty
    /// name is rejected.
    pub fn from_parts<S: AsRef<str>>(domain: &str, tools: &[S], gaps: &[S]) -> Result<Self> {
        if domain.trim().is_empty() {
            return Err(DsrError::Config("domain must not be empty".to_string()));
        }
        let mut context = Self::new(domain);
        for spec in tools {
            let (name, version) = parse_tool_spec(spec.as_ref())?;
            context = context.with_tool(name, version);
        }
        for gap in gaps {
            context = context.with_gap(gap.as_ref());
        }
        Ok(context)
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub const fn tool_versions(&self) -> &BTreeMap<String, String> {
        &self.tool_versions
    }

    #[must_use]
    pub const fn knowledge_gaps(&self) -> &BTreeSet<String> {
        &self.knowledge_gaps
    }

    /// Fingerprint of this context.
    #[must_use]
    pub fn fingerprint(&self) -> ContextHash {
        fingerprint(
            &self.domain,
            self.tool_versions
                .iter()
                .map(|(name, version)| (name.as_str(), version.as_str())),
            self.knowledge_gaps.iter().map(String::as_str),
        )
    }
}

fn parse_tool_spec(spec: &str) -> Result<(&str, &str)> {
    let (name, version) = spec
        .split_once('=')
        .ok_or_else(|| DsrError::Config(format!("tool spec {spec:?} must be name=version")))?;
    if name.trim().is_empty() {
        return Err(DsrError::Config(format!("tool spec {spec:?} has an empty name")));
    }
    Ok((name, version))
}
