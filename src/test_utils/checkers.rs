//! Breaking-change checkers with scripted answers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::Skill;
use crate::error::{DsrError, Result};
use crate::staleness::{BreakingChangeChecker, CheckReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Clean,
    Breaking(String),
    Failing(String),
}

/// Answers every check with a fixed outcome, optionally after a delay, and
/// counts how often it was asked.
#[derive(Debug)]
pub struct ScriptedChecker {
    outcome: Mutex<ScriptedOutcome>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedChecker {
    #[must_use]
    pub fn new(outcome: ScriptedOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn clean() -> Self {
        Self::new(ScriptedOutcome::Clean)
    }

    #[must_use]
    pub fn breaking(details: &str) -> Self {
        Self::new(ScriptedOutcome::Breaking(details.to_string()))
    }

    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::new(ScriptedOutcome::Failing(reason.to_string()))
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter; stays valid after the checker is boxed.
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn set_outcome(&self, outcome: ScriptedOutcome) {
        *self.outcome.lock() = outcome;
    }
}

impl BreakingChangeChecker for ScriptedChecker {
    fn check(&self, _skill: &Skill) -> Result<CheckReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        match &*self.outcome.lock() {
            ScriptedOutcome::Clean => Ok(CheckReport::clean()),
            ScriptedOutcome::Breaking(details) => Ok(CheckReport::breaking(details.clone())),
            ScriptedOutcome::Failing(reason) => Err(DsrError::CheckFailed(reason.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
