use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use super::ScriptedChecker;
use crate::archival::ArchivalManager;
use crate::context::SkillContext;
use crate::core::{Clock, ManualClock};
use crate::engine::ReuseEngine;
use crate::metrics::MetricsCollector;
use crate::staleness::{BreakingChangeChecker, StalenessDetector};
use crate::storage::{Database, MemoryStore, SkillStore};

/// Which store implementation a fixture runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

impl Backend {
    pub const ALL: [Self; 2] = [Self::Memory, Self::Sqlite];
}

/// Fully wired engine on a manual clock, with an isolated temp directory.
pub struct EngineFixture {
    pub temp_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub metrics: Arc<MetricsCollector>,
    pub checker: Arc<ScriptedChecker>,
    pub store: Arc<dyn SkillStore>,
    pub engine: ReuseEngine,
    pub archival: Arc<ArchivalManager>,
}

impl EngineFixture {
    pub fn new(backend: Backend) -> Self {
        Self::with_checker(backend, ScriptedChecker::clean())
    }

    pub fn with_checker(backend: Backend, checker: ScriptedChecker) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn SkillStore> = match backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite => Arc::new(
                Database::open(temp_dir.path().join("skills.db"))
                    .expect("Failed to open fixture database"),
            ),
        };

        let start = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixture start time");
        let clock = Arc::new(ManualClock::new(start));
        let metrics = Arc::new(MetricsCollector::default());
        let checker = Arc::new(checker);

        let detector = StalenessDetector::new(
            Arc::clone(&checker) as Arc<dyn BreakingChangeChecker>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&metrics),
        )
        .with_check_timeout(Duration::from_millis(200));
        let engine = ReuseEngine::new(
            Arc::clone(&store),
            detector,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&metrics),
        );
        let archival = Arc::new(ArchivalManager::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&metrics),
        ));

        Self {
            temp_dir,
            clock,
            metrics,
            checker,
            store,
            engine,
            archival,
        }
    }

    /// Build a request context from literal parts.
    pub fn context(domain: &str, tools: &[(&str, &str)], gaps: &[&str]) -> SkillContext {
        let mut context = SkillContext::new(domain);
        for (name, version) in tools {
            context = context.with_tool(name, version);
        }
        for gap in gaps {
            context = context.with_gap(gap);
        }
        context
    }
}
