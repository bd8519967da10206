//! Application context shared by CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::archival::ArchivalManager;
use crate::cli::Cli;
use crate::config::{CheckerKind, Config, StalenessConfig};
use crate::core::{Clock, SystemClock};
use crate::engine::ReuseEngine;
use crate::error::{DsrError, Result};
use crate::metrics::MetricsCollector;
use crate::staleness::{BreakingChangeChecker, HttpChecker, NoopChecker, StalenessDetector};
use crate::storage::{Database, SkillStore};

pub const ROOT_DIR_NAME: &str = ".dsr";
pub const DB_FILE_NAME: &str = "dsr.db";

pub struct AppContext {
    pub dsr_root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<MetricsCollector>,
    pub robot_mode: bool,
    pub verbosity: u8,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("dsr_root", &self.dsr_root)
            .field("config_path", &self.config_path)
            .field("robot_mode", &self.robot_mode)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let dsr_root = find_dsr_root()?;
        let config = Config::load(cli.config.as_deref(), &dsr_root)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| default_config_path(&dsr_root));
        Self::open(dsr_root, config_path, config, cli.robot, cli.verbose)
    }

    /// Open the database under `dsr_root` and wire shared services.
    pub fn open(
        dsr_root: PathBuf,
        config_path: PathBuf,
        config: Config,
        robot_mode: bool,
        verbosity: u8,
    ) -> Result<Self> {
        let db = Arc::new(Database::open(dsr_root.join(DB_FILE_NAME))?);
        let window = usize::try_from(config.metrics.latency_window).unwrap_or(usize::MAX);
        debug!(root = %dsr_root.display(), "opened dsr root");

        Ok(Self {
            dsr_root,
            config_path,
            config,
            db,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(MetricsCollector::new(window)),
            robot_mode,
            verbosity,
        })
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn SkillStore> {
        Arc::clone(&self.db) as Arc<dyn SkillStore>
    }

    pub fn detector(&self) -> Result<StalenessDetector> {
        let checker = build_checker(&self.config.staleness)?;
        Ok(StalenessDetector::new(
            checker,
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
        )
        .with_revalidation_window(self.config.staleness.revalidation_window())
        .with_check_timeout(self.config.staleness.check_timeout()))
    }

    pub fn engine(&self) -> Result<ReuseEngine> {
        Ok(ReuseEngine::new(
            self.store(),
            self.detector()?,
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
        ))
    }

    #[must_use]
    pub fn archival(&self) -> ArchivalManager {
        ArchivalManager::new(
            self.store(),
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
        )
        .with_inactivity_threshold(self.config.archival.inactivity_threshold())
    }

    /// Add this process's counters to the lifetime totals.
    pub fn persist_metrics(&self) -> Result<()> {
        if !self.config.metrics.persist {
            return Ok(());
        }
        self.db.add_metric_totals(&self.metrics.snapshot().counters())
    }
}

pub fn build_checker(config: &StalenessConfig) -> Result<Arc<dyn BreakingChangeChecker>> {
    match config.checker {
        CheckerKind::None => Ok(Arc::new(NoopChecker)),
        CheckerKind::Http => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                DsrError::Config("staleness.endpoint is required for the http checker".into())
            })?;
            Ok(Arc::new(HttpChecker::new(endpoint, config.check_timeout())?))
        }
    }
}

/// `DSR_ROOT`, else the nearest `.dsr/` above the working directory, else the
/// platform data directory.
pub fn find_dsr_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("DSR_ROOT") {
        return Ok(PathBuf::from(root));
    }

    let cwd = std::env::current_dir()?;
    if let Some(found) = find_upwards(&cwd, ROOT_DIR_NAME) {
        return Ok(found);
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| DsrError::MissingConfig("data directory not found".to_string()))?;
    Ok(data_dir.join("dsr"))
}

#[must_use]
pub fn default_config_path(dsr_root: &Path) -> PathBuf {
    dsr_root.join("config.toml")
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
