use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DsrError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub staleness: StalenessConfig,
    #[serde(default)]
    pub archival: ArchivalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Layer defaults, then the global and project files (or only the
    /// explicit file), then `DSR_*` environment overrides, and validate.
    pub fn load(explicit_path: Option<&Path>, dsr_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("DSR_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(DsrError::MissingConfig(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(dsr_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("dsr/config.toml"))
    }

    fn load_project(dsr_root: &Path) -> Result<Option<ConfigPatch>> {
        let path = dsr_root.join("config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| DsrError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| DsrError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.staleness {
            self.staleness.merge(patch);
        }
        if let Some(patch) = patch.archival {
            self.archival.merge(patch);
        }
        if let Some(patch) = patch.metrics {
            self.metrics.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_u32("DSR_REVALIDATION_WINDOW_DAYS")? {
            self.staleness.revalidation_window_days = value;
        }
        if let Some(value) = env_u64("DSR_CHECK_TIMEOUT_MS")? {
            self.staleness.check_timeout_ms = value;
        }
        if let Some(value) = env_string("DSR_CHECKER") {
            self.staleness.checker = value.parse()?;
        }
        if let Some(value) = env_string("DSR_CHECKER_ENDPOINT") {
            self.staleness.endpoint = Some(value);
        }

        if let Some(value) = env_u32("DSR_INACTIVITY_THRESHOLD_DAYS")? {
            self.archival.inactivity_threshold_days = value;
        }
        if let Some(value) = env_u64("DSR_SWEEP_INTERVAL_SECS")? {
            self.archival.sweep_interval_secs = value;
        }
        if let Some(value) = env_bool("DSR_SWEEP_ON_START") {
            self.archival.sweep_on_start = value;
        }

        if let Some(value) = env_u32("DSR_LATENCY_WINDOW")? {
            self.metrics.latency_window = value;
        }
        if let Some(value) = env_bool("DSR_METRICS_PERSIST") {
            self.metrics.persist = value;
        }

        Ok(())
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            (
                "staleness.revalidation_window_days",
                u64::from(self.staleness.revalidation_window_days),
            ),
            ("staleness.check_timeout_ms", self.staleness.check_timeout_ms),
            (
                "archival.inactivity_threshold_days",
                u64::from(self.archival.inactivity_threshold_days),
            ),
            ("archival.sweep_interval_secs", self.archival.sweep_interval_secs),
            ("metrics.latency_window", u64::from(self.metrics.latency_window)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(DsrError::Config(format!("{key} must be greater than zero")));
            }
        }

        if self.staleness.checker == CheckerKind::Http {
            match self.staleness.endpoint.as_deref() {
                None | Some("") => {
                    return Err(DsrError::Config(
                        "staleness.endpoint is required when staleness.checker = \"http\""
                            .to_string(),
                    ));
                }
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    return Err(DsrError::Config(format!(
                        "staleness.endpoint must be an http(s) URL, got {url:?}"
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| DsrError::Serialization(format!("render config: {err}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    #[default]
    None,
    Http,
}

impl std::str::FromStr for CheckerKind {
    type Err = DsrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "http" => Ok(Self::Http),
            other => Err(DsrError::Config(format!(
                "invalid checker {other:?} (expected none|http)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessConfig {
    #[serde(default)]
    pub revalidation_window_days: u32,
    #[serde(default)]
    pub check_timeout_ms: u64,
    #[serde(default)]
    pub checker: CheckerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            revalidation_window_days: crate::staleness::DEFAULT_REVALIDATION_WINDOW_DAYS,
            check_timeout_ms: 3000,
            checker: CheckerKind::None,
            endpoint: None,
        }
    }
}

impl StalenessConfig {
    fn merge(&mut self, patch: StalenessPatch) {
        if let Some(value) = patch.revalidation_window_days {
            self.revalidation_window_days = value;
        }
        if let Some(value) = patch.check_timeout_ms {
            self.check_timeout_ms = value;
        }
        if let Some(value) = patch.checker {
            self.checker = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = Some(value);
        }
    }

    #[must_use]
    pub fn revalidation_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.revalidation_window_days))
    }

    #[must_use]
    pub const fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalConfig {
    #[serde(default)]
    pub inactivity_threshold_days: u32,
    #[serde(default)]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub sweep_on_start: bool,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: crate::archival::DEFAULT_INACTIVITY_THRESHOLD_DAYS,
            sweep_interval_secs: crate::archival::DEFAULT_SWEEP_INTERVAL.as_secs(),
            sweep_on_start: false,
        }
    }
}

impl ArchivalConfig {
    fn merge(&mut self, patch: ArchivalPatch) {
        if let Some(value) = patch.inactivity_threshold_days {
            self.inactivity_threshold_days = value;
        }
        if let Some(value) = patch.sweep_interval_secs {
            self.sweep_interval_secs = value;
        }
        if let Some(value) = patch.sweep_on_start {
            self.sweep_on_start = value;
        }
    }

    #[must_use]
    pub fn inactivity_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.inactivity_threshold_days))
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub latency_window: u32,
    /// Fold each run's counters into the database totals
    #[serde(default)]
    pub persist: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_window: 128,
            persist: true,
        }
    }
}

impl MetricsConfig {
    fn merge(&mut self, patch: MetricsPatch) {
        if let Some(value) = patch.latency_window {
            self.latency_window = value;
        }
        if let Some(value) = patch.persist {
            self.persist = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub staleness: Option<StalenessPatch>,
    pub archival: Option<ArchivalPatch>,
    pub metrics: Option<MetricsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StalenessPatch {
    pub revalidation_window_days: Option<u32>,
    pub check_timeout_ms: Option<u64>,
    pub checker: Option<CheckerKind>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArchivalPatch {
    pub inactivity_threshold_days: Option<u32>,
    pub sweep_interval_secs: Option<u64>,
    pub sweep_on_start: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricsPatch {
    pub latency_window: Option<u32>,
    pub persist: Option<bool>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            DsrError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            DsrError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}
