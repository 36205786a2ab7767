use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::metrics::{MetricCatalog, MetricMapping};
use crate::utils::file::expand_home;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_INFLUX_DATABASE, DEFAULT_INFLUX_TIMEOUT_SECS,
    DEFAULT_INFLUX_URL, DEFAULT_INTERVAL_SECS, DEFAULT_LOOKBACK_MINUTES,
    DEFAULT_MONITORING_ENDPOINT, DEFAULT_MONITORING_TIMEOUT_SECS, DEFAULT_PASS_TIMEOUT_SECS,
    DEFAULT_RETENTION_POLICY, MAX_LOOKBACK_MINUTES,
};

// =============================================================================
// Overlap Policy Enum
// =============================================================================

/// What the scheduler does when a tick arrives while a pass is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the tick
    #[default]
    Skip,
    /// Start another pass; entries still in flight are skipped by the newer pass
    Concurrent,
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapPolicy::Skip => write!(f, "skip"),
            OverlapPolicy::Concurrent => write!(f, "concurrent"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON, all fields optional)
// =============================================================================

/// Monitoring backend section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MonitoringFileConfig {
    pub project_id: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Time-series store section
#[derive(Default, Clone, Deserialize)]
pub struct InfluxFileConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub retention_policy: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for InfluxFileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxFileConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("retention_policy", &self.retention_policy)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Schedule section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScheduleFileConfig {
    pub interval_secs: Option<u64>,
    pub lookback_minutes: Option<u64>,
    pub pass_timeout_secs: Option<u64>,
    pub overlap: Option<OverlapPolicy>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub monitoring: Option<MonitoringFileConfig>,
    pub influx: Option<InfluxFileConfig>,
    pub schedule: Option<ScheduleFileConfig>,
    /// Replaces the built-in catalog when present
    pub catalog: Option<Vec<MetricMapping>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(monitoring) = other.monitoring {
            let current = self
                .monitoring
                .get_or_insert_with(MonitoringFileConfig::default);
            if monitoring.project_id.is_some() {
                tracing::trace!(project_id = ?monitoring.project_id, "Merging monitoring.project_id");
                current.project_id = monitoring.project_id;
            }
            if monitoring.endpoint.is_some() {
                tracing::trace!(endpoint = ?monitoring.endpoint, "Merging monitoring.endpoint");
                current.endpoint = monitoring.endpoint;
            }
            if monitoring.timeout_secs.is_some() {
                current.timeout_secs = monitoring.timeout_secs;
            }
        }

        if let Some(influx) = other.influx {
            let current = self.influx.get_or_insert_with(InfluxFileConfig::default);
            if influx.url.is_some() {
                tracing::trace!(url = ?influx.url, "Merging influx.url");
                current.url = influx.url;
            }
            if influx.username.is_some() {
                current.username = influx.username;
            }
            if influx.password.is_some() {
                tracing::trace!(password = "***", "Merging influx.password");
                current.password = influx.password;
            }
            if influx.database.is_some() {
                tracing::trace!(database = ?influx.database, "Merging influx.database");
                current.database = influx.database;
            }
            if influx.retention_policy.is_some() {
                current.retention_policy = influx.retention_policy;
            }
            if influx.timeout_secs.is_some() {
                current.timeout_secs = influx.timeout_secs;
            }
        }

        if let Some(schedule) = other.schedule {
            let current = self.schedule.get_or_insert_with(ScheduleFileConfig::default);
            if schedule.interval_secs.is_some() {
                tracing::trace!(interval_secs = ?schedule.interval_secs, "Merging schedule.interval_secs");
                current.interval_secs = schedule.interval_secs;
            }
            if schedule.lookback_minutes.is_some() {
                current.lookback_minutes = schedule.lookback_minutes;
            }
            if schedule.pass_timeout_secs.is_some() {
                current.pass_timeout_secs = schedule.pass_timeout_secs;
            }
            if schedule.overlap.is_some() {
                current.overlap = schedule.overlap;
            }
        }

        // Catalog is replaced as a whole, never merged entry by entry
        if other.catalog.is_some() {
            tracing::trace!(
                entries = other.catalog.as_ref().map(Vec::len),
                "Replacing catalog"
            );
            self.catalog = other.catalog;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Monitoring backend configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub project_id: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Time-series store configuration
#[derive(Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub retention_policy: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("retention_policy", &self.retention_policy)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Pass cadence and window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    pub lookback_minutes: u64,
    pub pass_timeout_secs: u64,
    pub overlap: OverlapPolicy,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_minutes.saturating_mul(60))
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub influx: InfluxConfig,
    pub schedule: ScheduleConfig,
    pub catalog: MetricCatalog,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.metricbridge/metricbridge.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        Self::load_with_profile(cli, get_profile_config_path())
    }

    fn load_with_profile(cli: &CliConfig, profile_path: Option<PathBuf>) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir - skip if not exists
        if let Some(profile_path) = profile_path
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_layers(file_config, cli)
    }

    /// Layer merged file config and CLI/env overrides over defaults, then validate
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_monitoring = file_config.monitoring.unwrap_or_default();
        let file_influx = file_config.influx.unwrap_or_default();
        let file_schedule = file_config.schedule.unwrap_or_default();

        let monitoring = MonitoringConfig {
            project_id: cli
                .project_id
                .clone()
                .or(file_monitoring.project_id)
                .unwrap_or_default(),
            endpoint: cli
                .monitoring_endpoint
                .clone()
                .or(file_monitoring.endpoint)
                .unwrap_or_else(|| DEFAULT_MONITORING_ENDPOINT.to_string()),
            timeout_secs: file_monitoring
                .timeout_secs
                .unwrap_or(DEFAULT_MONITORING_TIMEOUT_SECS),
        };

        let influx = InfluxConfig {
            url: cli
                .influx_url
                .clone()
                .or(file_influx.url)
                .unwrap_or_else(|| DEFAULT_INFLUX_URL.to_string()),
            username: cli
                .influx_username
                .clone()
                .or(file_influx.username)
                .filter(|u| !u.is_empty()),
            password: cli.influx_password.clone().or(file_influx.password),
            database: cli
                .influx_database
                .clone()
                .or(file_influx.database)
                .unwrap_or_else(|| DEFAULT_INFLUX_DATABASE.to_string()),
            retention_policy: cli
                .influx_retention_policy
                .clone()
                .or(file_influx.retention_policy)
                .unwrap_or_else(|| DEFAULT_RETENTION_POLICY.to_string()),
            timeout_secs: file_influx
                .timeout_secs
                .unwrap_or(DEFAULT_INFLUX_TIMEOUT_SECS),
        };

        let schedule = ScheduleConfig {
            interval_secs: cli
                .interval_secs
                .or(file_schedule.interval_secs)
                .unwrap_or(DEFAULT_INTERVAL_SECS),
            lookback_minutes: cli
                .lookback_minutes
                .or(file_schedule.lookback_minutes)
                .unwrap_or(DEFAULT_LOOKBACK_MINUTES),
            pass_timeout_secs: cli
                .pass_timeout_secs
                .or(file_schedule.pass_timeout_secs)
                .unwrap_or(DEFAULT_PASS_TIMEOUT_SECS),
            overlap: cli.overlap.or(file_schedule.overlap).unwrap_or_default(),
        };

        let catalog = match file_config.catalog {
            Some(entries) => {
                MetricCatalog::new(entries).context("Configuration error: invalid catalog")?
            }
            None => MetricCatalog::standard(),
        };

        let config = Self {
            monitoring,
            influx,
            schedule,
            catalog,
        };
        config.validate()?;

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.monitoring.project_id.trim().is_empty() {
            anyhow::bail!(
                "Configuration error: monitoring.project_id is required (--project-id or METRICBRIDGE_PROJECT_ID)"
            );
        }

        if self.monitoring.endpoint.trim().is_empty() {
            anyhow::bail!("Configuration error: monitoring.endpoint must not be empty");
        }

        if self.influx.url.trim().is_empty() {
            anyhow::bail!("Configuration error: influx.url must not be empty");
        }

        if self.influx.database.trim().is_empty() {
            anyhow::bail!("Configuration error: influx.database must not be empty");
        }

        if self.schedule.interval_secs == 0 {
            anyhow::bail!("Configuration error: schedule.interval_secs must be greater than 0");
        }

        if self.schedule.lookback_minutes == 0 {
            anyhow::bail!("Configuration error: schedule.lookback_minutes must be greater than 0");
        }

        if self.schedule.lookback_minutes > MAX_LOOKBACK_MINUTES {
            anyhow::bail!(
                "Configuration error: schedule.lookback_minutes must be at most {}",
                MAX_LOOKBACK_MINUTES
            );
        }

        if self.schedule.pass_timeout_secs == 0 {
            anyhow::bail!("Configuration error: schedule.pass_timeout_secs must be greater than 0");
        }

        if self.schedule.lookback() < self.schedule.interval() {
            tracing::warn!(
                lookback_minutes = self.schedule.lookback_minutes,
                interval_secs = self.schedule.interval_secs,
                "Lookback window is shorter than the interval, points between passes may be missed"
            );
        }

        if self.catalog.is_empty() {
            tracing::warn!("Catalog is empty, passes will write nothing");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.metricbridge/metricbridge.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
