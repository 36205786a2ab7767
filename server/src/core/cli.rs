use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::OverlapPolicy;
use super::constants::{
    ENV_CONFIG, ENV_INFLUX_DATABASE, ENV_INFLUX_PASSWORD, ENV_INFLUX_RETENTION_POLICY,
    ENV_INFLUX_URL, ENV_INFLUX_USERNAME, ENV_INTERVAL_SECS, ENV_LOOKBACK_MINUTES,
    ENV_MONITORING_ENDPOINT, ENV_OVERLAP, ENV_PASS_TIMEOUT_SECS, ENV_PROJECT_ID,
};

#[derive(Parser)]
#[command(name = "metricbridge")]
#[command(
    version,
    about = "Cloud Monitoring to InfluxDB metric bridge",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Cloud project whose metrics are queried
    #[arg(long, short = 'P', global = true, env = ENV_PROJECT_ID)]
    pub project_id: Option<String>,

    /// Monitoring API endpoint
    #[arg(long, global = true, env = ENV_MONITORING_ENDPOINT)]
    pub monitoring_endpoint: Option<String>,

    // Store options
    /// InfluxDB base URL
    #[arg(long, global = true, env = ENV_INFLUX_URL)]
    pub influx_url: Option<String>,

    /// InfluxDB username
    #[arg(long, global = true, env = ENV_INFLUX_USERNAME)]
    pub influx_username: Option<String>,

    /// InfluxDB password
    #[arg(long, global = true, env = ENV_INFLUX_PASSWORD, hide_env_values = true)]
    pub influx_password: Option<String>,

    /// Target database
    #[arg(long, global = true, env = ENV_INFLUX_DATABASE)]
    pub influx_database: Option<String>,

    /// Target retention policy
    #[arg(long, global = true, env = ENV_INFLUX_RETENTION_POLICY)]
    pub influx_retention_policy: Option<String>,

    // Schedule options
    /// Seconds between pass starts
    #[arg(long, short = 'i', global = true, env = ENV_INTERVAL_SECS)]
    pub interval_secs: Option<u64>,

    /// Query window length in minutes
    #[arg(long, global = true, env = ENV_LOOKBACK_MINUTES)]
    pub lookback_minutes: Option<u64>,

    /// Maximum seconds a pass may spend collecting
    #[arg(long, global = true, env = ENV_PASS_TIMEOUT_SECS)]
    pub pass_timeout_secs: Option<u64>,

    /// Behavior when a tick arrives during a running pass (skip or concurrent)
    #[arg(long, global = true, env = ENV_OVERLAP, value_parser = parse_overlap_policy)]
    pub overlap: Option<OverlapPolicy>,
}

/// Parse overlap policy from CLI/env string
fn parse_overlap_policy(s: &str) -> Result<OverlapPolicy, String> {
    match s.to_lowercase().as_str() {
        "skip" => Ok(OverlapPolicy::Skip),
        "concurrent" => Ok(OverlapPolicy::Concurrent),
        _ => Err(format!(
            "Invalid overlap policy '{}'. Valid options: skip, concurrent",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the collection scheduler (default command)
    Start,
    /// Run a single collection pass, print the report and exit
    Once,
    /// Print the configured metric catalog and exit
    Catalog,
}

/// Configuration derived from CLI arguments
#[derive(Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub project_id: Option<String>,
    pub monitoring_endpoint: Option<String>,
    pub influx_url: Option<String>,
    pub influx_username: Option<String>,
    pub influx_password: Option<String>,
    pub influx_database: Option<String>,
    pub influx_retention_policy: Option<String>,
    pub interval_secs: Option<u64>,
    pub lookback_minutes: Option<u64>,
    pub pass_timeout_secs: Option<u64>,
    pub overlap: Option<OverlapPolicy>,
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("config", &self.config)
            .field("project_id", &self.project_id)
            .field("monitoring_endpoint", &self.monitoring_endpoint)
            .field("influx_url", &self.influx_url)
            .field("influx_username", &self.influx_username)
            .field(
                "influx_password",
                &self.influx_password.as_ref().map(|_| "***"),
            )
            .field("influx_database", &self.influx_database)
            .field("influx_retention_policy", &self.influx_retention_policy)
            .field("interval_secs", &self.interval_secs)
            .field("lookback_minutes", &self.lookback_minutes)
            .field("pass_timeout_secs", &self.pass_timeout_secs)
            .field("overlap", &self.overlap)
            .finish()
    }
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            project_id: cli.project_id,
            monitoring_endpoint: cli.monitoring_endpoint,
            influx_url: cli.influx_url,
            influx_username: cli.influx_username,
            influx_password: cli.influx_password,
            influx_database: cli.influx_database,
            influx_retention_policy: cli.influx_retention_policy,
            interval_secs: cli.interval_secs,
            lookback_minutes: cli.lookback_minutes,
            pass_timeout_secs: cli.pass_timeout_secs,
            overlap: cli.overlap,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (CliConfig::from(cli), command)
}
