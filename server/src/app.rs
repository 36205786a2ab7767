//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_LOG_FILTER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::{CloudMonitoringClient, InfluxClient, TokenSource};
use crate::domain::metrics::{Collector, MetricsPipeline, WriteOutcome};
use crate::utils::time::now_unix_seconds;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub pipeline: MetricsPipeline,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Catalog) => {
                let config = AppConfig::load(&cli_config)?;
                print!("{}", banner::format_catalog(&config.catalog));
                Ok(())
            }
            Some(Commands::Once) => {
                let app = Self::init(&cli_config).await?;
                app.run_once().await
            }
            Some(Commands::Start) | None => {
                let app = Self::init(&cli_config).await?;
                app.start().await
            }
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let tokens = TokenSource::detect()
            .await
            .context("Failed to acquire Google Cloud credentials")?;
        let source = CloudMonitoringClient::new(&config.monitoring, tokens)
            .context("Failed to initialize monitoring client")?;
        let writer =
            InfluxClient::new(&config.influx).context("Failed to initialize InfluxDB client")?;

        let collector = Collector::new(Arc::new(source), Arc::new(config.catalog.clone()));
        let pipeline = MetricsPipeline::new(
            collector,
            Arc::new(writer),
            config.schedule.clone(),
            &config.influx.database,
            &config.influx.retention_policy,
        );

        tracing::debug!(
            project = %config.monitoring.project_id,
            entries = config.catalog.len(),
            "Pipeline initialized"
        );

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            pipeline,
        })
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn run_once(self) -> Result<()> {
        let report = self.pipeline.run_pass(now_unix_seconds()).await;
        print!("{}", banner::format_report(&report));

        if report.write == WriteOutcome::Failed {
            anyhow::bail!("Batch write to {} failed", self.config.influx.database);
        }
        if report.timed_out {
            anyhow::bail!(
                "Pass exceeded {}s timeout, unfinished entries were not collected",
                self.config.schedule.pass_timeout_secs
            );
        }
        Ok(())
    }

    async fn start(self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        self.shutdown.install_signal_handlers();

        banner::print_banner(&self.config);

        let handle = self.pipeline.clone().start(self.shutdown.subscribe());
        self.shutdown.register(handle).await;
        tracing::info!(
            interval_secs = self.config.schedule.interval_secs,
            entries = self.config.catalog.len(),
            "Collection scheduler started"
        );

        self.shutdown.wait().await;
        if !self.shutdown.shutdown().await {
            tracing::warn!(state = ?self.pipeline.state(), "Exiting with a pass still in flight");
        }

        Ok(())
    }
}
