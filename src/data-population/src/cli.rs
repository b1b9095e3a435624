//! Command line interface
//!
//! ```bash
//! # Generate and load the end-to-end profile
//! pyxis --task-name populate-db --data-configuration e2e
//!
//! # Only write batch files, without touching any database
//! pyxis --task-name generate-only --data-configuration benchmark --fixture-task-types
//!
//! # Load batch files written earlier
//! pyxis --task-name upload-only --data-configuration benchmark --output-dir /data/tsv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::orchestrator::{Orchestrator, RunReport, Task};
use crate::settings::Settings;

/// Pyxis performance sandbox data population
#[derive(Parser, Debug)]
#[command(name = "pyxis")]
#[command(about = "Generate and bulk-load performance test data for polaris, vela and carina")]
#[command(version)]
pub struct Cli {
    /// Task to run: populate-db, generate-only or upload-only
    #[arg(long, default_value = "populate-db")]
    pub task_name: String,

    /// Volume profile name
    #[arg(long, env = "PYXIS_DATA_CONFIGURATION")]
    pub data_configuration: String,

    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "PYXIS_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Batch file directory (overrides settings)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum rows per batch file (overrides settings)
    #[arg(long)]
    pub batch_size: Option<u64>,

    /// Seed for reproducible output (overrides settings)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use built-in task type registrations instead of querying the databases
    #[arg(long)]
    pub fixture_task_types: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved CLI invocation
pub struct CliRunner {
    task: Task,
    orchestrator: Orchestrator,
}

impl CliRunner {
    /// Resolve settings, profile and task. Unknown names fail here, before
    /// any work starts.
    pub fn new(args: &Cli) -> Result<Self> {
        let task: Task = args.task_name.parse()?;

        let mut settings =
            Settings::load(args.config.as_deref()).context("Failed to load settings")?;
        if let Some(output_dir) = &args.output_dir {
            settings.generation.output_dir = output_dir.clone();
        }
        if let Some(batch_size) = args.batch_size {
            settings.generation.batch_size = batch_size;
        }
        if args.seed.is_some() {
            settings.generation.seed = args.seed;
        }
        if args.fixture_task_types {
            settings.generation.fixture_task_types = true;
        }
        settings.validate()?;

        let profile = settings
            .profile_catalog()
            .get(&args.data_configuration)?
            .clone();

        Ok(Self {
            task,
            orchestrator: Orchestrator::from_settings(settings, profile),
        })
    }

    pub async fn run(&self) -> Result<RunReport> {
        let report = self
            .orchestrator
            .run(self.task)
            .await
            .with_context(|| format!("{} failed", self.task))?;

        if let Some(generation) = &report.generation {
            info!(
                "Generation finished: {} rows, {} files, seed {}",
                generation.rows(),
                generation.files(),
                generation.seed
            );
        }
        if let Some(load) = &report.load {
            let rows: u64 = load.iter().map(|service| service.rows()).sum();
            info!("Load finished: {} rows into {} databases", rows, load.len());
        }

        Ok(report)
    }
}

/// Install the stderr subscriber, `RUST_LOG` taking precedence
pub fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "pyxis={},pyxis_data_population={},pyxis_database={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
