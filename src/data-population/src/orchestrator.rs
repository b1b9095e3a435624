//! Run orchestration
//!
//! A run generates every table of every service into the output directory,
//! then loads the directory into the service databases. The two halves only
//! share the batch files, so either can run on its own.

use chrono::Utc;
use futures::future::try_join_all;
use pyxis_database::{
    BatchDirectory, CachedTaskTypeSource, ConnectionFactory, LoadPipeline, PgTaskTypeSource,
    Service, ServiceLoadReport, TaskTypeMetadata, TaskTypeSource,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{ConfigError, GenerationError, Result};
use crate::fixtures::FixtureTaskTypeSource;
use crate::generators::{generators_for, GenerationContext};
use crate::planner::plan_batches;
use crate::profiles::VolumeProfile;
use crate::settings::Settings;
use crate::writer::{clear_output_dir, BatchWriter, ExecutionOrder};

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Generate batch files, then load them
    PopulateDb,
    GenerateOnly,
    /// Load the batch files already in the output directory
    UploadOnly,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::PopulateDb => "populate-db",
            Task::GenerateOnly => "generate-only",
            Task::UploadOnly => "upload-only",
        }
    }

    fn generates(&self) -> bool {
        matches!(self, Task::PopulateDb | Task::GenerateOnly)
    }

    fn loads(&self) -> bool {
        matches!(self, Task::PopulateDb | Task::UploadOnly)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "populate-db" => Ok(Task::PopulateDb),
            "generate-only" => Ok(Task::GenerateOnly),
            "upload-only" => Ok(Task::UploadOnly),
            other => Err(ConfigError::UnknownTask(other.to_string())),
        }
    }
}

/// Outcome of generating one table
#[derive(Debug, Clone)]
pub struct TableGenerationReport {
    pub service: Service,
    pub table: &'static str,
    pub rows: u64,
    pub files: usize,
    pub elapsed: Duration,
}

/// Outcome of the generation half of a run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub seed: u64,
    pub tables: Vec<TableGenerationReport>,
    pub elapsed: Duration,
}

impl GenerationReport {
    pub fn rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }

    pub fn files(&self) -> usize {
        self.tables.iter().map(|table| table.files).sum()
    }

    pub fn table(&self, service: Service, name: &str) -> Option<&TableGenerationReport> {
        self.tables
            .iter()
            .find(|table| table.service == service && table.table == name)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub generation: Option<GenerationReport>,
    pub load: Option<Vec<ServiceLoadReport>>,
}

/// Drives generation and loading for one volume profile
pub struct Orchestrator {
    settings: Settings,
    profile: VolumeProfile,
    task_types: Arc<dyn TaskTypeSource>,
}

impl Orchestrator {
    pub fn new(settings: Settings, profile: VolumeProfile, task_types: Arc<dyn TaskTypeSource>) -> Self {
        Self {
            settings,
            profile,
            task_types,
        }
    }

    /// Orchestrator reading task types from the service databases, or from
    /// the built-in registrations when `generation.fixture_task_types` is set
    pub fn from_settings(settings: Settings, profile: VolumeProfile) -> Self {
        let task_types: Arc<dyn TaskTypeSource> = if settings.generation.fixture_task_types {
            Arc::new(FixtureTaskTypeSource)
        } else {
            let factory = ConnectionFactory::new(settings.database.clone());
            Arc::new(CachedTaskTypeSource::new(PgTaskTypeSource::new(factory)))
        };
        Self::new(settings, profile, task_types)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn run(&self, task: Task) -> Result<RunReport> {
        info!("Running {}", task);
        let mut report = RunReport::default();

        if task.generates() {
            report.generation = Some(self.generate().await?);
        }
        if task.loads() {
            report.load = Some(self.load().await?);
        }

        Ok(report)
    }

    /// Generate batch files for all services into the output directory
    pub async fn generate(&self) -> Result<GenerationReport> {
        let start_time = Instant::now();
        let generation = &self.settings.generation;
        let seed = generation.seed.unwrap_or_else(rand::random);
        info!("Generating with seed {}", seed);

        let mut task_types = BTreeMap::new();
        for service in Service::LOAD_ORDER {
            let metadata: TaskTypeMetadata = self.task_types.fetch(service).await?;
            debug!("{} has {} task types", service, metadata.len());
            task_types.insert(service, metadata);
        }

        let profile = self.profile.clone();
        let ctx = tokio::task::spawn_blocking(move || {
            GenerationContext::build(profile, &task_types, seed, Utc::now())
        })
        .await??;
        let ctx = Arc::new(ctx);
        info!("Reference index built in {}ms", start_time.elapsed().as_millis());

        // Files of the previous run stay loadable until generation can start
        let removed = clear_output_dir(&generation.output_dir).await?;
        if removed > 0 {
            info!("Removed {} batch files of a previous run", removed);
        }

        let writer = Arc::new(BatchWriter::new(generation.output_dir.clone()));
        let order = Arc::new(ExecutionOrder::default());
        let batch_size = generation.batch_size;

        let spawn_service = |service: Service| {
            let ctx = Arc::clone(&ctx);
            let writer = Arc::clone(&writer);
            let order = Arc::clone(&order);
            tokio::task::spawn_blocking(move || generate_service(service, &ctx, &writer, &order, batch_size))
        };

        let mut tables = Vec::new();
        if generation.parallel_services {
            let handles = Service::LOAD_ORDER.iter().map(|service| spawn_service(*service));
            for service_tables in try_join_all(handles).await? {
                tables.extend(service_tables?);
            }
        } else {
            for service in Service::LOAD_ORDER {
                tables.extend(spawn_service(service).await??);
            }
        }

        let report = GenerationReport {
            seed,
            tables,
            elapsed: start_time.elapsed(),
        };
        info!(
            "Generated {} rows in {} batch files in {}ms",
            report.rows(),
            report.files(),
            report.elapsed.as_millis()
        );
        Ok(report)
    }

    /// Load the output directory into the service databases
    pub async fn load(&self) -> Result<Vec<ServiceLoadReport>> {
        let batches = BatchDirectory::scan(&self.settings.generation.output_dir).await?;
        let factory = ConnectionFactory::new(self.settings.database.clone());
        let pipeline = LoadPipeline::new(factory, self.settings.load.clone());
        Ok(pipeline.load_all(&batches).await?)
    }
}

/// Generate the tables of one service in catalog order. Blocking.
pub fn generate_service(
    service: Service,
    ctx: &GenerationContext,
    writer: &BatchWriter,
    order: &ExecutionOrder,
    batch_size: u64,
) -> Result<Vec<TableGenerationReport>> {
    let mut reports = Vec::new();

    for generator in generators_for(service) {
        let start_time = Instant::now();
        let table = generator.table();
        let ranges = plan_batches(generator.base_count(ctx), generator.total_rows(ctx), batch_size);
        let batched = ranges.len() > 1;

        let mut rows = 0;
        for (index, range) in ranges.iter().enumerate() {
            let batch_index = if batched {
                let index = u32::try_from(index + 1).map_err(|_| {
                    GenerationError::InconsistentProfile(format!("too many batches for {}", table.name))
                })?;
                Some(index)
            } else {
                None
            };

            let batch = generator.generate(*range, ctx)?;
            let written = writer.write(service, table, batch_index, order, &batch)?;
            rows += written.rows as u64;
        }

        let report = TableGenerationReport {
            service,
            table: table.name,
            rows,
            files: ranges.len(),
            elapsed: start_time.elapsed(),
        };
        info!(
            "Generated {}.{}: {} rows in {} files in {}ms",
            service,
            table.name,
            report.rows,
            report.files,
            report.elapsed.as_millis()
        );
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::context;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_task_names() {
        for task in [Task::PopulateDb, Task::GenerateOnly, Task::UploadOnly] {
            assert_eq!(task.as_str().parse::<Task>().unwrap(), task);
        }
        assert!(matches!(
            "drop-everything".parse::<Task>(),
            Err(ConfigError::UnknownTask(_))
        ));
        assert!(Task::PopulateDb.generates() && Task::PopulateDb.loads());
        assert!(!Task::GenerateOnly.loads());
        assert!(!Task::UploadOnly.generates());
    }

    #[test]
    fn test_generate_service_batches_large_tables() {
        let dir = TempDir::new().unwrap();
        let ctx = context();
        let writer = BatchWriter::new(dir.path());
        let order = ExecutionOrder::default();

        let reports = generate_service(Service::Vela, &ctx, &writer, &order, 10).unwrap();

        let transactions = reports.iter().find(|report| report.table == "transaction").unwrap();
        assert_eq!(transactions.rows, 30);
        assert_eq!(transactions.files, 3);

        let campaigns = reports.iter().find(|report| report.table == "campaign").unwrap();
        assert_eq!(campaigns.files, 1);

        assert!(dir.path().join("tsv-vela-1-retailer_rewards.tsv").is_file());
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, reports.iter().map(|report| report.files).sum::<usize>());
    }
}
