//! Bulk-load pipeline
//!
//! For each service, tables are loaded strictly in catalog order. Per table,
//! on one dedicated connection and in autocommit:
//!
//! 1. `TRUNCATE "<table>" CASCADE`
//! 2. `COPY "<table>" (<columns>) FROM STDIN` for every batch file
//! 3. resync the primary-key sequence
//! 4. optionally `VACUUM ANALYZE "<table>"`
//!
//! A failure aborts the table with its service, table and file attached.
//! Tables loaded before the failure stay loaded.
//!
//! The optional per-table timeout is checked between steps and between
//! batch files. A running statement is never cancelled, so a table that runs
//! out of time is left truncated and partly loaded.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgConnection};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::batch_files::{BatchDirectory, BatchFile, NULL_SENTINEL};
use crate::connections::ConnectionFactory;
use crate::sequences::resync_sequence;
use crate::services::{Service, TableSpec};
use crate::{DatabaseError, Result};

/// Load behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Run `VACUUM ANALYZE` on every table after it is loaded
    pub vacuum: bool,
    /// Load the services concurrently instead of one after another
    pub parallel_services: bool,
    /// Upper bound for the whole load sequence of a single table
    pub table_timeout_seconds: Option<u64>,
}

/// Step of a table load, used to tag errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    Connect,
    Truncate,
    Copy,
    Resync,
    Vacuum,
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            LoadStep::Connect => "connect",
            LoadStep::Truncate => "truncate",
            LoadStep::Copy => "copy",
            LoadStep::Resync => "resync",
            LoadStep::Vacuum => "vacuum",
        };
        f.write_str(step)
    }
}

/// Outcome of loading one table
#[derive(Debug, Clone)]
pub struct TableLoadReport {
    pub table: &'static str,
    pub files: usize,
    pub rows: u64,
    /// Value the next insert receives, `None` when the table has no sequence
    pub next_id: Option<i64>,
    pub elapsed: Duration,
}

/// Outcome of loading one service database
#[derive(Debug, Clone)]
pub struct ServiceLoadReport {
    pub service: Service,
    pub tables: Vec<TableLoadReport>,
    pub elapsed: Duration,
}

impl ServiceLoadReport {
    pub fn rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableLoadReport> {
        self.tables.iter().find(|table| table.table == name)
    }
}

/// Loads a directory of batch files into the service databases
pub struct LoadPipeline {
    factory: ConnectionFactory,
    config: LoadConfig,
}

impl LoadPipeline {
    pub fn new(factory: ConnectionFactory, config: LoadConfig) -> Self {
        Self { factory, config }
    }

    /// Load every service in `Service::LOAD_ORDER`, or all at once when
    /// `parallel_services` is set.
    pub async fn load_all(&self, batches: &BatchDirectory) -> Result<Vec<ServiceLoadReport>> {
        info!(
            "Loading {} batch files from {}",
            batches.len(),
            batches.root().display()
        );

        if self.config.parallel_services {
            return try_join_all(
                Service::LOAD_ORDER
                    .iter()
                    .map(|service| self.load_service(*service, batches)),
            )
            .await;
        }

        let mut reports = Vec::with_capacity(Service::LOAD_ORDER.len());
        for service in Service::LOAD_ORDER {
            reports.push(self.load_service(service, batches).await?);
        }
        Ok(reports)
    }

    /// Load all tables of one service, in catalog order
    pub async fn load_service(
        &self,
        service: Service,
        batches: &BatchDirectory,
    ) -> Result<ServiceLoadReport> {
        let start_time = Instant::now();
        let connection = self.factory.connect(service).await?;
        let mut tables = Vec::with_capacity(service.tables().len());

        for spec in service.tables() {
            let files = batches.files_for(service, spec.name);
            if files.is_empty() {
                warn!("No batch files for {}.{}", service, spec.name);
            }

            let mut conn = connection
                .pool()
                .acquire()
                .await
                .map_err(|e| DatabaseError::table_load(service, spec.name, LoadStep::Connect, None, e))?;

            let timeout = self.config.table_timeout_seconds.map(Duration::from_secs);
            let report =
                load_table_within(&mut conn, service, spec, &files, self.config.vacuum, timeout)
                    .await?;

            info!(
                "Loaded {}.{}: {} rows from {} files in {}ms",
                service,
                spec.name,
                report.rows,
                report.files,
                report.elapsed.as_millis()
            );
            tables.push(report);
        }

        connection.close().await;

        let report = ServiceLoadReport {
            service,
            tables,
            elapsed: start_time.elapsed(),
        };
        info!(
            "Loaded {} rows into {} in {}ms",
            report.rows(),
            service,
            report.elapsed.as_millis()
        );
        Ok(report)
    }
}

/// Truncate, copy, resync and optionally vacuum one table
pub async fn load_table(
    conn: &mut PgConnection,
    service: Service,
    spec: &'static TableSpec,
    files: &[&BatchFile],
    vacuum: bool,
) -> Result<TableLoadReport> {
    load_table_within(conn, service, spec, files, vacuum, None).await
}

/// [`load_table`] with a time budget, checked before each statement
pub async fn load_table_within(
    conn: &mut PgConnection,
    service: Service,
    spec: &'static TableSpec,
    files: &[&BatchFile],
    vacuum: bool,
    timeout: Option<Duration>,
) -> Result<TableLoadReport> {
    let start_time = Instant::now();
    let fail = |step: LoadStep| move |e| DatabaseError::table_load(service, spec.name, step, None, e);
    let check_deadline = || within_budget(service, spec.name, start_time, timeout);

    check_deadline()?;

    let truncate = format!("TRUNCATE \"{}\" CASCADE", spec.name);
    Executor::execute(&mut *conn, truncate.as_str())
        .await
        .map_err(fail(LoadStep::Truncate))?;
    debug!("Truncated {}.{}", service, spec.name);

    let statement = copy_statement(spec);
    let mut rows = 0;
    for file in files {
        check_deadline()?;
        rows += copy_file(conn, &statement, file)
            .await
            .map_err(|e| {
                DatabaseError::table_load(service, spec.name, LoadStep::Copy, Some(file.path.as_path()), e)
            })?;
        debug!("Copied {} into {}.{}", file.name, service, spec.name);
    }

    check_deadline()?;
    let next_id = resync_sequence(conn, spec.name)
        .await
        .map_err(fail(LoadStep::Resync))?;
    if next_id.is_none() {
        debug!("{}.{} has no id sequence", service, spec.name);
    }

    if vacuum {
        check_deadline()?;
        let vacuum = format!("VACUUM ANALYZE \"{}\"", spec.name);
        Executor::execute(&mut *conn, vacuum.as_str())
            .await
            .map_err(fail(LoadStep::Vacuum))?;
    }

    Ok(TableLoadReport {
        table: spec.name,
        files: files.len(),
        rows,
        next_id,
        elapsed: start_time.elapsed(),
    })
}

/// Fail with `Timeout` once `timeout` has elapsed since `start_time`
fn within_budget(
    service: Service,
    table: &str,
    start_time: Instant,
    timeout: Option<Duration>,
) -> Result<()> {
    match timeout {
        Some(timeout) if start_time.elapsed() >= timeout => Err(DatabaseError::Timeout {
            service,
            table: table.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
        _ => Ok(()),
    }
}

/// `COPY ... FROM STDIN` statement matching the batch file encoding
pub fn copy_statement(spec: &TableSpec) -> String {
    format!(
        "COPY \"{}\" ({}) FROM STDIN WITH (FORMAT text, DELIMITER E'\\t', NULL '{}')",
        spec.name,
        spec.column_list(),
        NULL_SENTINEL
    )
}

async fn copy_file(
    conn: &mut PgConnection,
    statement: &str,
    file: &BatchFile,
) -> std::result::Result<u64, sqlx::Error> {
    let source = tokio::fs::File::open(&file.path).await?;
    let mut copy = conn.copy_in_raw(statement).await?;
    let streamed = copy.read_from(source).await.map(|_| ());
    if let Err(e) = streamed {
        copy.abort(e.to_string()).await?;
        return Err(e);
    }
    copy.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RETAILER_REWARDS;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_statement(&RETAILER_REWARDS),
            "COPY \"retailer_rewards\" (\"id\", \"slug\") FROM STDIN WITH (FORMAT text, DELIMITER E'\\t', NULL 'NULL')"
        );
    }

    #[test]
    fn test_time_budget() {
        let start_time = Instant::now();
        assert!(within_budget(Service::Vela, "campaign", start_time, None).is_ok());
        assert!(within_budget(Service::Vela, "campaign", start_time, Some(Duration::from_secs(3600))).is_ok());

        let spent = within_budget(Service::Vela, "campaign", start_time, Some(Duration::ZERO));
        match spent {
            Err(DatabaseError::Timeout { service, table, timeout_secs }) => {
                assert_eq!(service, Service::Vela);
                assert_eq!(table, "campaign");
                assert_eq!(timeout_secs, 0);
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_defaults() {
        let config = LoadConfig::default();
        assert!(!config.vacuum);
        assert!(!config.parallel_services);
        assert_eq!(config.table_timeout_seconds, None);
    }

    #[test]
    fn test_service_report_totals() {
        let report = ServiceLoadReport {
            service: Service::Carina,
            tables: vec![
                TableLoadReport {
                    table: "retailer",
                    files: 1,
                    rows: 2,
                    next_id: Some(3),
                    elapsed: Duration::ZERO,
                },
                TableLoadReport {
                    table: "reward",
                    files: 2,
                    rows: 4,
                    next_id: Some(5),
                    elapsed: Duration::ZERO,
                },
            ],
            elapsed: Duration::ZERO,
        };

        assert_eq!(report.rows(), 6);
        assert_eq!(report.table("reward").and_then(|t| t.next_id), Some(5));
    }
}
