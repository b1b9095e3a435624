//! Database layer for the Pyxis performance sandbox
//!
//! This crate owns everything that touches the target service databases:
//! the catalog of services and the tables each one receives, connection
//! pooling, the naming convention of generated batch files, the bulk-load
//! pipeline (truncate, copy, sequence resync) and the live task-type
//! metadata lookups used while generating retry-task fixtures.

pub mod batch_files;
pub mod connections;
pub mod loader;
pub mod sequences;
pub mod services;
pub mod task_types;

use std::path::{Path, PathBuf};

// Re-export specific items to avoid ambiguity
pub use batch_files::{BatchDirectory, BatchFile, BatchFileName, DELIMITER, NULL_SENTINEL};
pub use connections::{ConnectionFactory, PostgresConfig, PostgresConnection, ServiceDatabases};
pub use loader::{LoadConfig, LoadPipeline, LoadStep, ServiceLoadReport, TableLoadReport};
pub use sequences::{primary_key_column, sequence_name};
pub use services::{Service, TableSpec};
pub use task_types::{
    CachedTaskTypeSource, KeyValueType, PgTaskTypeSource, TaskType, TaskTypeKey, TaskTypeMetadata,
    TaskTypeSource,
};

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Common database error types
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Malformed batch file name: {0}")]
    BatchFileName(String),

    #[error("{service}.{table}: {step} failed{}: {source}", describe_file(.file))]
    TableLoad {
        service: Service,
        table: String,
        step: LoadStep,
        file: Option<PathBuf>,
        #[source]
        source: sqlx::Error,
    },

    #[error("{service}.{table}: load did not finish within {timeout_secs}s")]
    Timeout {
        service: Service,
        table: String,
        timeout_secs: u64,
    },

    #[error("Task type metadata error ({service}): {message}")]
    TaskTypes { service: Service, message: String },
}

impl DatabaseError {
    /// Wrap a driver error with the service/table/file it happened on.
    pub(crate) fn table_load(
        service: Service,
        table: &str,
        step: LoadStep,
        file: Option<&Path>,
        source: sqlx::Error,
    ) -> Self {
        Self::TableLoad {
            service,
            table: table.to_string(),
            step,
            file: file.map(Path::to_path_buf),
            source,
        }
    }
}

fn describe_file(file: &Option<PathBuf>) -> String {
    file.as_ref()
        .map(|path| format!(" ({})", path.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_load_error_carries_context() {
        let error = DatabaseError::table_load(
            Service::Carina,
            "reward",
            LoadStep::Copy,
            Some(Path::new("tsv/tsv-carina-4-reward.tsv")),
            sqlx::Error::RowNotFound,
        );

        let message = error.to_string();
        assert!(message.starts_with("carina.reward: copy failed (tsv/tsv-carina-4-reward.tsv)"));
    }

    #[test]
    fn test_table_load_error_without_file() {
        let error = DatabaseError::table_load(
            Service::Polaris,
            "account_holder",
            LoadStep::Truncate,
            None,
            sqlx::Error::RowNotFound,
        );

        assert!(error
            .to_string()
            .starts_with("polaris.account_holder: truncate failed: "));
    }
}
