//! Error types for fixture generation and loading
//!
//! Configuration problems are reported before any work starts, generation
//! invariant violations abort the run, write failures leave a batch
//! directory that has to be cleared and regenerated.

use pyxis_database::{DatabaseError, Service};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for population operations
pub type Result<T> = std::result::Result<T, PopulationError>;

/// Top level error of a population run
#[derive(Error, Debug)]
pub enum PopulationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Load error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Invalid or unknown settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown data configuration '{name}', available: {available}")]
    UnknownProfile { name: String, available: String },

    #[error("Unknown task '{0}', expected one of populate-db, generate-only, upload-only")]
    UnknownTask(String),

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Violations of the generation invariants
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{table}: range {start}..={stop} is outside 1..={max}")]
    InvalidRange {
        table: &'static str,
        start: u64,
        stop: u64,
        max: u64,
    },

    #[error("{pool} reward pool exhausted: requested #{requested}, pool holds {available}")]
    PoolExhausted {
        pool: &'static str,
        requested: u64,
        available: u64,
    },

    #[error("Inconsistent volume profile: {0}")]
    InconsistentProfile(String),

    #[error("{service} has no task type '{task_type}'")]
    MissingTaskType { service: Service, task_type: String },

    #[error("{table}: no {reference} for id {id}")]
    MissingReference {
        table: &'static str,
        reference: &'static str,
        id: u64,
    },
}

/// Batch file serialisation failures
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{table} row {row} column {column}: value contains a tab, newline, carriage return or backslash")]
    UnencodableField {
        table: String,
        row: usize,
        column: &'static str,
    },

    #[error("{table} row {row}: expected {expected} values, got {actual}")]
    ColumnMismatch {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
}
