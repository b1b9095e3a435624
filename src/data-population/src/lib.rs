//! Fixture generation and bulk loading for the Pyxis performance sandbox
//!
//! A run turns a named volume profile into tab-delimited batch files for
//! the vela, carina and polaris databases, then bulk-loads them in foreign
//! key order. Every table generator is addressable by id range, so large
//! tables are written in bounded batches that still agree with each other on
//! every cross-table reference.

pub mod cli;
pub mod error;
pub mod fixtures;
pub mod generators;
pub mod ids;
pub mod orchestrator;
pub mod planner;
pub mod profiles;
pub mod refs;
pub mod rows;
pub mod seeds;
pub mod settings;
pub mod writer;

pub use error::{ConfigError, GenerationError, PopulationError, Result, WriteError};
pub use generators::{generators_for, GenerationContext, TableGenerator};
pub use ids::{IdAllocator, IdRange};
pub use orchestrator::{GenerationReport, Orchestrator, RunReport, Task};
pub use planner::plan_batches;
pub use profiles::{LoyaltyType, ProfileCatalog, VolumeProfile};
pub use rows::{Row, Value};
pub use settings::Settings;
pub use writer::{BatchWriter, ExecutionOrder};
