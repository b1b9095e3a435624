//! Run settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (`--config` or `PYXIS_CONFIG_FILE`), then `PYXIS__SECTION__KEY`
//! environment variables.

use pyxis_database::{LoadConfig, PostgresConfig, Service};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::profiles::{ProfileCatalog, VolumeProfile};

pub const CONFIG_FILE_VAR: &str = "PYXIS_CONFIG_FILE";
pub const ENV_PREFIX: &str = "PYXIS";

/// Generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Directory receiving the batch files
    pub output_dir: PathBuf,
    /// Maximum number of rows per batch file
    pub batch_size: u64,
    /// Run seed, drawn at random when unset
    pub seed: Option<u64>,
    /// Generate the three services concurrently
    pub parallel_services: bool,
    /// Use the built-in task-type registrations instead of querying the
    /// service databases
    pub fixture_task_types: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tsv"),
            batch_size: 100_000,
            seed: None,
            parallel_services: true,
            fixture_task_types: false,
        }
    }
}

/// All settings of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: PostgresConfig,
    pub generation: GenerationSettings,
    pub load: LoadConfig,
    /// Additional or replacement volume profiles, by name
    pub profiles: BTreeMap<String, VolumeProfile>,
}

impl Settings {
    /// Load settings from `file` (or `PYXIS_CONFIG_FILE`) and the environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = config::Config::builder();

        // Load from file if specified
        let file = file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_FILE_VAR).ok().map(PathBuf::from));
        if let Some(file) = file {
            cfg = cfg.add_source(config::File::from(file));
        }

        // Load from environment variables
        cfg = cfg.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings: Self = cfg.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "generation.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections cannot exceed database.max_connections".to_string(),
            ));
        }

        for service in Service::LOAD_ORDER {
            self.database
                .url_for(service)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        if self.generation.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "generation.output_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Built-in profiles overlaid with the ones from the settings
    pub fn profile_catalog(&self) -> ProfileCatalog {
        ProfileCatalog::with_overrides(&self.profiles)
    }
}
