//! Database connection management for the target services
//!
//! Every service lives in its own PostgreSQL database on the same server.
//! The configured URL is either a template containing `{db}` or a plain
//! connection URL whose path is replaced with the service's database name.

pub mod postgresql;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{DatabaseError, Service};

// Re-export connection types
pub use postgresql::PostgresConnection;

/// Placeholder substituted with the service database name
pub const DATABASE_PLACEHOLDER: &str = "{db}";

/// Database name of each target service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceDatabases {
    pub polaris: String,
    pub vela: String,
    pub carina: String,
}

impl ServiceDatabases {
    pub fn name_for(&self, service: Service) -> &str {
        match service {
            Service::Polaris => &self.polaris,
            Service::Vela => &self.vela,
            Service::Carina => &self.carina,
        }
    }
}

impl Default for ServiceDatabases {
    fn default() -> Self {
        Self {
            polaris: "polaris".to_string(),
            vela: "vela".to_string(),
            carina: "carina".to_string(),
        }
    }
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
    pub databases: ServiceDatabases,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://postgres@localhost:5432/{db}".to_string(),
            max_connections: 4,
            min_connections: 1,
            acquire_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            max_lifetime_seconds: 1800,
            databases: ServiceDatabases::default(),
        }
    }
}

impl PostgresConfig {
    /// Connection URL for one service database
    pub fn url_for(&self, service: Service) -> Result<String, DatabaseError> {
        let database = self.databases.name_for(service);
        if database.is_empty() {
            return Err(DatabaseError::Connection(format!(
                "no database name configured for {service}"
            )));
        }

        if self.url.contains(DATABASE_PLACEHOLDER) {
            return Ok(self.url.replace(DATABASE_PLACEHOLDER, database));
        }

        let mut url = Url::parse(&self.url)
            .map_err(|e| DatabaseError::Connection(format!("invalid database URL: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(DatabaseError::Connection(format!(
                "database URL has no path to hold a database name: {}",
                self.url
            )));
        }
        url.set_path(&format!("/{database}"));
        Ok(url.to_string())
    }
}

/// Connection factory for creating per-service database connections
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    postgres_config: PostgresConfig,
}

impl ConnectionFactory {
    /// Create new connection factory
    pub fn new(postgres_config: PostgresConfig) -> Self {
        Self { postgres_config }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.postgres_config
    }

    /// Open a pool on the database of `service`
    pub async fn connect(&self, service: Service) -> Result<PostgresConnection, DatabaseError> {
        PostgresConnection::new(&self.postgres_config, service).await
    }
}
