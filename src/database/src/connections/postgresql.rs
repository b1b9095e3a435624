//! PostgreSQL connection pool for one service database

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::{DatabaseError, PostgresConfig};
use crate::Service;

/// PostgreSQL connection manager bound to a single service database
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
    service: Service,
}

impl PostgresConnection {
    /// Create new PostgreSQL connection pool for `service`
    pub async fn new(config: &PostgresConfig, service: Service) -> Result<Self, DatabaseError> {
        let url = config.url_for(service)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
            .connect(&url)
            .await
            .map_err(DatabaseError::Postgres)?;

        // Test the connection
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::Postgres)?;

        info!(
            "PostgreSQL connection pool for {} created successfully",
            service
        );

        Ok(Self { pool, service })
    }

    /// Get connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close connection pool
    pub async fn close(&self) {
        info!("Closing PostgreSQL connection pool for {}", self.service);
        self.pool.close().await;
    }
}
