//! The shared PostgreSQL pool.
//!
//! # Responsibilities
//! - Build the process-wide connection pool from configuration
//! - Close it when the lifecycle coordinator releases it
//!
//! # Design Decisions
//! - The pool connects lazily, so the server starts even while the
//!   database is still coming up; the first query pays the connect
//! - Schema and queries belong to the route groups, not here

use std::time::Duration;

use futures_util::future::BoxFuture;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::lifecycle::resource::{Resource, ResourceError};

/// Connection pool shared by every route group.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Configure the pool without opening a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;

        tracing::info!(
            max_connections = config.max_connections,
            "Database pool configured"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Resource for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    fn release(&self) -> BoxFuture<'_, Result<(), ResourceError>> {
        Box::pin(async move {
            // Waits for checked-out connections to come back, then closes them.
            self.pool.close().await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::resource::ResourceHandle;

    #[tokio::test]
    async fn test_lazy_pool_releases_without_server() {
        let database = Database::connect_lazy(&DatabaseConfig::default()).unwrap();
        let handle = ResourceHandle::new(database);

        assert!(handle.release().await.is_ok());
        assert!(matches!(
            handle.acquire().await,
            Err(ResourceError::Released { name: "database" })
        ));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = DatabaseConfig {
            url: "not a url".into(),
            ..DatabaseConfig::default()
        };
        assert!(Database::connect_lazy(&config).is_err());
    }
}
