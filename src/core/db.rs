use anyhow::{Context, Result, anyhow};
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

use crate::core::{
    aliases::{DbConnectionManager, DbPool},
    config::DatabaseConfig,
};

/// Builds the bb8 connection pool used by every handler.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let manager = DbConnectionManager::new(&config.url);
    let pool = DbPool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .await
        .context("Failed to build DB connection pool")?;

    Ok(pool)
}

/// Builds a pool that only connects when a connection is first requested.
pub fn create_lazy_pool(config: &DatabaseConfig) -> DbPool {
    let manager = DbConnectionManager::new(&config.url);
    DbPool::builder()
        .max_size(config.max_connections)
        .build_unchecked(manager)
}

/// Runs pending migrations on a blocking thread and returns how many were applied.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = PgConnection::establish(&database_url)
            .context("Failed to connect to the database for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow!("Failed to run migrations: {err}"))?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
