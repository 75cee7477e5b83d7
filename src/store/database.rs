use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::Result;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens the SQLite pool, creating the database file when missing.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    // Every connection to `sqlite::memory:` is a separate database.
    let max_connections = if config.url.contains(":memory:") {
        1
    } else {
        config.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(config.min_connections.min(max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .connect_with(options)
        .await?;

    tracing::debug!(url = %config.url, max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: 5,
    };
    let pool = connect(&config).await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}
