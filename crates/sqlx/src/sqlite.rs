//! SQLite-specific implementation

use crate::base::SqlxAccessStore;
use sqlx::Sqlite;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use warden_core::{Error, Result};

/// SQLite implementation of the access store traits
pub type SqliteAccessStore = SqlxAccessStore<Sqlite>;

impl SqlxAccessStore<Sqlite> {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::StateError(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database sees its own empty
        // database, so keep exactly one alive for the life of the pool
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::StateError(format!("Failed to connect to database: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::StateError(format!("Failed to run migrations: {e}")))?;

        Ok(Self::from_pool(pool))
    }
}
