//! PostgreSQL-specific implementation

use crate::base::SqlxAccessStore;
use sqlx::Postgres;
use warden_core::{Error, Result};

/// PostgreSQL implementation of the access store traits
pub type PostgresAccessStore = SqlxAccessStore<Postgres>;

impl SqlxAccessStore<Postgres> {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect(database_url)
            .await
            .map_err(|e| Error::StateError(format!("Failed to connect to database: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::StateError(format!("Failed to run migrations: {e}")))?;

        Ok(Self::from_pool(pool))
    }
}
