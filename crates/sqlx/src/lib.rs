//! SQLx-based access stores for PostgreSQL and SQLite

mod base;
mod common;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "sqlite")]
mod sqlite;

// Re-export the base type for those who need the generic version
pub use base::SqlxAccessStore;

// Re-export database-specific types
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccessStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccessStore;

use std::sync::Arc;
use warden_core::{AccessStoreAdmin, Result};

/// Connect to the store named by `database_url`, running migrations
///
/// `postgres://` and `postgresql://` URLs select PostgreSQL; anything else
/// is handed to SQLite.
pub async fn connect(database_url: &str) -> Result<Arc<dyn AccessStoreAdmin>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        connect_postgres(database_url).await
    } else {
        connect_sqlite(database_url).await
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(database_url: &str) -> Result<Arc<dyn AccessStoreAdmin>> {
    Ok(Arc::new(PostgresAccessStore::connect(database_url).await?))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_database_url: &str) -> Result<Arc<dyn AccessStoreAdmin>> {
    Err(warden_core::Error::Config(
        "PostgreSQL support is not enabled in this build".to_string(),
    ))
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(database_url: &str) -> Result<Arc<dyn AccessStoreAdmin>> {
    Ok(Arc::new(SqliteAccessStore::connect(database_url).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn connect_sqlite(_database_url: &str) -> Result<Arc<dyn AccessStoreAdmin>> {
    Err(warden_core::Error::Config(
        "SQLite support is not enabled in this build".to_string(),
    ))
}
