//! ODA access for the PTT services.
//!
//! The handlers only ever see the [`Oda`] and [`UnitOfWork`] traits. Two
//! backends implement them: [`PgOda`] over a sqlx Postgres pool and
//! [`MemoryOda`], a process-local store used for development and tests.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod postgres;
pub mod uow;

pub use error::{OdaError, OdaResult};
pub use memory::MemoryOda;
pub use postgres::PgOda;
pub use uow::{latest_status, EntityRepository, Oda, StatusHistoryRepository, UnitOfWork};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
