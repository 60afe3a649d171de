pub mod error;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod repositories;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transaction;

pub use error::{DbError, Retryability, classify};
pub use models::{NewVehicle, Vehicle, VehiclePatch};
pub use pool::{Connection, ConnectionPool, QueryResult, Row, SqlValue};
pub use repositories::vehicle::VehicleRepository;
pub use transaction::RetryPolicy;

use anyhow::Context;
use sqlx::{
    PgPool, Postgres,
    migrate::MigrateDatabase,
    postgres::{PgConnectOptions, PgPoolOptions},
};

/// Create a PostgreSQL connection pool.
///
/// Every connection of the pool runs its transactions with `SERIALIZABLE`
/// isolation, which is what makes [`transaction::run`] retries meaningful.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let options = database_url
        .parse::<PgConnectOptions>()
        .context("invalid database url")?
        .options([("default_transaction_isolation", "serializable")]);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    Ok(pool)
}

/// Ensure the database exists and run migrations in this crate's `migrations/` folder.
pub async fn ensure_db_and_migrate(database_url: &str, pool: &PgPool) -> anyhow::Result<()> {
    // Ensure database exists (no-op if it already does)
    let exists = Postgres::database_exists(database_url).await?;
    if !exists {
        Postgres::create_database(database_url).await?;
    }

    // Run migrations bundled at compile time from `migrations/`
    sqlx::migrate!().run(pool).await?;

    Ok(())
}
