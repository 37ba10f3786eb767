use std::time::Duration;

use diesel::{
    SqliteConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
};
use diesel_migrations::MigrationHarness;

use crate::MIGRATIONS;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Any failure reported by the backing store. These are distinct from
/// validation and lifecycle errors: the operation may well succeed if it is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceFailure {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("could not obtain a database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("could not run database migrations: {0}")]
    Migration(String),
    #[error("stored data could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unexpected value `{value}` in column `{column}`")]
    InvalidColumn { column: &'static str, value: String },
    #[error("the store did not respond within {0:?}")]
    Timeout(Duration),
    #[error("the database task failed: {0}")]
    Task(String),
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionCustomizer
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds a connection pool for `db_url` and brings the schema up to date.
///
/// In-memory databases are private to a single connection, so the pool is
/// limited to one connection in that case.
#[tracing::instrument]
pub fn make_pool(
    db_url: &str,
    max_size: Option<u32>,
) -> Result<DbPool, PersistenceFailure> {
    let max_size = if db_url == ":memory:" {
        1
    } else {
        max_size.unwrap_or(10)
    };

    let pool: DbPool = Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionCustomizer))
        .build(ConnectionManager::<SqliteConnection>::new(db_url))?;

    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| PersistenceFailure::Migration(e.to_string()))?;
    tracing::debug!(count = applied.len(), "applied migrations");

    drop(conn);
    Ok(pool)
}
