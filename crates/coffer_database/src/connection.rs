//! Database connection utilities.

use crate::DatabaseResult;
use coffer_error::{DatabaseError, DatabaseErrorKind};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pooled PostgreSQL connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

fn database_url() -> DatabaseResult<String> {
    std::env::var("DATABASE_URL").map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Connection(
            "DATABASE_URL environment variable not set".to_string(),
        ))
    })
}

/// Establish a connection to the PostgreSQL database.
///
/// Reads the `DATABASE_URL` environment variable to determine the connection string.
///
/// # Errors
///
/// Returns an error if:
/// - `DATABASE_URL` environment variable is not set
/// - Connection to the database fails
pub fn establish_connection() -> DatabaseResult<PgConnection> {
    PgConnection::establish(&database_url()?)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))
}

/// Create a connection pool for `DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if the variable is missing or no connection can be made.
pub fn create_pool(max_size: u32) -> DatabaseResult<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url()?);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to create connection pool: {}",
                e
            )))
        })?;
    tracing::info!(max_size, "Created connection pool");
    Ok(pool)
}

/// Run pending migrations.
pub fn run_migrations(conn: &mut PgConnection) -> DatabaseResult<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;
    tracing::info!(count = applied.len(), "Applied migrations");
    Ok(())
}

/// Run a blocking database call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> DatabaseResult<T>
where
    F: FnOnce() -> DatabaseResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        DatabaseError::new(DatabaseErrorKind::Connection(format!(
            "Task join error: {}",
            e
        )))
    })?
}

/// Check out a pooled connection inside a blocking call.
pub(crate) fn checkout(
    pool: &PgPool,
) -> DatabaseResult<diesel::r2d2::PooledConnection<ConnectionManager<PgConnection>>> {
    pool.get().map_err(|e| {
        DatabaseError::new(DatabaseErrorKind::Connection(format!(
            "Failed to get connection from pool: {}",
            e
        )))
    })
}
