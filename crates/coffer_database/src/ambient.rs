//! The caller's ambient database transaction.

use crate::DatabaseResult;
use crate::connection::{blocking, establish_connection};
use coffer_error::{DatabaseError, DatabaseErrorKind};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use std::sync::{Arc, Mutex};

/// A single connection shared by every collaborator taking part in a unit
/// of work.
///
/// Relational blob updates, node identifiers and content info are written on
/// this connection, so they commit or abort together with the surrounding
/// database transaction.
#[derive(Clone)]
pub struct AmbientConnection {
    conn: Arc<Mutex<PgConnection>>,
}

impl AmbientConnection {
    /// Wrap an established connection.
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Connect using `DATABASE_URL`.
    pub fn establish() -> DatabaseResult<Self> {
        Ok(Self::new(establish_connection()?))
    }

    /// Run a closure against the connection on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                DatabaseError::new(DatabaseErrorKind::Connection(
                    "ambient connection lock poisoned".to_string(),
                ))
            })?;
            f(&mut *guard)
        })
        .await
    }

    /// Begin the ambient transaction.
    #[tracing::instrument(skip(self))]
    pub async fn begin(&self) -> DatabaseResult<()> {
        self.run(|conn| {
            AnsiTransactionManager::begin_transaction(conn)
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Transaction(e.to_string())))
        })
        .await?;
        tracing::debug!("Began ambient transaction");
        Ok(())
    }

    /// Commit the ambient transaction.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self) -> DatabaseResult<()> {
        self.run(|conn| {
            AnsiTransactionManager::commit_transaction(conn)
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Transaction(e.to_string())))
        })
        .await?;
        tracing::info!("Committed ambient transaction");
        Ok(())
    }

    /// Roll back the ambient transaction.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(&self) -> DatabaseResult<()> {
        self.run(|conn| {
            AnsiTransactionManager::rollback_transaction(conn)
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Transaction(e.to_string())))
        })
        .await?;
        tracing::warn!("Rolled back ambient transaction");
        Ok(())
    }
}

impl std::fmt::Debug for AmbientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientConnection").finish_non_exhaustive()
    }
}
