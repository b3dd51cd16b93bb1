//! PostgreSQL integration for Coffer.
//!
//! This crate provides the diesel-backed collaborators that the storage
//! backends talk to: the relational blob column, repository node identifiers,
//! recorded content info and persisted store definitions.
//!
//! Writes that belong to a unit of work go through an [`AmbientConnection`],
//! so they commit or roll back together with the caller's database
//! transaction. Store definitions are read through a connection pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use coffer_database::{AmbientConnection, PgBlobTable, PgObjectProperties};
//! use coffer_storage::BackendContext;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ambient = AmbientConnection::establish()?;
//! let context = BackendContext::new(Arc::new(PgObjectProperties::new(ambient.clone())))
//!     .with_blob_table(Arc::new(PgBlobTable::new(ambient.clone())));
//!
//! ambient.begin().await?;
//! // Write through resources created with `context`, then:
//! ambient.commit().await?;
//! # Ok(())
//! # }
//! ```

mod ambient;
mod blob_table;
mod connection;
mod models;
mod node_identifiers;
mod object_properties;
mod store_source;

pub mod schema;

pub use ambient::AmbientConnection;
pub use blob_table::PgBlobTable;
pub use connection::{PgPool, create_pool, establish_connection, run_migrations};
pub use models::{ContentInfoRow, ContentNodeRow, StorePropertyRow, StoreRow};
pub use node_identifiers::PgNodeIdentifiers;
pub use object_properties::PgObjectProperties;
pub use store_source::PgStoreSource;

use coffer_error::DatabaseError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
