//! Coffer: transactional attachment storage.
//!
//! This crate ties the storage backends to layered configuration and exposes
//! a [`Coffer`] handle that runs each operation as its own unit of work.
//!
//! # Example
//!
//! ```rust,no_run
//! use coffer::{BackendContext, Coffer, CofferConfig, ObjectRef};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CofferConfig::load()?;
//! let coffer = Coffer::from_config(&config, BackendContext::in_memory())?;
//!
//! let data: &[u8] = b"quarterly report";
//! coffer
//!     .put("local", ObjectRef::from_ids(42, 7), Box::new(data), -1, "report.txt")
//!     .await?;
//!
//! let mut out = Vec::new();
//! coffer.get("local", ObjectRef::from_ids(42, 7), &mut out).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod observability;

pub use config::{CofferConfig, ConfigStoreSource, LoggingConfig, StoreConfig};
pub use observability::init_logging;
#[cfg(feature = "observability")]
pub use observability::{ObservabilityConfig, init_observability_with_config, shutdown_observability};

pub use coffer_core::{
    CompressMode, ObjectRef, Properties, StoreDefinition, StoreEvent, TransactionId, Vote,
};
pub use coffer_error::{CofferError, CofferErrorKind, CofferResult, ConfigError, StorageError, StorageErrorKind};
pub use coffer_storage::{
    BackendContext, ContentInfo, ContentReader, Resource, ResourceRegistry, StoreResolver,
    StoreSource, Transaction,
};

#[cfg(feature = "database")]
pub use coffer_database as database;

use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, info, instrument, warn};

/// Handle for storing and retrieving attachments by store name.
#[derive(Debug, Clone)]
pub struct Coffer {
    resolver: Arc<StoreResolver>,
}

impl Coffer {
    /// Wrap an existing resolver.
    pub fn new(resolver: StoreResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Build a handle over the stores named in configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid store entries.
    pub fn from_config(config: &CofferConfig, context: BackendContext) -> CofferResult<Self> {
        let source = Arc::new(ConfigStoreSource::new(config)?);
        let resolver = StoreResolver::new(source, ResourceRegistry::with_builtin(), context);
        Ok(Self::new(resolver))
    }

    /// Build a handle over stores persisted in PostgreSQL.
    ///
    /// Configured stores missing from the database are saved first, so a
    /// fresh database starts with the `[[stores]]` entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid store entries, or a database
    /// error when the stores cannot be read or saved.
    #[cfg(feature = "database")]
    #[instrument(skip_all)]
    pub async fn from_database(
        config: &CofferConfig,
        pool: coffer_database::PgPool,
        ambient: &coffer_database::AmbientConnection,
    ) -> CofferResult<Self> {
        let source = coffer_database::PgStoreSource::new(pool);
        for store in config.store_definitions()? {
            if source.load_by_id(*store.id()).await?.is_none() {
                source.save(&store).await?;
                info!(store = %store.name(), "Saved configured store");
            }
        }

        let resolver = StoreResolver::new(
            Arc::new(source),
            ResourceRegistry::with_builtin(),
            database_context(ambient),
        );
        Ok(Self::new(resolver))
    }

    /// The store resolver.
    pub fn resolver(&self) -> &StoreResolver {
        &self.resolver
    }

    /// Every configured store.
    pub async fn stores(&self) -> CofferResult<Vec<StoreDefinition>> {
        self.resolver.all().await
    }

    /// Store content for an object and commit it.
    ///
    /// Returns the number of content bytes stored.
    ///
    /// # Errors
    ///
    /// A failed write is rolled back and returned as is; a failed commit is
    /// returned as a commit failure.
    #[instrument(skip(self, data), fields(object = %object))]
    pub async fn put(
        &self,
        store: &str,
        object: ObjectRef,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<i64> {
        let mut resource = self.resolver.resource_by_name(store, object).await?;
        let written = match resource.write(data, size, file_name).await {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "Write failed, rolling back");
                discard(resource).await;
                return Err(e);
            }
        };

        let mut transaction = Transaction::new();
        transaction.enlist(resource);
        transaction.commit().await?;

        info!(bytes = written, "Stored content");
        Ok(written)
    }

    /// Copy the committed content of an object into `sink`.
    ///
    /// Returns the number of bytes copied, or `None` when nothing is stored.
    #[instrument(skip(self, sink), fields(object = %object))]
    pub async fn get(
        &self,
        store: &str,
        object: ObjectRef,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> CofferResult<Option<u64>> {
        let mut resource = self.resolver.resource_by_name(store, object).await?;
        match resource.read_into(sink).await {
            Ok(copied) => {
                resource.commit(&TransactionId::new(), true).await?;
                debug!(bytes = ?copied, "Read content");
                Ok(copied)
            }
            Err(e) => {
                discard(resource).await;
                Err(e)
            }
        }
    }

    /// Whether committed content exists for an object.
    #[instrument(skip(self), fields(object = %object))]
    pub async fn exists(&self, store: &str, object: ObjectRef) -> CofferResult<bool> {
        let mut resource = self.resolver.resource_by_name(store, object).await?;
        match resource.exists().await {
            Ok(found) => {
                resource.commit(&TransactionId::new(), true).await?;
                Ok(found)
            }
            Err(e) => {
                discard(resource).await;
                Err(e)
            }
        }
    }

    /// Recorded file name and length of an object's content.
    #[instrument(skip(self), fields(object = %object))]
    pub async fn info(&self, store: &str, object: ObjectRef) -> CofferResult<Option<ContentInfo>> {
        let mut resource = self.resolver.resource_by_name(store, object).await?;
        let info = resource.base_mut().content_info().await;
        discard(resource).await;
        info
    }

    /// Remove an object's content and commit the removal.
    #[instrument(skip(self), fields(object = %object))]
    pub async fn delete(&self, store: &str, object: ObjectRef) -> CofferResult<()> {
        let mut resource = self.resolver.resource_by_name(store, object).await?;
        if let Err(e) = resource.delete().await {
            discard(resource).await;
            return Err(e);
        }

        let mut transaction = Transaction::new();
        transaction.enlist(resource);
        transaction.commit().await?;

        info!("Deleted content");
        Ok(())
    }
}

async fn discard(mut resource: Box<dyn Resource>) {
    if resource.base().is_closed() {
        return;
    }
    if let Err(e) = resource.rollback(&TransactionId::new()).await {
        warn!(error = %e, "Rollback failed");
    }
}

/// Backend collaborators backed by PostgreSQL through an ambient connection.
///
/// Repository stores use an in-process repository; attach a real one with
/// [`BackendContext::with_repository`].
#[cfg(feature = "database")]
pub fn database_context(ambient: &coffer_database::AmbientConnection) -> BackendContext {
    use coffer_database::{PgBlobTable, PgNodeIdentifiers, PgObjectProperties};
    use coffer_storage::{DEFAULT_REPOSITORY, MemoryRepository};

    BackendContext::new(Arc::new(PgObjectProperties::new(ambient.clone())))
        .with_blob_table(Arc::new(PgBlobTable::new(ambient.clone())))
        .with_node_identifiers(Arc::new(PgNodeIdentifiers::new(ambient.clone())))
        .with_repository(DEFAULT_REPOSITORY, Arc::new(MemoryRepository::new()))
}
