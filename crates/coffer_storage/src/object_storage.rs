//! Remote object-storage backend.
//!
//! Each write is one PUT of the full payload, visible as soon as it returns.
//! The object key is the owning object's stable key.

use crate::registry::OBJECT_STORAGE_BACKEND;
use crate::{ContentReader, ObjectProperties, Resource, ResourceBase, keys};
use coffer_core::{ObjectRef, StoreDefinition, StoreEvent, TransactionId};
use coffer_error::{CofferResult, ConfigError, StorageError, StorageErrorKind};
use dashmap::DashMap;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Metadata attribute carrying the original file name.
pub const FILENAME_ATTRIBUTE: &str = "filename";

/// One object-store client per store id, created on first use.
///
/// Clones share the cache. Clients are never evicted.
#[derive(Debug, Clone, Default)]
pub struct ClientCache {
    clients: Arc<DashMap<i64, Arc<dyn ObjectStore>>>,
}

impl ClientCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached client for a store, connecting on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `bucket-name` is missing or the
    /// client cannot be built from the store's properties.
    pub fn get_or_connect(&self, store: &StoreDefinition) -> CofferResult<Arc<dyn ObjectStore>> {
        if let Some(client) = self.clients.get(store.id()) {
            return Ok(Arc::clone(client.value()));
        }

        let client = connect(store)?;
        tracing::info!(store = %store.name(), "Connected object storage client");
        Ok(Arc::clone(
            self.clients.entry(*store.id()).or_insert(client).value(),
        ))
    }

    /// Use a specific client for a store.
    pub fn insert(&self, store_id: i64, client: Arc<dyn ObjectStore>) {
        self.clients.insert(store_id, client);
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client has been created yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn connect(store: &StoreDefinition) -> CofferResult<Arc<dyn ObjectStore>> {
    let properties = store.properties();
    let mut builder =
        AmazonS3Builder::new().with_bucket_name(properties.required(keys::BUCKET_NAME)?);

    if let Some(region) = properties.get(keys::REGION) {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = properties.get(keys::ENDPOINT) {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }
    if let Some(access_key) = properties.get(keys::ACCESS_KEY) {
        builder = builder.with_access_key_id(access_key);
    }
    if let Some(secret_key) = properties.get(keys::SECRET_KEY) {
        builder = builder.with_secret_access_key(secret_key);
    }

    let client = builder.build().map_err(|e| {
        ConfigError::new(format!(
            "Object storage client for store {}: {}",
            store.name(),
            e
        ))
    })?;
    Ok(Arc::new(client))
}

/// Classify an object-store failure.
fn remote_error(context: &str, err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { path, .. } => {
            StorageError::new(StorageErrorKind::NotFound(path))
        }
        other => StorageError::new(StorageErrorKind::Io(format!("{}: {}", context, other))),
    }
}

/// Resource storing content as a remote object.
///
/// # Properties
///
/// - `bucket-name` (required)
/// - `region`, `endpoint`, `access-key`, `secret-key`
pub struct ObjectStorageResource {
    base: ResourceBase,
    client: Arc<dyn ObjectStore>,
    location: Path,
}

impl ObjectStorageResource {
    /// Configure an object-storage resource with a connected client.
    pub fn new(
        object: ObjectRef,
        store: &StoreDefinition,
        metadata: Arc<dyn ObjectProperties>,
        client: Arc<dyn ObjectStore>,
    ) -> CofferResult<Self> {
        let location = Path::from(object.stable_key().as_str());
        Ok(Self {
            base: ResourceBase::new(object, store, metadata)?,
            client,
            location,
        })
    }

    /// Object key of the content.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl std::fmt::Debug for ObjectStorageResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageResource")
            .field("base", &self.base)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Resource for ObjectStorageResource {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn backend(&self) -> &'static str {
        OBJECT_STORAGE_BACKEND
    }

    async fn exists(&mut self) -> CofferResult<bool> {
        self.base.ensure_active()?;
        match self.client.head(&self.location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(remote_error("HEAD", e).into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn read(&mut self) -> CofferResult<Option<ContentReader>> {
        self.base.begin(StoreEvent::Read)?;
        let result = match self.client.get(&self.location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(remote_error("GET", e).into()),
        };
        let bytes = result.bytes().await.map_err(|e| remote_error("GET", e))?;
        tracing::debug!(location = %self.location, bytes = bytes.len(), "Fetched object");
        Ok(Some(self.base.decode(Box::new(Cursor::new(bytes)))))
    }

    #[tracing::instrument(skip(self, data))]
    async fn write(
        &mut self,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<i64> {
        self.base.begin(StoreEvent::Write)?;

        let (mut encoded, counter) = self.base.encode(data, size, file_name)?;
        let mut payload = Vec::new();
        encoded.read_to_end(&mut payload).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                self.location, e
            )))
        })?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::Metadata(FILENAME_ATTRIBUTE.into()),
            file_name.to_string().into(),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.client
            .put_opts(&self.location, PutPayload::from(payload), options)
            .await
            .map_err(|e| remote_error("PUT", e))?;

        let length = counter.get();
        self.base.record_written(file_name, length).await?;
        tracing::debug!(location = %self.location, length, "Put object");
        Ok(length as i64)
    }

    async fn delete(&mut self) -> CofferResult<()> {
        self.base.begin(StoreEvent::Delete)?;
        tracing::debug!(location = %self.location, "Object storage keeps deleted content");
        Ok(())
    }

    async fn commit(&mut self, xid: &TransactionId, one_phase: bool) -> CofferResult<()> {
        self.base.ensure_active()?;
        self.base.close();
        tracing::debug!(%xid, one_phase, location = %self.location, "Nothing to commit");
        Ok(())
    }

    async fn rollback(&mut self, xid: &TransactionId) -> CofferResult<()> {
        self.base.ensure_active()?;
        self.base.close();
        tracing::debug!(%xid, location = %self.location, "Nothing to roll back");
        Ok(())
    }
}
