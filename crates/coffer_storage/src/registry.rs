//! Backend identifiers mapped to resource factories.

use crate::{
    BlobTable, ClientCache, ContentRepository, FileSystemResource, MemoryBlobTable,
    MemoryNodeIdentifiers, MemoryObjectProperties, MemoryRepository, NodeIdentifiers,
    ObjectProperties, ObjectStorageResource, RelationalResource, RepositoryResource, Resource,
    keys,
};
use coffer_core::{ObjectRef, StoreDefinition};
use coffer_error::{CofferResult, ConfigError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Identifier of the filesystem backend.
pub const FILESYSTEM_BACKEND: &str = "filesystem";
/// Identifier of the relational blob backend.
pub const RELATIONAL_BACKEND: &str = "relational";
/// Identifier of the content-repository backend.
pub const REPOSITORY_BACKEND: &str = "repository";
/// Identifier of the object-storage backend.
pub const OBJECT_STORAGE_BACKEND: &str = "object-storage";

/// Repository used when a store does not name one.
pub const DEFAULT_REPOSITORY: &str = "default";

/// Collaborators handed to resource factories.
#[derive(Clone)]
pub struct BackendContext {
    metadata: Arc<dyn ObjectProperties>,
    blob_table: Option<Arc<dyn BlobTable>>,
    node_identifiers: Arc<dyn NodeIdentifiers>,
    repositories: HashMap<String, Arc<dyn ContentRepository>>,
    clients: ClientCache,
}

impl BackendContext {
    /// Create a context around the owning object's property mechanism.
    ///
    /// No blob table or repository is available until one is attached.
    pub fn new(metadata: Arc<dyn ObjectProperties>) -> Self {
        Self {
            metadata,
            blob_table: None,
            node_identifiers: Arc::new(MemoryNodeIdentifiers::new()),
            repositories: HashMap::new(),
            clients: ClientCache::new(),
        }
    }

    /// A context backed entirely by in-process collaborators.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryObjectProperties::new()))
            .with_blob_table(Arc::new(MemoryBlobTable::new()))
            .with_repository(DEFAULT_REPOSITORY, Arc::new(MemoryRepository::new()))
    }

    /// Attach the relational blob table.
    pub fn with_blob_table(mut self, table: Arc<dyn BlobTable>) -> Self {
        self.blob_table = Some(table);
        self
    }

    /// Attach the node identifier table used by repository stores.
    pub fn with_node_identifiers(mut self, identifiers: Arc<dyn NodeIdentifiers>) -> Self {
        self.node_identifiers = identifiers;
        self
    }

    /// Register a content repository under a name.
    pub fn with_repository(
        mut self,
        name: impl Into<String>,
        repository: Arc<dyn ContentRepository>,
    ) -> Self {
        self.repositories.insert(name.into(), repository);
        self
    }

    /// Share an object-storage client cache.
    pub fn with_clients(mut self, clients: ClientCache) -> Self {
        self.clients = clients;
        self
    }

    /// The owning object's property mechanism.
    pub fn metadata(&self) -> Arc<dyn ObjectProperties> {
        Arc::clone(&self.metadata)
    }

    /// The object-storage client cache.
    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    fn blob_table(&self) -> CofferResult<Arc<dyn BlobTable>> {
        self.blob_table.clone().ok_or_else(|| {
            ConfigError::new("No blob table configured for the relational backend").into()
        })
    }

    fn repository(&self, name: &str) -> CofferResult<Arc<dyn ContentRepository>> {
        self.repositories.get(name).cloned().ok_or_else(|| {
            ConfigError::new(format!("No content repository registered as '{}'", name)).into()
        })
    }
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("blob_table", &self.blob_table.is_some())
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

/// Creates a configured resource for an object in a store.
pub type ResourceFactory =
    fn(&BackendContext, ObjectRef, &StoreDefinition) -> CofferResult<Box<dyn Resource>>;

/// Backend identifier → factory table.
///
/// # Examples
///
/// ```
/// use coffer_storage::{FILESYSTEM_BACKEND, ResourceRegistry};
///
/// let registry = ResourceRegistry::with_builtin();
/// assert!(registry.contains(FILESYSTEM_BACKEND));
/// assert!(!registry.contains("ftp"));
/// ```
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    factories: BTreeMap<String, ResourceFactory>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl ResourceRegistry {
    /// A registry without any backend.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the four built-in backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(FILESYSTEM_BACKEND, create_filesystem);
        registry.register(RELATIONAL_BACKEND, create_relational);
        registry.register(REPOSITORY_BACKEND, create_repository);
        registry.register(OBJECT_STORAGE_BACKEND, create_object_storage);
        registry
    }

    /// Register or replace a backend.
    pub fn register(&mut self, backend: impl Into<String>, factory: ResourceFactory) {
        self.factories.insert(backend.into(), factory);
    }

    /// Whether a backend is registered.
    pub fn contains(&self, backend: &str) -> bool {
        self.factories.contains_key(backend)
    }

    /// Registered backend identifiers.
    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Create a resource for an object in a store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown backend or invalid store
    /// properties.
    #[tracing::instrument(skip(self, context, store), fields(store = %store.name(), backend = %store.backend()))]
    pub fn create(
        &self,
        context: &BackendContext,
        object: ObjectRef,
        store: &StoreDefinition,
    ) -> CofferResult<Box<dyn Resource>> {
        let factory = self.factories.get(store.backend()).ok_or_else(|| {
            ConfigError::new(format!(
                "Unknown backend '{}' for store {}",
                store.backend(),
                store.name()
            ))
        })?;
        factory(context, object, store)
    }
}

fn create_filesystem(
    context: &BackendContext,
    object: ObjectRef,
    store: &StoreDefinition,
) -> CofferResult<Box<dyn Resource>> {
    Ok(Box::new(FileSystemResource::new(
        object,
        store,
        context.metadata(),
    )?))
}

fn create_relational(
    context: &BackendContext,
    object: ObjectRef,
    store: &StoreDefinition,
) -> CofferResult<Box<dyn Resource>> {
    Ok(Box::new(RelationalResource::new(
        object,
        store,
        context.metadata(),
        context.blob_table()?,
    )?))
}

fn create_repository(
    context: &BackendContext,
    object: ObjectRef,
    store: &StoreDefinition,
) -> CofferResult<Box<dyn Resource>> {
    let name = store
        .properties()
        .get(keys::REPOSITORY_NAME)
        .unwrap_or(DEFAULT_REPOSITORY);
    Ok(Box::new(RepositoryResource::new(
        object,
        store,
        context.metadata(),
        context.repository(name)?,
        Arc::clone(&context.node_identifiers),
    )?))
}

fn create_object_storage(
    context: &BackendContext,
    object: ObjectRef,
    store: &StoreDefinition,
) -> CofferResult<Box<dyn Resource>> {
    let client = context.clients.get_or_connect(store)?;
    Ok(Box::new(ObjectStorageResource::new(
        object,
        store,
        context.metadata(),
        client,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::Properties;

    #[test]
    fn test_unknown_backend_is_config_error() {
        let store = StoreDefinition::builder()
            .id(1)
            .name("legacy")
            .backend("ftp")
            .build()
            .unwrap();
        let err = ResourceRegistry::with_builtin()
            .create(&BackendContext::in_memory(), ObjectRef::from_ids(1, 1), &store)
            .err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_repository_is_config_error() {
        let store = StoreDefinition::builder()
            .id(2)
            .name("archive")
            .backend(REPOSITORY_BACKEND)
            .properties(Properties::from_iter([(keys::REPOSITORY_NAME, "dms")]))
            .build()
            .unwrap();
        let err = ResourceRegistry::with_builtin()
            .create(&BackendContext::in_memory(), ObjectRef::from_ids(1, 1), &store)
            .err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_relational_needs_blob_table() {
        let store = StoreDefinition::builder()
            .id(3)
            .name("blobs")
            .backend(RELATIONAL_BACKEND)
            .build()
            .unwrap();
        let context = BackendContext::new(Arc::new(MemoryObjectProperties::new()));
        let err = ResourceRegistry::with_builtin()
            .create(&context, ObjectRef::from_ids(1, 1), &store)
            .err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_backends_listed_in_order() {
        let registry = ResourceRegistry::with_builtin();
        let backends: Vec<_> = registry.backends().collect();
        assert_eq!(
            backends,
            vec!["filesystem", "object-storage", "relational", "repository"]
        );
    }
}
