//! Logical store lookup with per-key caching.

use crate::{BackendContext, Resource, ResourceRegistry};
use coffer_core::{ObjectRef, StoreDefinition};
use coffer_error::{CofferResult, ConfigError};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Persisted store configuration.
#[async_trait::async_trait]
pub trait StoreSource: Send + Sync {
    /// Load a store by numeric id.
    async fn load_by_id(&self, id: i64) -> CofferResult<Option<StoreDefinition>>;

    /// Load a store by name.
    async fn load_by_name(&self, name: &str) -> CofferResult<Option<StoreDefinition>>;

    /// Load a store by uuid.
    async fn load_by_uuid(&self, uuid: &Uuid) -> CofferResult<Option<StoreDefinition>>;

    /// Every configured store.
    async fn load_all(&self) -> CofferResult<Vec<StoreDefinition>>;
}

/// [`StoreSource`] over a fixed list of definitions.
#[derive(Debug, Default)]
pub struct MemoryStoreSource {
    stores: Vec<StoreDefinition>,
    loads: AtomicUsize,
}

impl MemoryStoreSource {
    /// Create a source over the given definitions.
    pub fn new(stores: impl IntoIterator<Item = StoreDefinition>) -> Self {
        Self {
            stores: stores.into_iter().collect(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of single-store lookups served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    fn find(&self, matches: impl Fn(&StoreDefinition) -> bool) -> Option<StoreDefinition> {
        self.loads.fetch_add(1, Ordering::AcqRel);
        self.stores.iter().find(|store| matches(store)).cloned()
    }
}

#[async_trait::async_trait]
impl StoreSource for MemoryStoreSource {
    async fn load_by_id(&self, id: i64) -> CofferResult<Option<StoreDefinition>> {
        Ok(self.find(|store| *store.id() == id))
    }

    async fn load_by_name(&self, name: &str) -> CofferResult<Option<StoreDefinition>> {
        Ok(self.find(|store| store.name() == name))
    }

    async fn load_by_uuid(&self, uuid: &Uuid) -> CofferResult<Option<StoreDefinition>> {
        Ok(self.find(|store| store.uuid() == uuid))
    }

    async fn load_all(&self) -> CofferResult<Vec<StoreDefinition>> {
        Ok(self.stores.clone())
    }
}

/// Resolves logical stores and hands out resources configured for them.
///
/// A store is loaded from the [`StoreSource`] once and then served from the
/// id, name and uuid caches until [`invalidate`](StoreResolver::invalidate).
pub struct StoreResolver {
    source: Arc<dyn StoreSource>,
    registry: ResourceRegistry,
    context: BackendContext,
    by_id: DashMap<i64, Arc<StoreDefinition>>,
    by_name: DashMap<String, Arc<StoreDefinition>>,
    by_uuid: DashMap<Uuid, Arc<StoreDefinition>>,
}

impl StoreResolver {
    /// Create a resolver.
    pub fn new(
        source: Arc<dyn StoreSource>,
        registry: ResourceRegistry,
        context: BackendContext,
    ) -> Self {
        Self {
            source,
            registry,
            context,
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            by_uuid: DashMap::new(),
        }
    }

    /// The backend registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Collaborators passed to backends.
    pub fn context(&self) -> &BackendContext {
        &self.context
    }

    /// Store with the given id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no such store exists or its backend
    /// is not registered.
    pub async fn by_id(&self, id: i64) -> CofferResult<Arc<StoreDefinition>> {
        if let Some(store) = self.by_id.get(&id) {
            return Ok(Arc::clone(store.value()));
        }
        let loaded = self.source.load_by_id(id).await?;
        self.cache(loaded, || format!("id {}", id))
    }

    /// Store with the given name.
    pub async fn by_name(&self, name: &str) -> CofferResult<Arc<StoreDefinition>> {
        if let Some(store) = self.by_name.get(name) {
            return Ok(Arc::clone(store.value()));
        }
        let loaded = self.source.load_by_name(name).await?;
        self.cache(loaded, || format!("name '{}'", name))
    }

    /// Store with the given uuid.
    pub async fn by_uuid(&self, uuid: &Uuid) -> CofferResult<Arc<StoreDefinition>> {
        if let Some(store) = self.by_uuid.get(uuid) {
            return Ok(Arc::clone(store.value()));
        }
        let loaded = self.source.load_by_uuid(uuid).await?;
        self.cache(loaded, || format!("uuid {}", uuid))
    }

    /// Every configured store, bypassing the caches.
    pub async fn all(&self) -> CofferResult<Vec<StoreDefinition>> {
        self.source.load_all().await
    }

    /// Drop all cached stores.
    pub fn invalidate(&self) {
        self.by_id.clear();
        self.by_name.clear();
        self.by_uuid.clear();
        tracing::info!("Invalidated store cache");
    }

    /// Create a resource for an object in a store.
    pub fn resource(
        &self,
        store: &StoreDefinition,
        object: ObjectRef,
    ) -> CofferResult<Box<dyn Resource>> {
        self.registry.create(&self.context, object, store)
    }

    /// Create a resource for an object in the store with the given name.
    pub async fn resource_by_name(
        &self,
        name: &str,
        object: ObjectRef,
    ) -> CofferResult<Box<dyn Resource>> {
        let store = self.by_name(name).await?;
        self.resource(&store, object)
    }

    fn cache(
        &self,
        loaded: Option<StoreDefinition>,
        describe: impl FnOnce() -> String,
    ) -> CofferResult<Arc<StoreDefinition>> {
        let store = loaded.ok_or_else(|| ConfigError::new(format!("Unknown store {}", describe())))?;
        if !self.registry.contains(store.backend()) {
            return Err(ConfigError::new(format!(
                "Store {} uses unknown backend '{}'",
                store.name(),
                store.backend()
            ))
            .into());
        }

        let store = Arc::new(store);
        self.by_id.insert(*store.id(), Arc::clone(&store));
        self.by_name.insert(store.name().clone(), Arc::clone(&store));
        self.by_uuid.insert(*store.uuid(), Arc::clone(&store));
        tracing::debug!(store = %store.name(), backend = %store.backend(), "Cached store");
        Ok(store)
    }
}

impl std::fmt::Debug for StoreResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreResolver")
            .field("registry", &self.registry)
            .field("cached", &self.by_id.len())
            .finish_non_exhaustive()
    }
}
