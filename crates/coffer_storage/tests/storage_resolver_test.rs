//! Tests for store resolution and caching.

use coffer_core::{ObjectRef, Properties, StoreDefinition};
use coffer_storage::{
    BackendContext, MemoryStoreSource, ResourceRegistry, StoreResolver, keys,
};
use std::sync::Arc;
use uuid::Uuid;

fn stores() -> Vec<StoreDefinition> {
    vec![
        StoreDefinition::builder()
            .id(1)
            .uuid(Uuid::from_u128(1))
            .name("attachments")
            .backend("filesystem")
            .properties(Properties::from_iter([(keys::BASE_NAME, "/tmp/coffer")]))
            .build()
            .unwrap(),
        StoreDefinition::builder()
            .id(2)
            .uuid(Uuid::from_u128(2))
            .name("legacy")
            .backend("ftp")
            .build()
            .unwrap(),
    ]
}

fn resolver(source: Arc<MemoryStoreSource>) -> StoreResolver {
    StoreResolver::new(
        source,
        ResourceRegistry::with_builtin(),
        BackendContext::in_memory(),
    )
}

#[tokio::test]
async fn test_one_load_populates_every_cache() {
    let source = Arc::new(MemoryStoreSource::new(stores()));
    let resolver = resolver(source.clone());

    let by_name = resolver.by_name("attachments").await.unwrap();
    let by_id = resolver.by_id(1).await.unwrap();
    let by_uuid = resolver.by_uuid(&Uuid::from_u128(1)).await.unwrap();

    assert_eq!(source.load_count(), 1);
    assert!(Arc::ptr_eq(&by_name, &by_id));
    assert!(Arc::ptr_eq(&by_id, &by_uuid));
}

#[tokio::test]
async fn test_invalidate_forces_reload() {
    let source = Arc::new(MemoryStoreSource::new(stores()));
    let resolver = resolver(source.clone());

    resolver.by_id(1).await.unwrap();
    resolver.invalidate();
    resolver.by_id(1).await.unwrap();

    assert_eq!(source.load_count(), 2);
}

#[tokio::test]
async fn test_unknown_store_is_config_error() {
    let resolver = resolver(Arc::new(MemoryStoreSource::new(stores())));
    let err = resolver.by_name("nowhere").await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn test_unregistered_backend_is_rejected() {
    let resolver = resolver(Arc::new(MemoryStoreSource::new(stores())));
    let err = resolver.by_id(2).await.unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("ftp"));
}

#[tokio::test]
async fn test_resource_by_name() {
    let resolver = resolver(Arc::new(MemoryStoreSource::new(stores())));
    let resource = resolver
        .resource_by_name("attachments", ObjectRef::from_ids(5, 6))
        .await
        .unwrap();

    assert_eq!(resource.backend(), "filesystem");
    assert_eq!(resource.base().store_name(), "attachments");
}
