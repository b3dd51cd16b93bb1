//! Cross-backend behaviour: round trips, visibility and deletion policy.

use coffer_core::{CompressMode, ObjectRef, Properties, StoreDefinition, TransactionId};
use coffer_storage::{
    BackendContext, ClientCache, MemoryBlobTable, MemoryObjectProperties, MemoryRepository,
    OBJECT_STORAGE_BACKEND, RELATIONAL_BACKEND, REPOSITORY_BACKEND, Resource, ResourceRegistry,
    keys,
};
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use std::io::Cursor;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

struct Harness {
    root: TempDir,
    registry: ResourceRegistry,
    context: BackendContext,
    repository: MemoryRepository,
    remote: Arc<InMemory>,
}

impl Harness {
    fn new() -> Self {
        let repository = MemoryRepository::new();
        let clients = ClientCache::new();
        let remote = Arc::new(InMemory::new());
        let context = BackendContext::new(Arc::new(MemoryObjectProperties::new()))
            .with_blob_table(Arc::new(MemoryBlobTable::new()))
            .with_repository("default", Arc::new(repository.clone()))
            .with_clients(clients);
        Self {
            root: TempDir::new().unwrap(),
            registry: ResourceRegistry::with_builtin(),
            context,
            repository,
            remote,
        }
    }

    fn store(&self, id: i64, backend: &str, extra: &[(&str, &str)]) -> StoreDefinition {
        let mut properties = Properties::new();
        match backend {
            "filesystem" => {
                properties.insert(keys::BASE_NAME, self.root.path().display().to_string());
            }
            OBJECT_STORAGE_BACKEND => {
                properties.insert(keys::BUCKET_NAME, "attachments");
                self.context
                    .clients()
                    .insert(id, self.remote.clone() as Arc<dyn ObjectStore>);
            }
            REPOSITORY_BACKEND => {
                properties.insert(keys::WORKSPACE_NAME, "docs");
            }
            _ => {}
        }
        for (key, value) in extra {
            properties.insert(*key, *value);
        }
        StoreDefinition::builder()
            .id(id)
            .name(format!("{}-{}", backend, id))
            .backend(backend)
            .properties(properties)
            .build()
            .unwrap()
    }

    fn open(&self, store: &StoreDefinition, object: &ObjectRef) -> Box<dyn Resource> {
        self.registry
            .create(&self.context, object.clone(), store)
            .unwrap()
    }
}

async fn read_all(resource: &mut Box<dyn Resource>) -> Option<Vec<u8>> {
    let mut reader = resource.read().await.unwrap()?;
    let mut content = Vec::new();
    reader.read_to_end(&mut content).await.unwrap();
    Some(content)
}

fn payload() -> Vec<u8> {
    (0..20_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
}

#[tokio::test]
async fn test_round_trip_every_backend_and_mode() {
    let harness = Harness::new();
    let content = payload();
    let backends = ["filesystem", RELATIONAL_BACKEND, REPOSITORY_BACKEND, OBJECT_STORAGE_BACKEND];

    let mut store_id = 0;
    for backend in backends {
        for mode in CompressMode::iter() {
            store_id += 1;
            let store = harness.store(store_id, backend, &[(keys::COMPRESS, mode.as_str())]);
            let object = ObjectRef::from_ids(1000 + store_id, 5);

            let mut writer = harness.open(&store, &object);
            let written = writer
                .write(Box::new(Cursor::new(content.clone())), -1, "payload.bin")
                .await
                .unwrap();
            writer.commit(&TransactionId::new(), true).await.unwrap();
            assert_eq!(written as usize, content.len(), "{} / {}", backend, mode);

            let mut reader = harness.open(&store, &object);
            assert!(reader.exists().await.unwrap(), "{} / {}", backend, mode);
            assert_eq!(
                read_all(&mut reader).await.unwrap(),
                content,
                "{} / {}",
                backend,
                mode
            );
            assert_eq!(
                reader.file_name().await.unwrap().as_deref(),
                Some("payload.bin")
            );
        }
    }
}

#[tokio::test]
async fn test_object_storage_visible_before_commit() {
    let harness = Harness::new();
    let store = harness.store(1, OBJECT_STORAGE_BACKEND, &[]);
    let object = ObjectRef::new(7, 3, "invoices/2024/7");

    let mut resource = harness.open(&store, &object);
    assert!(!resource.exists().await.unwrap());

    let data: &[u8] = b"remote bytes";
    resource.write(Box::new(data), -1, "invoice.pdf").await.unwrap();

    assert!(resource.exists().await.unwrap());
    assert_eq!(read_all(&mut resource).await.unwrap(), b"remote bytes");

    let meta = harness
        .remote
        .get(&ObjectPath::from("invoices/2024/7"))
        .await
        .unwrap();
    assert_eq!(meta.meta.size, 12);
}

#[tokio::test]
async fn test_object_storage_missing_bucket_is_config_error() {
    let harness = Harness::new();
    let store = StoreDefinition::builder()
        .id(99)
        .name("remote")
        .backend(OBJECT_STORAGE_BACKEND)
        .build()
        .unwrap();
    let err = harness
        .registry
        .create(&harness.context, ObjectRef::from_ids(1, 1), &store)
        .err().unwrap();
    assert!(err.is_config());
}

#[tokio::test]
async fn test_repository_write_invisible_until_commit() {
    let harness = Harness::new();
    let store = harness.store(1, REPOSITORY_BACKEND, &[(keys::BASE_FOLDER, "mail/in")]);
    let object = ObjectRef::from_ids(42, 8);

    let mut writer = harness.open(&store, &object);
    let data: &[u8] = b"scanned letter";
    writer.write(Box::new(data), -1, "letter.pdf").await.unwrap();

    let mut reader = harness.open(&store, &object);
    assert!(read_all(&mut reader).await.is_none());
    reader.rollback(&TransactionId::new()).await.unwrap();

    writer.commit(&TransactionId::new(), true).await.unwrap();
    assert_eq!(harness.repository.node_count("docs"), 1);

    let mut reader = harness.open(&store, &object);
    assert_eq!(read_all(&mut reader).await.unwrap(), b"scanned letter");
}

#[tokio::test]
async fn test_repository_rollback_discards_node() {
    let harness = Harness::new();
    let store = harness.store(1, REPOSITORY_BACKEND, &[]);
    let object = ObjectRef::from_ids(42, 8);

    let mut writer = harness.open(&store, &object);
    let data: &[u8] = b"draft";
    writer.write(Box::new(data), -1, "draft.txt").await.unwrap();
    writer.rollback(&TransactionId::new()).await.unwrap();

    assert_eq!(harness.repository.node_count("docs"), 0);

    // The stale identifier is replaced by a fresh node on the next write.
    let mut writer = harness.open(&store, &object);
    let data: &[u8] = b"final";
    writer.write(Box::new(data), -1, "final.txt").await.unwrap();
    writer.commit(&TransactionId::new(), true).await.unwrap();
    assert_eq!(harness.repository.node_count("docs"), 1);
}

#[tokio::test]
async fn test_repository_reuses_node_on_rewrite() {
    let harness = Harness::new();
    let store = harness.store(1, REPOSITORY_BACKEND, &[]);
    let object = ObjectRef::from_ids(42, 8);

    for version in [&b"v1"[..], &b"v2"[..]] {
        let mut writer = harness.open(&store, &object);
        writer.write(Box::new(version), -1, "doc.txt").await.unwrap();
        writer.commit(&TransactionId::new(), true).await.unwrap();
    }

    assert_eq!(harness.repository.node_count("docs"), 1);
    let mut reader = harness.open(&store, &object);
    assert_eq!(read_all(&mut reader).await.unwrap(), b"v2");
}

#[tokio::test]
async fn test_repository_delete_requires_enable_deletion() {
    let harness = Harness::new();
    let kept = harness.store(1, REPOSITORY_BACKEND, &[]);
    let object = ObjectRef::from_ids(42, 8);

    let mut writer = harness.open(&kept, &object);
    let data: &[u8] = b"keep me";
    writer.write(Box::new(data), -1, "keep.txt").await.unwrap();
    writer.commit(&TransactionId::new(), true).await.unwrap();

    let mut deleter = harness.open(&kept, &object);
    deleter.delete().await.unwrap();
    deleter.commit(&TransactionId::new(), true).await.unwrap();
    assert!(harness.open(&kept, &object).exists().await.unwrap());

    let pruned = harness.store(2, REPOSITORY_BACKEND, &[(keys::ENABLE_DELETION, "true")]);
    let mut deleter = harness.open(&pruned, &object);
    deleter.delete().await.unwrap();
    deleter.commit(&TransactionId::new(), true).await.unwrap();
    assert!(!harness.open(&pruned, &object).exists().await.unwrap());
    assert_eq!(harness.repository.node_count("docs"), 0);
}

#[tokio::test]
async fn test_repository_rolled_back_delete_keeps_content() {
    let harness = Harness::new();
    let store = harness.store(1, REPOSITORY_BACKEND, &[(keys::ENABLE_DELETION, "true")]);
    let object = ObjectRef::from_ids(42, 8);

    let mut writer = harness.open(&store, &object);
    let data: &[u8] = b"keep me";
    writer.write(Box::new(data), -1, "keep.txt").await.unwrap();
    writer.commit(&TransactionId::new(), true).await.unwrap();

    let mut deleter = harness.open(&store, &object);
    deleter.delete().await.unwrap();
    deleter.rollback(&TransactionId::new()).await.unwrap();

    assert_eq!(harness.repository.node_count("docs"), 1);
    assert!(harness.open(&store, &object).exists().await.unwrap());
    let mut reader = harness.open(&store, &object);
    assert_eq!(read_all(&mut reader).await.unwrap(), b"keep me");
}

#[tokio::test]
async fn test_repository_rejected_login_surfaces() {
    let repository = MemoryRepository::new().with_credentials("svc", "secret");
    let context = BackendContext::in_memory().with_repository("guarded", Arc::new(repository));
    let store = StoreDefinition::builder()
        .id(1)
        .name("guarded")
        .backend(REPOSITORY_BACKEND)
        .properties(Properties::from_iter([
            (keys::REPOSITORY_NAME, "guarded"),
            (keys::USER_NAME, "svc"),
            (keys::PASSWORD, "wrong"),
        ]))
        .build()
        .unwrap();

    let mut resource = ResourceRegistry::with_builtin()
        .create(&context, ObjectRef::from_ids(1, 1), &store)
        .unwrap();
    let data: &[u8] = b"x";
    assert!(resource.write(Box::new(data), -1, "x").await.is_err());
}

#[tokio::test]
async fn test_relational_delete_clears_blob() {
    let harness = Harness::new();
    let store = harness.store(1, RELATIONAL_BACKEND, &[]);
    let object = ObjectRef::from_ids(42, 8);

    let mut writer = harness.open(&store, &object);
    let data: &[u8] = b"blob";
    writer.write(Box::new(data), -1, "blob.bin").await.unwrap();
    writer.commit(&TransactionId::new(), true).await.unwrap();

    let mut deleter = harness.open(&store, &object);
    deleter.delete().await.unwrap();
    deleter.commit(&TransactionId::new(), true).await.unwrap();

    let mut reader = harness.open(&store, &object);
    assert!(!reader.exists().await.unwrap());
    assert!(read_all(&mut reader).await.is_none());
}
