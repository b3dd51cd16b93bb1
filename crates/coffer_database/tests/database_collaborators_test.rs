//! Tests against a live PostgreSQL database.
//!
//! Run with `DATABASE_URL` set and `--features db-tests`.
#![cfg(feature = "db-tests")]

use coffer_core::{ObjectRef, Properties, StoreDefinition, TransactionId};
use coffer_database::{
    AmbientConnection, PgBlobTable, PgNodeIdentifiers, PgObjectProperties, PgStoreSource,
    create_pool, establish_connection, run_migrations,
};
use coffer_storage::{
    BackendContext, BlobTable, NodeIdentifiers, ObjectProperties, ResourceRegistry, StoreSource,
};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

fn ambient() -> AmbientConnection {
    dotenvy::dotenv().ok();
    let mut conn = establish_connection().expect("DATABASE_URL must point at a test database");
    run_migrations(&mut conn).unwrap();
    AmbientConnection::new(conn)
}

fn unique_id() -> i64 {
    (Uuid::new_v4().as_u128() & 0x7fff_ffff_ffff) as i64
}

#[tokio::test]
async fn test_blob_rolled_back_with_ambient_transaction() {
    let ambient = ambient();
    let table = PgBlobTable::new(ambient.clone());
    let id = unique_id();

    ambient.begin().await.unwrap();
    table.write_content(id, b"pending".to_vec()).await.unwrap();
    assert!(table.has_content(id).await.unwrap());
    ambient.rollback().await.unwrap();

    assert!(!table.has_content(id).await.unwrap());
}

#[tokio::test]
async fn test_relational_resource_round_trip() {
    let ambient = ambient();
    let context = BackendContext::new(Arc::new(PgObjectProperties::new(ambient.clone())))
        .with_blob_table(Arc::new(PgBlobTable::new(ambient.clone())));
    let store = StoreDefinition::builder()
        .id(unique_id())
        .name("blobs")
        .backend("relational")
        .properties(Properties::from_iter([("compress", "gzip")]))
        .build()
        .unwrap();
    let object = ObjectRef::from_ids(unique_id(), 3);
    let registry = ResourceRegistry::with_builtin();

    ambient.begin().await.unwrap();
    let mut writer = registry.create(&context, object.clone(), &store).unwrap();
    let data: &[u8] = b"stored in postgres";
    writer.write(Box::new(data), -1, "pg.txt").await.unwrap();
    writer.commit(&TransactionId::new(), true).await.unwrap();
    ambient.commit().await.unwrap();

    let mut reader = registry.create(&context, object.clone(), &store).unwrap();
    let mut content = Vec::new();
    reader
        .read()
        .await
        .unwrap()
        .unwrap()
        .read_to_end(&mut content)
        .await
        .unwrap();
    assert_eq!(content, data);
    assert_eq!(reader.file_length().await.unwrap(), Some(18));
}

#[tokio::test]
async fn test_node_identifier_upsert() {
    let ambient = ambient();
    let identifiers = PgNodeIdentifiers::new(ambient);
    let object = ObjectRef::from_ids(unique_id(), 1);

    identifiers.set_node_id(&object, "node-a").await.unwrap();
    identifiers.set_node_id(&object, "node-b").await.unwrap();
    assert_eq!(identifiers.node_id(&object).await.unwrap().as_deref(), Some("node-b"));

    identifiers.clear_node_id(&object).await.unwrap();
    assert!(identifiers.node_id(&object).await.unwrap().is_none());
}

#[tokio::test]
async fn test_content_info_upsert() {
    let properties = PgObjectProperties::new(ambient());
    let object = ObjectRef::from_ids(unique_id(), 2);

    properties
        .record_content(&object, &coffer_storage::ContentInfo::new("a.txt", 1))
        .await
        .unwrap();
    properties
        .record_content(&object, &coffer_storage::ContentInfo::new("b.txt", 2))
        .await
        .unwrap();

    let info = properties.content_info(&object).await.unwrap().unwrap();
    assert_eq!(info.file_name, "b.txt");
    assert_eq!(info.file_length, 2);
}

#[tokio::test]
async fn test_store_source_round_trip() {
    ambient();
    let source = PgStoreSource::new(create_pool(2).unwrap());
    let id = unique_id();
    let store = StoreDefinition::builder()
        .id(id)
        .name(format!("files-{}", id))
        .backend("filesystem")
        .properties(Properties::from_iter([
            ("base-name", "/srv/coffer"),
            ("number-of-backups", "2"),
        ]))
        .build()
        .unwrap();

    source.save(&store).await.unwrap();

    assert_eq!(source.load_by_id(id).await.unwrap().unwrap(), store);
    assert_eq!(
        source.load_by_name(store.name()).await.unwrap().unwrap(),
        store
    );
    assert_eq!(
        source.load_by_uuid(store.uuid()).await.unwrap().unwrap(),
        store
    );
    assert!(source.load_by_id(-id).await.unwrap().is_none());
}
