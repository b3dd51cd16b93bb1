//! End-to-end behaviour of the `Coffer` handle over configured stores.

use coffer::{BackendContext, Coffer, CofferConfig, ObjectRef};
use tempfile::TempDir;

fn coffer_with_stores(root: &TempDir) -> Coffer {
    let config = CofferConfig::from_toml(&format!(
        r#"
        [[stores]]
        id = 1
        name = "files"
        backend = "filesystem"

        [stores.properties]
        base-name = "{}"
        compress = "gzip"
        number-of-backups = "1"

        [[stores]]
        id = 2
        name = "blobs"
        backend = "relational"

        [[stores]]
        id = 3
        name = "docs"
        backend = "repository"
        "#,
        root.path().display()
    ))
    .unwrap();
    Coffer::from_config(&config, BackendContext::in_memory()).unwrap()
}

#[tokio::test]
async fn test_put_get_round_trip_on_every_store() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);

    for (index, store) in ["files", "blobs", "docs"].into_iter().enumerate() {
        let object = ObjectRef::from_ids(100 + index as i64, 7);
        let data: &[u8] = b"attachment body";
        let written = coffer
            .put(store, object.clone(), Box::new(data), -1, "body.txt")
            .await
            .unwrap();
        assert_eq!(written, 15, "store {}", store);

        let mut out = Vec::new();
        let copied = coffer.get(store, object.clone(), &mut out).await.unwrap();
        assert_eq!(copied, Some(15), "store {}", store);
        assert_eq!(out, b"attachment body", "store {}", store);
        assert!(coffer.exists(store, object).await.unwrap(), "store {}", store);
    }
}

#[tokio::test]
async fn test_get_missing_content_is_none() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);

    let mut out = Vec::new();
    let copied = coffer
        .get("files", ObjectRef::from_ids(1, 1), &mut out)
        .await
        .unwrap();
    assert!(copied.is_none());
    assert!(out.is_empty());
    assert!(!coffer.exists("files", ObjectRef::from_ids(1, 1)).await.unwrap());
}

#[tokio::test]
async fn test_put_with_known_size_truncates() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);
    let object = ObjectRef::from_ids(5, 2);

    let data: &[u8] = b"0123456789";
    let written = coffer
        .put("files", object.clone(), Box::new(data), 4, "digits.txt")
        .await
        .unwrap();
    assert_eq!(written, 4);

    let mut out = Vec::new();
    coffer.get("files", object, &mut out).await.unwrap();
    assert_eq!(out, b"0123");
}

#[tokio::test]
async fn test_info_records_name_and_length() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);
    let object = ObjectRef::from_ids(9, 3);

    assert!(coffer.info("blobs", object.clone()).await.unwrap().is_none());

    let data: &[u8] = b"spreadsheet";
    coffer
        .put("blobs", object.clone(), Box::new(data), -1, "sheet.csv")
        .await
        .unwrap();

    let info = coffer.info("blobs", object).await.unwrap().unwrap();
    assert_eq!(info.file_name, "sheet.csv");
    assert_eq!(info.file_length, 11);
}

#[tokio::test]
async fn test_delete_removes_filesystem_content() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);
    let object = ObjectRef::from_ids(12, 4);

    let data: &[u8] = b"short lived";
    coffer
        .put("files", object.clone(), Box::new(data), -1, "tmp.txt")
        .await
        .unwrap();
    coffer.delete("files", object.clone()).await.unwrap();

    assert!(!coffer.exists("files", object).await.unwrap());
}

#[tokio::test]
async fn test_unknown_store_is_config_error() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);

    let data: &[u8] = b"x";
    let err = coffer
        .put("nowhere", ObjectRef::from_ids(1, 1), Box::new(data), -1, "x")
        .await
        .unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn test_stores_lists_configuration() {
    let root = TempDir::new().unwrap();
    let coffer = coffer_with_stores(&root);

    let mut names: Vec<String> = coffer
        .stores()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name().clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["blobs", "docs", "files"]);
}
