//! Tests for store definitions and object references.

use coffer_core::{CompressMode, ObjectRef, Properties, StoreDefinition};
use coffer_error::CofferErrorKind;

#[test]
fn test_builder_requires_backend() {
    let result = StoreDefinition::builder().id(3).name("no-backend").build();

    let err = result.unwrap_err();
    assert!(matches!(err.kind(), CofferErrorKind::Builder(_)));
    assert!(err.to_string().contains("backend"));
}

#[test]
fn test_compress_comes_from_properties() {
    let store = StoreDefinition::builder()
        .id(7)
        .name("zipped")
        .backend("filesystem")
        .properties(Properties::from_iter([("compress", "zip")]))
        .build()
        .unwrap();

    assert_eq!(store.compress().unwrap(), CompressMode::Zip);
}

#[test]
fn test_store_definition_deserializes_without_properties() {
    let json = r#"{
        "id": 2,
        "uuid": "6f2c1d5e-2b7a-4c1e-9a55-3a1f6b0e8c11",
        "name": "remote",
        "backend": "object-storage"
    }"#;

    let store: StoreDefinition = serde_json::from_str(json).unwrap();
    assert_eq!(*store.id(), 2);
    assert!(store.properties().is_empty());
    assert_eq!(store.compress().unwrap(), CompressMode::None);
}

#[test]
fn test_object_ref_display_uses_stable_key() {
    let object = ObjectRef::new(10, 20, "invoice-10");
    assert_eq!(object.to_string(), "invoice-10");
    assert_eq!(ObjectRef::from_ids(10, 20).to_string(), "20.10");
}
