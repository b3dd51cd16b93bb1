//! Store resolution from PostgreSQL.
//!
//! Run with `DATABASE_URL` set and `--features db-tests`.
#![cfg(feature = "db-tests")]

use coffer::database::{AmbientConnection, create_pool, establish_connection, run_migrations};
use coffer::{Coffer, CofferConfig, ObjectRef};
use uuid::Uuid;

fn ambient() -> AmbientConnection {
    dotenvy::dotenv().ok();
    let mut conn = establish_connection().expect("DATABASE_URL must point at a test database");
    run_migrations(&mut conn).unwrap();
    AmbientConnection::new(conn)
}

#[tokio::test]
async fn test_configured_stores_are_persisted_and_resolved() {
    let ambient = ambient();
    let id = (Uuid::new_v4().as_u128() & 0x7fff_ffff) as i64;
    let name = format!("blobs-{}", id);
    let config = CofferConfig::from_toml(&format!(
        r#"
        [[stores]]
        id = {id}
        name = "{name}"
        backend = "relational"
        "#
    ))
    .unwrap();

    let coffer = Coffer::from_database(&config, create_pool(2).unwrap(), &ambient)
        .await
        .unwrap();
    let store = coffer.resolver().by_id(id).await.unwrap();
    assert_eq!(store.name(), &name);

    let object = ObjectRef::from_ids(id, 5);
    ambient.begin().await.unwrap();
    let data: &[u8] = b"persisted store";
    coffer
        .put(&name, object.clone(), Box::new(data), -1, "p.txt")
        .await
        .unwrap();
    ambient.commit().await.unwrap();

    let mut out = Vec::new();
    coffer.get(&name, object, &mut out).await.unwrap();
    assert_eq!(out, b"persisted store");

    // A second handle finds the store already saved and keeps its uuid.
    let again = Coffer::from_database(&config, create_pool(2).unwrap(), &ambient)
        .await
        .unwrap();
    assert_eq!(
        again.resolver().by_id(id).await.unwrap().uuid(),
        store.uuid()
    );
}
