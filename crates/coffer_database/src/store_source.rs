//! Store definitions persisted in `stores` and `store_properties`.

use crate::connection::{PgPool, blocking, checkout};
use crate::models::{StorePropertyRow, StoreRow};
use crate::schema::{store_properties, stores};
use crate::DatabaseResult;
use coffer_core::{Properties, StoreDefinition};
use coffer_error::{CofferResult, DatabaseError};
use coffer_storage::StoreSource;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

/// [`StoreSource`] reading from PostgreSQL.
#[derive(Clone)]
pub struct PgStoreSource {
    pool: PgPool,
}

impl PgStoreSource {
    /// Read stores through the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a store and its properties.
    #[tracing::instrument(skip(self, store), fields(store = %store.name()))]
    pub async fn save(&self, store: &StoreDefinition) -> CofferResult<()> {
        let pool = self.pool.clone();
        let row = StoreRow {
            id: *store.id(),
            uuid: *store.uuid(),
            name: store.name().clone(),
            backend: store.backend().clone(),
        };
        let properties: Vec<StorePropertyRow> = store
            .properties()
            .iter()
            .map(|(key, value)| StorePropertyRow {
                store_id: row.id,
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();

        blocking(move || {
            let mut pooled = checkout(&pool)?;
            let conn: &mut PgConnection = &mut pooled;
            conn.transaction::<_, DatabaseError, _>(|conn| {
                diesel::insert_into(stores::table)
                    .values(&row)
                    .on_conflict(stores::id)
                    .do_update()
                    .set((
                        stores::uuid.eq(&row.uuid),
                        stores::name.eq(&row.name),
                        stores::backend.eq(&row.backend),
                    ))
                    .execute(conn)?;
                diesel::delete(store_properties::table.filter(store_properties::store_id.eq(row.id)))
                    .execute(conn)?;
                if !properties.is_empty() {
                    diesel::insert_into(store_properties::table)
                        .values(&properties)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await?;
        tracing::info!("Saved store");
        Ok(())
    }

    async fn load<F>(&self, query: F) -> CofferResult<Option<StoreDefinition>>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<Option<StoreRow>> + Send + 'static,
    {
        let pool = self.pool.clone();
        let loaded = blocking(move || {
            let mut pooled = checkout(&pool)?;
            let conn: &mut PgConnection = &mut pooled;
            let Some(row) = query(conn).map_err(DatabaseError::from)? else {
                return Ok(None);
            };
            let properties = load_properties(conn, row.id)?;
            Ok(Some((row, properties)))
        })
        .await?;

        loaded
            .map(|(row, properties)| to_definition(row, properties))
            .transpose()
    }
}

impl std::fmt::Debug for PgStoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStoreSource").finish_non_exhaustive()
    }
}

fn load_properties(conn: &mut PgConnection, store_id: i64) -> DatabaseResult<Properties> {
    let rows = store_properties::table
        .filter(store_properties::store_id.eq(store_id))
        .select(StorePropertyRow::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
}

fn to_definition(row: StoreRow, properties: Properties) -> CofferResult<StoreDefinition> {
    StoreDefinition::builder()
        .id(row.id)
        .uuid(row.uuid)
        .name(row.name)
        .backend(row.backend)
        .properties(properties)
        .build()
}

#[async_trait::async_trait]
impl StoreSource for PgStoreSource {
    async fn load_by_id(&self, id: i64) -> CofferResult<Option<StoreDefinition>> {
        self.load(move |conn| {
            stores::table
                .find(id)
                .select(StoreRow::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn load_by_name(&self, name: &str) -> CofferResult<Option<StoreDefinition>> {
        let name = name.to_string();
        self.load(move |conn| {
            stores::table
                .filter(stores::name.eq(name))
                .select(StoreRow::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn load_by_uuid(&self, uuid: &Uuid) -> CofferResult<Option<StoreDefinition>> {
        let uuid = *uuid;
        self.load(move |conn| {
            stores::table
                .filter(stores::uuid.eq(uuid))
                .select(StoreRow::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn load_all(&self) -> CofferResult<Vec<StoreDefinition>> {
        let pool = self.pool.clone();
        let loaded = blocking(move || {
            let mut pooled = checkout(&pool)?;
            let conn: &mut PgConnection = &mut pooled;
            let rows = stores::table
                .order(stores::id)
                .select(StoreRow::as_select())
                .load(conn)?;
            rows.into_iter()
                .map(|row| {
                    let properties = load_properties(conn, row.id)?;
                    Ok((row, properties))
                })
                .collect::<DatabaseResult<Vec<_>>>()
        })
        .await?;

        loaded
            .into_iter()
            .map(|(row, properties)| to_definition(row, properties))
            .collect()
    }
}
