//! Relational blob column on the ambient connection.

use crate::AmbientConnection;
use crate::schema::content_blobs;
use coffer_error::{CofferResult, DatabaseError};
use coffer_storage::BlobTable;
use diesel::prelude::*;
use diesel::upsert::excluded;

/// [`BlobTable`] over `content_blobs`.
#[derive(Debug, Clone)]
pub struct PgBlobTable {
    connection: AmbientConnection,
}

impl PgBlobTable {
    /// Use the given ambient connection.
    pub fn new(connection: AmbientConnection) -> Self {
        Self { connection }
    }
}

#[async_trait::async_trait]
impl BlobTable for PgBlobTable {
    async fn has_content(&self, id: i64) -> CofferResult<bool> {
        let found = self
            .connection
            .run(move |conn| {
                diesel::select(diesel::dsl::exists(
                    content_blobs::table
                        .filter(content_blobs::object_id.eq(id))
                        .filter(content_blobs::content.is_not_null()),
                ))
                .get_result::<bool>(conn)
                .map_err(DatabaseError::from)
            })
            .await?;
        Ok(found)
    }

    #[tracing::instrument(skip(self))]
    async fn read_content(&self, id: i64) -> CofferResult<Option<Vec<u8>>> {
        let content = self
            .connection
            .run(move |conn| {
                content_blobs::table
                    .find(id)
                    .select(content_blobs::content)
                    .first::<Option<Vec<u8>>>(conn)
                    .optional()
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(content.flatten())
    }

    #[tracing::instrument(skip(self, content), fields(bytes = content.len()))]
    async fn write_content(&self, id: i64, content: Vec<u8>) -> CofferResult<()> {
        self.connection
            .run(move |conn| {
                diesel::insert_into(content_blobs::table)
                    .values((
                        content_blobs::object_id.eq(id),
                        content_blobs::content.eq(Some(content)),
                    ))
                    .on_conflict(content_blobs::object_id)
                    .do_update()
                    .set(content_blobs::content.eq(excluded(content_blobs::content)))
                    .execute(conn)
                    .map_err(DatabaseError::from)
            })
            .await?;
        tracing::debug!("Upserted blob");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn clear_content(&self, id: i64) -> CofferResult<()> {
        self.connection
            .run(move |conn| {
                diesel::update(content_blobs::table.find(id))
                    .set(content_blobs::content.eq(None::<Vec<u8>>))
                    .execute(conn)
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(())
    }
}
