//! Content info recorded on the ambient connection.

use crate::AmbientConnection;
use crate::models::ContentInfoRow;
use crate::schema::object_content_info;
use coffer_core::ObjectRef;
use coffer_error::{CofferResult, DatabaseError, DatabaseErrorKind};
use coffer_storage::{ContentInfo, ObjectProperties};
use diesel::prelude::*;
use diesel::upsert::excluded;

/// [`ObjectProperties`] over `object_content_info`.
#[derive(Debug, Clone)]
pub struct PgObjectProperties {
    connection: AmbientConnection,
}

impl PgObjectProperties {
    /// Use the given ambient connection.
    pub fn new(connection: AmbientConnection) -> Self {
        Self { connection }
    }
}

#[async_trait::async_trait]
impl ObjectProperties for PgObjectProperties {
    #[tracing::instrument(skip(self, object, info), fields(object_id = object.id(), file_name = %info.file_name))]
    async fn record_content(&self, object: &ObjectRef, info: &ContentInfo) -> CofferResult<()> {
        let file_length = i64::try_from(info.file_length).map_err(|_| {
            DatabaseError::new(DatabaseErrorKind::Query(format!(
                "file length {} out of range",
                info.file_length
            )))
        })?;
        let row = ContentInfoRow {
            object_id: *object.id(),
            type_id: *object.type_id(),
            file_name: info.file_name.clone(),
            file_length,
        };
        self.connection
            .run(move |conn| {
                diesel::insert_into(object_content_info::table)
                    .values(&row)
                    .on_conflict((object_content_info::object_id, object_content_info::type_id))
                    .do_update()
                    .set((
                        object_content_info::file_name.eq(excluded(object_content_info::file_name)),
                        object_content_info::file_length
                            .eq(excluded(object_content_info::file_length)),
                    ))
                    .execute(conn)
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(())
    }

    async fn content_info(&self, object: &ObjectRef) -> CofferResult<Option<ContentInfo>> {
        let key = (*object.id(), *object.type_id());
        let row = self
            .connection
            .run(move |conn| {
                object_content_info::table
                    .find(key)
                    .select(ContentInfoRow::as_select())
                    .first(conn)
                    .optional()
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(row.map(|row| ContentInfo::new(row.file_name, row.file_length.max(0) as u64)))
    }
}
