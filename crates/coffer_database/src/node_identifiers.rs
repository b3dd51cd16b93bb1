//! Repository node identifiers on the ambient connection.

use crate::AmbientConnection;
use crate::models::ContentNodeRow;
use crate::schema::content_nodes;
use coffer_core::ObjectRef;
use coffer_error::{CofferResult, DatabaseError};
use coffer_storage::NodeIdentifiers;
use diesel::prelude::*;
use diesel::upsert::excluded;

/// [`NodeIdentifiers`] over `content_nodes`.
#[derive(Debug, Clone)]
pub struct PgNodeIdentifiers {
    connection: AmbientConnection,
}

impl PgNodeIdentifiers {
    /// Use the given ambient connection.
    pub fn new(connection: AmbientConnection) -> Self {
        Self { connection }
    }
}

#[async_trait::async_trait]
impl NodeIdentifiers for PgNodeIdentifiers {
    async fn node_id(&self, object: &ObjectRef) -> CofferResult<Option<String>> {
        let id = *object.id();
        let node_id = self
            .connection
            .run(move |conn| {
                content_nodes::table
                    .find(id)
                    .select(content_nodes::node_id)
                    .first::<String>(conn)
                    .optional()
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(node_id)
    }

    #[tracing::instrument(skip(self, object), fields(object_id = object.id()))]
    async fn set_node_id(&self, object: &ObjectRef, node_id: &str) -> CofferResult<()> {
        let row = ContentNodeRow {
            object_id: *object.id(),
            node_id: node_id.to_string(),
        };
        self.connection
            .run(move |conn| {
                diesel::insert_into(content_nodes::table)
                    .values(&row)
                    .on_conflict(content_nodes::object_id)
                    .do_update()
                    .set(content_nodes::node_id.eq(excluded(content_nodes::node_id)))
                    .execute(conn)
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(())
    }

    async fn clear_node_id(&self, object: &ObjectRef) -> CofferResult<()> {
        let id = *object.id();
        self.connection
            .run(move |conn| {
                diesel::delete(content_nodes::table.find(id))
                    .execute(conn)
                    .map_err(DatabaseError::from)
            })
            .await?;
        Ok(())
    }
}
