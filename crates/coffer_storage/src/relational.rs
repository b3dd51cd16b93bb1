//! Relational blob backend.
//!
//! Content is a single blob column keyed by the owning object id. Writes go
//! straight to the ambient database transaction, so `commit` and `rollback`
//! only close the resource; the coordinator ends the database transaction.

use crate::registry::RELATIONAL_BACKEND;
use crate::{ContentReader, ObjectProperties, Resource, ResourceBase};
use coffer_core::{ObjectRef, StoreDefinition, StoreEvent, TransactionId};
use coffer_error::{CofferResult, StorageError, StorageErrorKind};
use dashmap::DashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Blob column of the content table, accessed on the ambient connection.
#[async_trait::async_trait]
pub trait BlobTable: Send + Sync {
    /// Whether the row exists and its blob column is set.
    async fn has_content(&self, object_id: i64) -> CofferResult<bool>;

    /// The stored blob, if any.
    async fn read_content(&self, object_id: i64) -> CofferResult<Option<Vec<u8>>>;

    /// Update the blob column, inserting the row when it does not exist.
    async fn write_content(&self, object_id: i64, content: Vec<u8>) -> CofferResult<()>;

    /// Clear the blob column.
    async fn clear_content(&self, object_id: i64) -> CofferResult<()>;
}

/// In-process [`BlobTable`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobTable {
    rows: Arc<DashMap<i64, Option<Vec<u8>>>>,
}

impl MemoryBlobTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, including rows whose blob was cleared.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait::async_trait]
impl BlobTable for MemoryBlobTable {
    async fn has_content(&self, object_id: i64) -> CofferResult<bool> {
        Ok(self
            .rows
            .get(&object_id)
            .is_some_and(|row| row.value().is_some()))
    }

    async fn read_content(&self, object_id: i64) -> CofferResult<Option<Vec<u8>>> {
        Ok(self
            .rows
            .get(&object_id)
            .and_then(|row| row.value().clone()))
    }

    async fn write_content(&self, object_id: i64, content: Vec<u8>) -> CofferResult<()> {
        self.rows.insert(object_id, Some(content));
        Ok(())
    }

    async fn clear_content(&self, object_id: i64) -> CofferResult<()> {
        if let Some(mut row) = self.rows.get_mut(&object_id) {
            *row = None;
        }
        Ok(())
    }
}

/// Resource storing content in the relational blob column.
pub struct RelationalResource {
    base: ResourceBase,
    table: Arc<dyn BlobTable>,
}

impl RelationalResource {
    /// Configure a relational resource. The backend takes no properties.
    pub fn new(
        object: ObjectRef,
        store: &StoreDefinition,
        metadata: Arc<dyn ObjectProperties>,
        table: Arc<dyn BlobTable>,
    ) -> CofferResult<Self> {
        Ok(Self {
            base: ResourceBase::new(object, store, metadata)?,
            table,
        })
    }

    fn object_id(&self) -> i64 {
        *self.base.object().id()
    }
}

impl std::fmt::Debug for RelationalResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalResource")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Resource for RelationalResource {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn backend(&self) -> &'static str {
        RELATIONAL_BACKEND
    }

    async fn exists(&mut self) -> CofferResult<bool> {
        self.base.ensure_active()?;
        self.table.has_content(self.object_id()).await
    }

    #[tracing::instrument(skip(self))]
    async fn read(&mut self) -> CofferResult<Option<ContentReader>> {
        self.base.begin(StoreEvent::Read)?;
        let Some(stored) = self.table.read_content(self.object_id()).await? else {
            return Ok(None);
        };
        tracing::debug!(object_id = self.object_id(), bytes = stored.len(), "Selected blob");
        Ok(Some(self.base.decode(Box::new(Cursor::new(stored)))))
    }

    #[tracing::instrument(skip(self, data))]
    async fn write(
        &mut self,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<i64> {
        self.base.begin(StoreEvent::Write)?;

        let (mut encoded, counter) = self.base.encode(data, size, file_name)?;
        let mut stored = Vec::new();
        encoded.read_to_end(&mut stored).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "blob for object {}: {}",
                self.object_id(),
                e
            )))
        })?;

        self.table.write_content(self.object_id(), stored).await?;

        let length = counter.get();
        self.base.record_written(file_name, length).await?;
        tracing::debug!(object_id = self.object_id(), length, "Updated blob");
        Ok(length as i64)
    }

    async fn delete(&mut self) -> CofferResult<()> {
        self.base.begin(StoreEvent::Delete)?;
        self.table.clear_content(self.object_id()).await?;
        tracing::debug!(object_id = self.object_id(), "Cleared blob");
        Ok(())
    }

    async fn commit(&mut self, xid: &TransactionId, one_phase: bool) -> CofferResult<()> {
        self.base.ensure_active()?;
        self.base.close();
        tracing::debug!(%xid, one_phase, "Blob changes follow the ambient transaction");
        Ok(())
    }

    async fn rollback(&mut self, xid: &TransactionId) -> CofferResult<()> {
        self.base.ensure_active()?;
        self.base.close();
        tracing::debug!(%xid, "Blob changes follow the ambient transaction");
        Ok(())
    }
}
