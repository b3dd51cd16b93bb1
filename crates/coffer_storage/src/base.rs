//! State shared by every backend: identity, lifecycle, compression and
//! file bookkeeping.

use crate::{ByteCounter, CompressionWrapper, ContentInfo, ContentReader, ObjectProperties};
use coffer_core::{ObjectRef, Properties, StoreDefinition, StoreEvent};
use coffer_error::{CofferResult, StorageError, StorageErrorKind};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Common state embedded in each backend resource.
///
/// A resource moves through `UNKNOWN → OPEN(event) → COMMIT | ROLLBACK →
/// CLOSED` and is never reused once closed.
pub struct ResourceBase {
    object: ObjectRef,
    store_id: i64,
    store_name: String,
    properties: Properties,
    compression: CompressionWrapper,
    metadata: Arc<dyn ObjectProperties>,
    content: Option<ContentInfo>,
    opened: bool,
    closed: bool,
    event: StoreEvent,
    timeout_secs: u32,
}

impl ResourceBase {
    /// Configure shared state from the store definition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the `compress` property is unknown.
    pub fn new(
        object: ObjectRef,
        store: &StoreDefinition,
        metadata: Arc<dyn ObjectProperties>,
    ) -> CofferResult<Self> {
        let compression = CompressionWrapper::new(store.compress()?);
        Ok(Self {
            object,
            store_id: *store.id(),
            store_name: store.name().clone(),
            properties: store.properties().clone(),
            compression,
            metadata,
            content: None,
            opened: false,
            closed: false,
            event: StoreEvent::Unknown,
            timeout_secs: 0,
        })
    }

    /// The owning object.
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Id of the store this resource was created for.
    pub fn store_id(&self) -> i64 {
        self.store_id
    }

    /// Name of the store this resource was created for.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Store properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Compression decorator chosen for this resource.
    pub fn compression(&self) -> CompressionWrapper {
        self.compression
    }

    /// The event the resource was opened for.
    pub fn event(&self) -> StoreEvent {
        self.event
    }

    /// Whether `open` has been called.
    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Whether the resource has been committed or rolled back.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Fail with an invalid-state error once the resource is closed.
    #[track_caller]
    pub fn ensure_active(&self) -> CofferResult<()> {
        if self.closed {
            return Err(StorageError::new(StorageErrorKind::InvalidState(format!(
                "resource for {} in store {} is closed",
                self.object, self.store_name
            )))
            .into());
        }
        Ok(())
    }

    /// Open the resource for an event.
    pub fn open(&mut self, event: StoreEvent) -> CofferResult<()> {
        self.ensure_active()?;
        tracing::debug!(object = %self.object, store = %self.store_name, %event, "Opened resource");
        self.opened = true;
        self.event = event;
        Ok(())
    }

    /// Open implicitly on first use.
    ///
    /// A write or delete takes precedence over an earlier read so the commit
    /// step acts on the mutation.
    pub fn begin(&mut self, event: StoreEvent) -> CofferResult<()> {
        self.ensure_active()?;
        if !self.opened {
            return self.open(event);
        }
        if matches!(event, StoreEvent::Write | StoreEvent::Delete) {
            self.event = event;
        }
        Ok(())
    }

    /// Mark the resource as finished.
    pub fn close(&mut self) {
        self.opened = false;
        self.closed = true;
    }

    /// Limit, count and compress a caller's stream for storage.
    ///
    /// A non-negative `size` consumes at most that many bytes; a negative one
    /// drains the stream. The counter reports raw bytes once the returned
    /// reader has been drained.
    pub fn encode(
        &self,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<(ContentReader, ByteCounter)> {
        let limited: ContentReader = match u64::try_from(size) {
            Ok(limit) => Box::new(data.take(limit)),
            Err(_) => data,
        };
        let (counted, counter) = ByteCounter::wrap(limited);
        let encoded = self.compression.encode(counted, file_name)?;
        Ok((encoded, counter))
    }

    /// Decompress a stored stream.
    pub fn decode(&self, stored: ContentReader) -> ContentReader {
        self.compression.decode(stored)
    }

    /// Persist file name and length on the owning object.
    pub async fn record_written(&mut self, file_name: &str, length: u64) -> CofferResult<()> {
        let info = ContentInfo::new(file_name, length);
        self.metadata.record_content(&self.object, &info).await?;
        tracing::debug!(object = %self.object, file_name, length, "Recorded content info");
        self.content = Some(info);
        Ok(())
    }

    /// File name and length, loaded from the owning object on first access.
    pub async fn content_info(&mut self) -> CofferResult<Option<ContentInfo>> {
        if self.content.is_none() {
            self.content = self.metadata.content_info(&self.object).await?;
        }
        Ok(self.content.clone())
    }

    /// Transaction timeout in seconds; 0 means the coordinator default.
    pub fn transaction_timeout(&self) -> u32 {
        self.timeout_secs
    }

    /// Set the transaction timeout in seconds.
    pub fn set_transaction_timeout(&mut self, seconds: u32) -> bool {
        self.timeout_secs = seconds;
        true
    }
}

impl std::fmt::Debug for ResourceBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBase")
            .field("object", &self.object)
            .field("store", &self.store_name)
            .field("compression", &self.compression.mode())
            .field("event", &self.event)
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryObjectProperties;

    fn base() -> ResourceBase {
        let store = StoreDefinition::builder()
            .id(3)
            .name("docs")
            .backend("filesystem")
            .build()
            .unwrap();
        ResourceBase::new(
            ObjectRef::from_ids(10, 2),
            &store,
            Arc::new(MemoryObjectProperties::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_mutation_overrides_read_event() {
        let mut base = base();
        base.begin(StoreEvent::Read).unwrap();
        base.begin(StoreEvent::Write).unwrap();
        base.begin(StoreEvent::Read).unwrap();
        assert_eq!(base.event(), StoreEvent::Write);
    }

    #[test]
    fn test_closed_resource_rejects_use() {
        let mut base = base();
        base.close();
        let err = base.begin(StoreEvent::Read).unwrap_err();
        assert!(matches!(
            err.storage_kind(),
            Some(StorageErrorKind::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_known_size_limits_consumption() {
        let base = base();
        let data: &[u8] = b"0123456789";
        let (mut reader, counter) = base.encode(Box::new(data), 4, "digits").unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123");
        assert_eq!(counter.get(), 4);
    }

    #[tokio::test]
    async fn test_content_info_loaded_lazily() {
        let metadata = Arc::new(MemoryObjectProperties::new());
        let object = ObjectRef::from_ids(10, 2);
        metadata
            .record_content(&object, &ContentInfo::new("scan.png", 99))
            .await
            .unwrap();

        let store = StoreDefinition::builder()
            .id(3)
            .name("docs")
            .backend("filesystem")
            .build()
            .unwrap();
        let mut base = ResourceBase::new(object, &store, metadata).unwrap();
        let info = base.content_info().await.unwrap().unwrap();
        assert_eq!(info.file_name, "scan.png");
        assert_eq!(info.file_length, 99);
    }
}
