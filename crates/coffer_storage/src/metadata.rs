//! File name and length bookkeeping on the owning object.

use coffer_core::ObjectRef;
use coffer_error::CofferResult;
use dashmap::DashMap;
use std::sync::Arc;

/// Attachment facts recorded on the owning object after each write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentInfo {
    /// Original file name supplied by the caller
    pub file_name: String,
    /// Number of raw (uncompressed) bytes accepted
    pub file_length: u64,
}

impl ContentInfo {
    /// Create a new content record.
    pub fn new(file_name: impl Into<String>, file_length: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_length,
        }
    }
}

/// Property mechanism of the owning business object.
///
/// Implementations persist the file name and length so they can be shown
/// without opening the content itself.
#[async_trait::async_trait]
pub trait ObjectProperties: Send + Sync {
    /// Record the name and length of freshly written content.
    async fn record_content(&self, object: &ObjectRef, info: &ContentInfo) -> CofferResult<()>;

    /// Previously recorded content facts, if any.
    async fn content_info(&self, object: &ObjectRef) -> CofferResult<Option<ContentInfo>>;
}

/// In-process [`ObjectProperties`] keyed by object id and type.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectProperties {
    entries: Arc<DashMap<(i64, i64), ContentInfo>>,
}

impl MemoryObjectProperties {
    /// Create an empty property store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects with recorded content.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectProperties for MemoryObjectProperties {
    async fn record_content(&self, object: &ObjectRef, info: &ContentInfo) -> CofferResult<()> {
        self.entries
            .insert((*object.id(), *object.type_id()), info.clone());
        Ok(())
    }

    async fn content_info(&self, object: &ObjectRef) -> CofferResult<Option<ContentInfo>> {
        Ok(self
            .entries
            .get(&(*object.id(), *object.type_id()))
            .map(|entry| entry.value().clone()))
    }
}
