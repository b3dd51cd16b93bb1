//! Transactional attachment storage for Coffer.
//!
//! This crate stores binary content owned by business objects through
//! interchangeable backends that all honour the same commit protocol: a reader
//! never observes a partially written object.
//!
//! # Backends
//!
//! - **filesystem**: writes to a temp sibling, rotates backups and promotes by rename
//! - **relational**: in-place blob update inside the ambient database transaction
//! - **repository**: session-based node storage with an externally persisted node id
//! - **object-storage**: a single remote PUT per write
//!
//! # Example
//!
//! ```rust
//! use coffer_core::{ObjectRef, Properties, StoreDefinition, TransactionId};
//! use coffer_storage::{BackendContext, ResourceRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreDefinition::builder()
//!     .id(1)
//!     .name("attachments")
//!     .backend("filesystem")
//!     .properties(Properties::from_iter([("base-name", "/tmp/coffer")]))
//!     .build()?;
//!
//! let registry = ResourceRegistry::with_builtin();
//! let context = BackendContext::in_memory();
//! let mut resource = registry.create(&context, ObjectRef::from_ids(42, 7), &store)?;
//!
//! let data: &[u8] = b"hello";
//! resource.write(Box::new(data), -1, "hello.txt").await?;
//! resource.commit(&TransactionId::new(), true).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod base;
mod compression;
mod coordinator;
mod filesystem;
pub mod keys;
mod metadata;
mod object_storage;
mod registry;
mod relational;
mod repository;
mod resolver;
mod resource;
mod stream;

pub use base::ResourceBase;
pub use compression::CompressionWrapper;
pub use coordinator::Transaction;
pub use filesystem::FileSystemResource;
pub use metadata::{ContentInfo, MemoryObjectProperties, ObjectProperties};
pub use object_storage::{ClientCache, FILENAME_ATTRIBUTE, ObjectStorageResource};
pub use registry::{
    BackendContext, DEFAULT_REPOSITORY, FILESYSTEM_BACKEND, OBJECT_STORAGE_BACKEND, RELATIONAL_BACKEND,
    REPOSITORY_BACKEND, ResourceFactory, ResourceRegistry,
};
pub use relational::{BlobTable, MemoryBlobTable, RelationalResource};
pub use repository::{
    ContentRepository, Credentials, MemoryNodeIdentifiers, MemoryRepository, NodeContent,
    NodeIdentifiers, RepositoryResource, RepositorySession,
};
pub use resolver::{MemoryStoreSource, StoreResolver, StoreSource};
pub use resource::{Resource, ResourceStream};
pub use stream::{ByteCounter, ContentReader};

pub use coffer_error::{StorageError, StorageErrorKind};
