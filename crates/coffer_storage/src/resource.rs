//! The contract every storage backend implements.

use crate::{ContentReader, ResourceBase};
use coffer_core::{RecoverScan, StoreEvent, TransactionId, Vote};
use coffer_error::{CofferError, CofferResult, StorageError, StorageErrorKind};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Storage of one object's content in one backend, driven through a
/// two-phase-commit style lifecycle.
///
/// Resources are created per operation by the
/// [`ResourceRegistry`](crate::ResourceRegistry), used by a single task and
/// closed by exactly one `commit` or `rollback`. Mutations are not visible
/// to readers before `commit` on backends that stage (filesystem,
/// repository); relational and object-storage writes follow the visibility
/// of their native transaction or PUT.
#[async_trait::async_trait]
pub trait Resource: Send {
    /// Shared state.
    fn base(&self) -> &ResourceBase;

    /// Shared state, mutably.
    fn base_mut(&mut self) -> &mut ResourceBase;

    /// Backend identifier this resource was created for.
    fn backend(&self) -> &'static str;

    /// Whether committed content exists. Never changes stored state.
    async fn exists(&mut self) -> CofferResult<bool>;

    /// Current committed content, decompressed. `None` if nothing is stored.
    async fn read(&mut self) -> CofferResult<Option<ContentReader>>;

    /// Store new content.
    ///
    /// A non-negative `size` consumes at most that many bytes; a negative one
    /// drains `data`. Returns the number of content bytes accepted.
    async fn write(&mut self, data: ContentReader, size: i64, file_name: &str)
    -> CofferResult<i64>;

    /// Mark the content for removal.
    async fn delete(&mut self) -> CofferResult<()>;

    /// Make the pending operation durable and close the resource.
    async fn commit(&mut self, xid: &TransactionId, one_phase: bool) -> CofferResult<()>;

    /// Discard the pending operation and close the resource.
    async fn rollback(&mut self, xid: &TransactionId) -> CofferResult<()>;

    /// Open the resource for an event.
    fn open(&mut self, event: StoreEvent) -> CofferResult<()> {
        self.base_mut().open(event)
    }

    /// First phase of a two-phase commit.
    async fn prepare(&mut self, xid: &TransactionId) -> CofferResult<Vote> {
        self.base().ensure_active()?;
        tracing::debug!(%xid, object = %self.base().object(), "Prepared");
        Ok(Vote::Commit)
    }

    /// Forget a heuristically completed branch.
    async fn forget(&mut self, xid: &TransactionId) -> CofferResult<()> {
        tracing::debug!(%xid, "Nothing to forget");
        Ok(())
    }

    /// Prepared branches awaiting completion. Resources keep none.
    async fn recover(&mut self, scan: RecoverScan) -> CofferResult<Vec<TransactionId>> {
        tracing::debug!(%scan, "Nothing to recover");
        Ok(Vec::new())
    }

    /// Transaction timeout in seconds.
    fn transaction_timeout(&self) -> u32 {
        self.base().transaction_timeout()
    }

    /// Set the transaction timeout in seconds.
    fn set_transaction_timeout(&mut self, seconds: u32) -> bool {
        self.base_mut().set_transaction_timeout(seconds)
    }

    /// Name recorded for the content, if any.
    async fn file_name(&mut self) -> CofferResult<Option<String>> {
        Ok(self.base_mut().content_info().await?.map(|info| info.file_name))
    }

    /// Length recorded for the content, if any.
    async fn file_length(&mut self) -> CofferResult<Option<u64>> {
        Ok(self.base_mut().content_info().await?.map(|info| info.file_length))
    }

    /// Copy the committed content into `sink` without committing.
    ///
    /// Returns the number of bytes copied, or `None` when nothing is stored.
    async fn read_into(
        &mut self,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> CofferResult<Option<u64>> {
        let Some(mut reader) = self.read().await? else {
            return Ok(None);
        };

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buffer).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.base().object(),
                    e
                )))
            })?;
            if n == 0 {
                break;
            }
            sink.write_all(&buffer[..n])
                .await
                .map_err(|e| StorageError::new(StorageErrorKind::Io(e.to_string())))?;
            total += n as u64;
        }
        sink.flush()
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Io(e.to_string())))?;

        tracing::debug!(object = %self.base().object(), bytes = total, "Copied content");
        Ok(Some(total))
    }
}

/// Reclassify a failure during the commit step.
#[track_caller]
pub(crate) fn as_commit_failure(err: CofferError) -> CofferError {
    if err.is_commit_failure() {
        return err;
    }
    StorageError::new(StorageErrorKind::CommitFailure(err.to_string())).into()
}

/// Content stream that remembers the resource it was read from.
///
/// [`close`](ResourceStream::close) commits the read; dropping the stream or
/// calling [`discard`](ResourceStream::discard) leaves the resource open for
/// the coordinator.
pub struct ResourceStream<'a> {
    reader: ContentReader,
    resource: &'a mut dyn Resource,
}

impl<'a> ResourceStream<'a> {
    /// Read the resource, returning `None` when nothing is stored.
    pub async fn open(resource: &'a mut dyn Resource) -> CofferResult<Option<Self>> {
        let content = resource.read().await?;
        match content {
            Some(reader) => Ok(Some(Self { reader, resource })),
            None => Ok(None),
        }
    }

    /// Close the stream and commit the read-open resource.
    pub async fn close(self) -> CofferResult<()> {
        let Self { reader, resource } = self;
        drop(reader);
        resource.commit(&TransactionId::new(), true).await
    }

    /// Close the stream without committing.
    pub fn discard(self) {
        tracing::debug!(object = %self.resource.base().object(), "Discarded content stream");
    }
}

impl AsyncRead for ResourceStream<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}
