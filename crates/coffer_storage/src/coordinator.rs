//! Drives the commit protocol across the resources touched by one unit of work.

use crate::Resource;
use crate::resource::as_commit_failure;
use coffer_core::TransactionId;
use coffer_error::CofferResult;

/// A unit of work spanning one or more resources.
///
/// A single participant is committed in one phase. With several, every
/// participant is prepared before any is committed. When a step fails the
/// participants that have not completed are rolled back and the failure is
/// returned as a commit failure.
///
/// # Examples
///
/// ```
/// use coffer_core::{ObjectRef, Properties, StoreDefinition};
/// use coffer_storage::{BackendContext, ResourceRegistry, Transaction};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = StoreDefinition::builder()
///     .id(1)
///     .name("blobs")
///     .backend("relational")
///     .build()?;
/// let registry = ResourceRegistry::with_builtin();
/// let context = BackendContext::in_memory();
///
/// let mut resource = registry.create(&context, ObjectRef::from_ids(1, 9), &store)?;
/// let data: &[u8] = b"invoice";
/// resource.write(Box::new(data), -1, "invoice.pdf").await?;
///
/// let mut transaction = Transaction::new();
/// transaction.enlist(resource);
/// transaction.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Transaction {
    xid: TransactionId,
    participants: Vec<Box<dyn Resource>>,
}

impl Transaction {
    /// Start a unit of work with a fresh id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction id passed to participants.
    pub fn id(&self) -> &TransactionId {
        &self.xid
    }

    /// Number of enlisted resources.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nothing has been enlisted.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Add a resource to the unit of work.
    pub fn enlist(&mut self, resource: Box<dyn Resource>) {
        tracing::debug!(
            xid = %self.xid,
            object = %resource.base().object(),
            backend = resource.backend(),
            "Enlisted resource"
        );
        self.participants.push(resource);
    }

    /// Commit every participant.
    ///
    /// # Errors
    ///
    /// Returns a commit failure when a participant cannot prepare or commit.
    #[tracing::instrument(skip(self), fields(xid = %self.xid, participants = self.participants.len()))]
    pub async fn commit(mut self) -> CofferResult<()> {
        if self.participants.len() == 1 {
            let xid = self.xid;
            let result = self.participants[0].commit(&xid, true).await;
            return result.map_err(as_commit_failure);
        }

        for index in 0..self.participants.len() {
            let xid = self.xid;
            if let Err(e) = self.participants[index].prepare(&xid).await {
                tracing::warn!(error = %e, "Prepare failed");
                self.roll_back_from(0).await;
                return Err(as_commit_failure(e));
            }
        }

        for index in 0..self.participants.len() {
            let xid = self.xid;
            if let Err(e) = self.participants[index].commit(&xid, false).await {
                tracing::error!(error = %e, committed = index, "Commit failed");
                self.roll_back_from(index + 1).await;
                return Err(as_commit_failure(e));
            }
        }

        tracing::info!("Committed transaction");
        Ok(())
    }

    /// Roll back every participant.
    #[tracing::instrument(skip(self), fields(xid = %self.xid, participants = self.participants.len()))]
    pub async fn rollback(mut self) -> CofferResult<()> {
        let xid = self.xid;
        let mut first_error = None;
        for participant in &mut self.participants {
            if let Err(e) = participant.rollback(&xid).await {
                tracing::warn!(error = %e, "Rollback failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn roll_back_from(&mut self, start: usize) {
        let xid = self.xid;
        for participant in self.participants.iter_mut().skip(start) {
            if participant.base().is_closed() {
                continue;
            }
            if let Err(e) = participant.rollback(&xid).await {
                tracing::warn!(error = %e, "Rollback after failure failed");
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("xid", &self.xid)
            .field("participants", &self.participants.len())
            .finish()
    }
}
