//! Commit-protocol vocabulary shared by resources and the coordinator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a transaction branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("xid:{}", _0)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh branch identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TransactionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A participant's answer to `prepare`.
///
/// Every backend here is effectively single phase, so the only vote is
/// "ready to commit"; a participant that cannot commit fails `prepare`
/// with an error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Vote {
    /// The participant is able to commit
    #[display("commit")]
    Commit,
}

/// Scan position passed to `recover`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RecoverScan {
    /// Start a recovery scan
    #[display("start")]
    Start,
    /// End a recovery scan
    #[display("end")]
    End,
    /// Continue the current scan
    #[default]
    #[display("none")]
    None,
}
