//! Top-level error wrapper types.

use crate::{BuilderError, ConfigError, StorageError, StorageErrorKind};
#[cfg(feature = "database")]
use crate::DatabaseError;

/// This is the foundation error enum.
///
/// # Examples
///
/// ```
/// use coffer_error::{CofferError, StorageError, StorageErrorKind};
///
/// let storage_err = StorageError::new(StorageErrorKind::Io("connection reset".into()));
/// let err: CofferError = storage_err.into();
/// assert!(format!("{}", err).contains("I/O failure"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum CofferErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Database error
    #[cfg(feature = "database")]
    #[from(DatabaseError)]
    Database(DatabaseError),
}

/// Coffer error with kind discrimination.
///
/// # Examples
///
/// ```
/// use coffer_error::{CofferResult, ConfigError};
///
/// fn might_fail() -> CofferResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Coffer Error: {}", _0)]
pub struct CofferError(Box<CofferErrorKind>);

impl CofferError {
    /// Create a new error from a kind.
    pub fn new(kind: CofferErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &CofferErrorKind {
        &self.0
    }

    /// The storage error kind, when this is a storage error.
    pub fn storage_kind(&self) -> Option<&StorageErrorKind> {
        match self.kind() {
            CofferErrorKind::Storage(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Whether the coordinator must treat the transaction as rollback-only.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self.storage_kind(), Some(StorageErrorKind::CommitFailure(_)))
    }

    /// Whether this error reports unreadable or missing content.
    pub fn is_not_found(&self) -> bool {
        matches!(self.storage_kind(), Some(StorageErrorKind::NotFound(_)))
    }

    /// Whether this error reports a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self.kind(), CofferErrorKind::Config(_))
    }
}

// Generic From implementation for any type that converts to CofferErrorKind
impl<T> From<T> for CofferError
where
    T: Into<CofferErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Coffer operations.
pub type CofferResult<T> = std::result::Result<T, CofferError>;
