//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create a storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write content
    #[display("Failed to write content: {}", _0)]
    FileWrite(String),
    /// Failed to read content
    #[display("Failed to read content: {}", _0)]
    FileRead(String),
    /// Content is not readable at the specified location
    #[display("Content not found: {}", _0)]
    NotFound(String),
    /// Local or remote transport failure
    #[display("I/O failure: {}", _0)]
    Io(String),
    /// Compression or decompression failed
    #[display("Compression failure: {}", _0)]
    Compression(String),
    /// The commit step failed; the surrounding transaction must roll back
    #[display("Commit failed, transaction must roll back: {}", _0)]
    CommitFailure(String),
    /// Operation not allowed in the current lifecycle state
    #[display("Invalid resource state: {}", _0)]
    InvalidState(String),
    /// Storage backend is unavailable
    #[display("Storage unavailable: {}", _0)]
    Unavailable(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use coffer_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("/path/to/file".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }

    /// Re-classify this error as a commit failure, keeping the original message.
    #[track_caller]
    pub fn into_commit_failure(self) -> Self {
        match self.kind {
            StorageErrorKind::CommitFailure(_) => self,
            other => Self::new(StorageErrorKind::CommitFailure(other.to_string())),
        }
    }
}
