//! Error types for the Coffer library.
//!
//! This crate provides the foundation error types used throughout the Coffer workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! The storage taxonomy maps onto four externally visible classes:
//! configuration problems ([`ConfigError`]), missing content
//! ([`StorageErrorKind::NotFound`]), transport failures ([`StorageErrorKind::Io`]
//! and friends) and commit failures ([`StorageErrorKind::CommitFailure`]).
//!
//! # Examples
//!
//! ```
//! use coffer_error::{CofferResult, ConfigError};
//!
//! fn read_root() -> CofferResult<String> {
//!     Err(ConfigError::new("base-name is required"))?
//! }
//!
//! match read_root() {
//!     Ok(root) => println!("Root: {}", root),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
#[cfg(feature = "database")]
mod database;
mod error;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
#[cfg(feature = "database")]
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{CofferError, CofferErrorKind, CofferResult};
pub use storage::{StorageError, StorageErrorKind};
