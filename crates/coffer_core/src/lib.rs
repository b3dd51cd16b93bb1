//! Core data types for the Coffer attachment storage library.
//!
//! This crate provides the identity, store and lifecycle types shared by every
//! storage backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod compress;
mod event;
mod object_ref;
mod properties;
mod store;
mod transaction;

pub use compress::{COMPRESS_PROPERTY, CompressMode};
pub use event::StoreEvent;
pub use object_ref::ObjectRef;
pub use properties::Properties;
pub use store::{StoreDefinition, StoreDefinitionBuilder};
pub use transaction::{RecoverScan, TransactionId, Vote};
