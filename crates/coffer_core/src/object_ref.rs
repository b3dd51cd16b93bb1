//! Identity of the business object that owns a piece of content.

use serde::{Deserialize, Serialize};

/// Opaque identity of the owning business object.
///
/// Supplied by the caller and never modified by the store layer. Backends
/// derive their storage keys from it: file paths, SQL row ids, repository
/// node bookkeeping and remote object keys.
///
/// # Examples
///
/// ```
/// use coffer_core::ObjectRef;
///
/// let object = ObjectRef::from_ids(4711, 12);
/// assert_eq!(*object.id(), 4711);
/// assert_eq!(object.stable_key(), "12.4711");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_more::Display,
)]
#[display("{}", stable_key)]
pub struct ObjectRef {
    /// General object id
    id: i64,
    /// Id of the object's type
    type_id: i64,
    /// Stable string key, unique across types
    stable_key: String,
}

impl ObjectRef {
    /// Create a reference with an explicit stable key.
    pub fn new(id: i64, type_id: i64, stable_key: impl Into<String>) -> Self {
        Self {
            id,
            type_id,
            stable_key: stable_key.into(),
        }
    }

    /// Create a reference whose stable key is `typeId.objectId`.
    pub fn from_ids(id: i64, type_id: i64) -> Self {
        Self::new(id, type_id, format!("{}.{}", type_id, id))
    }
}
