//! Store events driving the resource lifecycle.

use serde::{Deserialize, Serialize};

/// The kind of operation a resource was opened for.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum StoreEvent {
    /// Content is being read
    #[display("read")]
    Read,
    /// Content is being written
    #[display("write")]
    Write,
    /// Content is being deleted
    #[display("delete")]
    Delete,
    /// Not opened yet
    #[default]
    #[display("unknown")]
    Unknown,
}
