//! Logical store definitions.

use crate::{CompressMode, Properties};
use coffer_error::{BuilderError, BuilderErrorKind, CofferResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named configuration selecting a backend and its properties.
///
/// Loaded once from persisted configuration and immutable afterwards.
///
/// # Examples
///
/// ```
/// use coffer_core::{Properties, StoreDefinition};
///
/// let store = StoreDefinition::builder()
///     .id(1)
///     .name("attachments")
///     .backend("filesystem")
///     .properties(Properties::from_iter([("base-name", "/var/lib/coffer")]))
///     .build()
///     .unwrap();
///
/// assert_eq!(store.name(), "attachments");
/// assert_eq!(store.backend(), "filesystem");
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct StoreDefinition {
    /// Numeric store id
    id: i64,
    /// Globally unique store id
    #[builder(default = "Uuid::new_v4()")]
    uuid: Uuid,
    /// Store name
    name: String,
    /// Identifier of the backend in the resource registry
    backend: String,
    /// Backend configuration
    #[builder(default)]
    #[serde(default)]
    properties: Properties,
}

impl StoreDefinition {
    /// Creates a new store definition builder.
    pub fn builder() -> StoreDefinitionBuilder {
        StoreDefinitionBuilder::default()
    }

    /// Compression mode configured for this store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown mode.
    pub fn compress(&self) -> CofferResult<CompressMode> {
        CompressMode::from_properties(&self.properties)
    }
}

impl StoreDefinitionBuilder {
    /// Build the store definition.
    ///
    /// # Errors
    ///
    /// Returns error if a required field is missing.
    pub fn build(&self) -> CofferResult<StoreDefinition> {
        self.build_internal().map_err(|e| {
            let err = match e {
                StoreDefinitionBuilderError::UninitializedField(field) => {
                    BuilderError::new(BuilderErrorKind::MissingField(field.to_string()))
                }
                other => BuilderError::from(other.to_string()),
            };
            err.into()
        })
    }
}
