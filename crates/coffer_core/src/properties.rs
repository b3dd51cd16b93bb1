//! String property maps resolved from persisted store configuration.

use coffer_error::{CofferResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property map of a store.
///
/// Values arrive as strings; the typed accessors turn malformed values into
/// configuration errors that name the offending property.
///
/// # Examples
///
/// ```
/// use coffer_core::Properties;
///
/// let props = Properties::from_iter([("number-of-backups", "3"), ("use-type-in-path", "true")]);
/// assert_eq!(props.u32_or("number-of-backups", 1).unwrap(), 3);
/// assert!(props.bool_or("use-type-in-path", false).unwrap());
/// assert_eq!(props.u32_or("number-of-subdirectories", 1).unwrap(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of a property that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the property is missing or blank.
    pub fn required(&self, key: &str) -> CofferResult<&str> {
        match self.get(key).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::new(format!("Missing required property '{}'", key)).into()),
        }
    }

    /// Boolean property with a default for absent values.
    ///
    /// Accepts `true`/`false`, `yes`/`no` and `1`/`0`.
    pub fn bool_or(&self, key: &str, default: bool) -> CofferResult<bool> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(value) => match value.as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::new(format!(
                    "Property '{}' must be a boolean, got '{}'",
                    key, value
                ))
                .into()),
            },
        }
    }

    /// Unsigned integer property with a default for absent values.
    pub fn u32_or(&self, key: &str, default: u32) -> CofferResult<u32> {
        match self.get(key).map(str::trim) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| {
                ConfigError::new(format!(
                    "Property '{}' must be a non-negative integer, got '{}'",
                    key, value
                ))
                .into()
            }),
        }
    }

    /// Iterate over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for Properties {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}
