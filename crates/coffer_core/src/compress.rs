//! Compression mode selection.

use crate::Properties;
use coffer_error::{CofferResult, ConfigError};
use serde::{Deserialize, Serialize};

/// Store property selecting the compression mode.
pub const COMPRESS_PROPERTY: &str = "compress";

/// Framing applied to content before it reaches a backend.
///
/// The same mode is applied regardless of backend; it is selected once per
/// store through the `compress` property.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum CompressMode {
    /// Content stored as-is
    #[default]
    #[display("none")]
    None,
    /// Single-entry zip archive named after the file
    #[display("zip")]
    Zip,
    /// gzip stream
    #[display("gzip")]
    Gzip,
}

impl CompressMode {
    /// Convert to string representation for configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressMode::None => "none",
            CompressMode::Zip => "zip",
            CompressMode::Gzip => "gzip",
        }
    }

    /// Read the mode from a store's properties, defaulting to [`CompressMode::None`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown mode.
    pub fn from_properties(properties: &Properties) -> CofferResult<Self> {
        match properties.get(COMPRESS_PROPERTY) {
            Some(value) => value.parse().map_err(|e: String| ConfigError::new(e).into()),
            None => Ok(CompressMode::None),
        }
    }
}

impl std::str::FromStr for CompressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(CompressMode::None),
            "zip" => Ok(CompressMode::Zip),
            "gzip" => Ok(CompressMode::Gzip),
            other => Err(format!("Unknown compression mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("GZIP".parse::<CompressMode>().unwrap(), CompressMode::Gzip);
        assert_eq!(" Zip ".parse::<CompressMode>().unwrap(), CompressMode::Zip);
        assert_eq!("".parse::<CompressMode>().unwrap(), CompressMode::None);
        assert!("brotli".parse::<CompressMode>().is_err());
    }

    #[test]
    fn test_missing_property_means_none() {
        let properties = Properties::default();
        assert_eq!(
            CompressMode::from_properties(&properties).unwrap(),
            CompressMode::None
        );
    }

    #[test]
    fn test_unknown_property_is_config_error() {
        let properties = Properties::from_iter([(COMPRESS_PROPERTY, "lz4")]);
        let err = CompressMode::from_properties(&properties).unwrap_err();
        assert!(err.is_config());
    }
}
