//! Layered configuration for Coffer.
//!
//! Configuration is merged from, in increasing precedence:
//! - Bundled defaults (`coffer.toml` compiled into the binary)
//! - `~/.config/coffer/coffer.toml`
//! - `./coffer.toml`
//! - `COFFER_*` environment variables (`__` separates nested keys)

use coffer_core::{Properties, StoreDefinition};
use coffer_error::{CofferError, CofferResult, ConfigError};
use coffer_storage::{MemoryStoreSource, StoreSource};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};
use uuid::Uuid;

const DEFAULT_CONFIG: &str = include_str!("../../../coffer.toml");

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// A `[[stores]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Numeric store id
    pub id: i64,
    /// Stable uuid; generated at load time when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Store name
    pub name: String,
    /// Backend identifier
    pub backend: String,
    /// Backend properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl StoreConfig {
    /// Convert to a store definition.
    pub fn to_definition(&self) -> CofferResult<StoreDefinition> {
        StoreDefinition::builder()
            .id(self.id)
            .uuid(self.uuid.unwrap_or_else(Uuid::new_v4))
            .name(self.name.clone())
            .backend(self.backend.clone())
            .properties(Properties::from(self.properties.clone()))
            .build()
    }
}

/// Complete Coffer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct CofferConfig {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Configured stores
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

impl CofferConfig {
    /// Load configuration from a single file on top of the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> CofferResult<Self> {
        debug!("Loading configuration from file");
        let builder = defaults().add_source(File::from(path.as_ref()));
        finish(builder.add_source(environment()))
    }

    /// Load configuration with precedence: environment > current dir > home dir > bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a present file is malformed.
    #[instrument]
    pub fn load() -> CofferResult<Self> {
        debug!("Loading configuration with precedence: environment > current dir > home dir > bundled defaults");

        let mut builder = defaults();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/coffer/coffer.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("coffer").required(false));
        finish(builder.add_source(environment()))
    }

    /// Parse configuration from a TOML string, without defaults.
    pub fn from_toml(content: &str) -> CofferResult<Self> {
        finish(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    /// Store definitions, validated.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate ids or names.
    pub fn store_definitions(&self) -> CofferResult<Vec<StoreDefinition>> {
        let mut ids = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for store in &self.stores {
            if !ids.insert(store.id) {
                return Err(ConfigError::new(format!("Duplicate store id {}", store.id)).into());
            }
            if !names.insert(store.name.as_str()) {
                return Err(
                    ConfigError::new(format!("Duplicate store name '{}'", store.name)).into(),
                );
            }
        }
        self.stores.iter().map(StoreConfig::to_definition).collect()
    }
}

fn defaults() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

fn environment() -> Environment {
    Environment::with_prefix("COFFER").separator("__")
}

fn finish(builder: ConfigBuilder<DefaultState>) -> CofferResult<CofferConfig> {
    builder
        .build()
        .map_err(|e| {
            CofferError::from(ConfigError::new(format!(
                "Failed to build configuration: {}",
                e
            )))
        })?
        .try_deserialize()
        .map_err(|e| {
            CofferError::from(ConfigError::new(format!(
                "Failed to parse configuration: {}",
                e
            )))
        })
}

/// [`StoreSource`] over the `[[stores]]` entries of a [`CofferConfig`].
///
/// Definitions are converted once, so generated uuids stay stable for the
/// lifetime of the source.
#[derive(Debug)]
pub struct ConfigStoreSource {
    inner: MemoryStoreSource,
}

impl ConfigStoreSource {
    /// Build a source from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid store entries.
    pub fn new(config: &CofferConfig) -> CofferResult<Self> {
        Ok(Self {
            inner: MemoryStoreSource::new(config.store_definitions()?),
        })
    }
}

#[async_trait::async_trait]
impl StoreSource for ConfigStoreSource {
    async fn load_by_id(&self, id: i64) -> CofferResult<Option<StoreDefinition>> {
        self.inner.load_by_id(id).await
    }

    async fn load_by_name(&self, name: &str) -> CofferResult<Option<StoreDefinition>> {
        self.inner.load_by_name(name).await
    }

    async fn load_by_uuid(&self, uuid: &Uuid) -> CofferResult<Option<StoreDefinition>> {
        self.inner.load_by_uuid(uuid).await
    }

    async fn load_all(&self) -> CofferResult<Vec<StoreDefinition>> {
        self.inner.load_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_parse() {
        let config = CofferConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.stores.len(), 1);
        assert_eq!(config.stores[0].backend, "filesystem");
    }

    #[test]
    fn test_duplicate_store_names_rejected() {
        let config = CofferConfig::from_toml(
            r#"
            [[stores]]
            id = 1
            name = "files"
            backend = "filesystem"

            [[stores]]
            id = 2
            name = "files"
            backend = "relational"
            "#,
        )
        .unwrap();
        assert!(config.store_definitions().unwrap_err().is_config());
    }
}
