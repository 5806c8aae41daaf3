//! Configuration via `tessera.toml`
//!
//! The file carries the unit-of-work defaults and the logical name → handle
//! type table. Handle types are referenced by their catalog key in the
//! [`ServiceContainer`], so the container must be populated before the
//! bindings are applied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tessera_concurrency::UnitOfWorkSettings;
use tessera_core::{DataStoreValue, Error, Result, StoreContract};
use tessera_registry::{DataStoreBindings, DataStoreFactoryOptions, ServiceContainer};
use tracing::debug;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// One `[data_stores.<Name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataStoreConfig {
    /// Catalog key of the handle type in the service container
    #[serde(rename = "type")]
    pub type_key: String,
    /// Contract the handle type must fulfil. Checked when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

/// Configuration loaded from `tessera.toml`.
///
/// # Example
///
/// ```toml
/// [unit_of_work]
/// auto_complete = false
/// isolation_level = "read_committed"
///
/// [data_stores.OrdersDb]
/// type = "SqlHandle"
/// contract = "relational"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TesseraConfig {
    /// Defaults for units of work begun through the manager.
    #[serde(default)]
    pub unit_of_work: UnitOfWorkSettings,
    /// Logical name → handle type bindings.
    #[serde(default)]
    pub data_stores: BTreeMap<String, DataStoreConfig>,
}

impl TesseraConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tessera configuration
#
# Unit-of-work defaults
#   auto_complete   = commit when a unit is dropped without an outcome
#                     (false rolls it back instead)
#   isolation_level = "read_uncommitted", "read_committed" (default),
#                     "repeatable_read", "serializable" or "snapshot"
[unit_of_work]
auto_complete = false
isolation_level = "read_committed"

# Data store bindings. Each section binds a logical name to a handle type
# registered in the service container under the given key.
# [data_stores.OrdersDb]
# type = "SqlHandle"
# contract = "relational"        # optional
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if the text is not a valid config.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the file cannot be read, `Error::InvalidConfig` if it
    /// cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate every `[data_stores]` entry against `container`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidName` for an empty store name
    /// - `Error::DataStoreNotFound` for a type key the container doesn't know
    /// - `Error::TypeMismatch` if the declared contract is not the type's
    pub fn data_store_values(&self, container: &ServiceContainer) -> Result<Vec<DataStoreValue>> {
        self.data_stores
            .iter()
            .map(|(name, entry)| {
                let store_type = container
                    .type_for_key(&entry.type_key)
                    .ok_or_else(|| Error::not_found(entry.type_key.as_str()))?;
                let base = match &entry.contract {
                    Some(contract) => StoreContract::new(contract.as_str()),
                    None => store_type.contract().clone(),
                };
                DataStoreValue::new(name.as_str(), base, store_type)
            })
            .collect()
    }

    /// Build factory options from the `[data_stores]` table.
    pub fn factory_options(&self, container: &ServiceContainer) -> Result<DataStoreFactoryOptions> {
        let mut options = DataStoreFactoryOptions::new();
        for value in self.data_store_values(container)? {
            options.register_value(value)?;
        }
        debug!(target: "tessera::config", bindings = options.len(), "Built factory options");
        Ok(options)
    }

    /// Register the `[data_stores]` table into a binding table.
    ///
    /// All or nothing: a bad entry or a name already bound in `bindings`
    /// fails the call and leaves `bindings` as it was. Collisions report
    /// `Error::DuplicateBinding`.
    pub fn register_into(
        &self,
        bindings: &dyn DataStoreBindings,
        container: &ServiceContainer,
    ) -> Result<()> {
        let values = self.data_store_values(container)?;
        if let Some(taken) = values.iter().find(|value| bindings.contains(value.name())) {
            return Err(Error::duplicate(taken.name()));
        }

        let count = values.len();
        let mut added: Vec<String> = Vec::with_capacity(count);
        for value in values {
            let (name, store_type) = value.into_parts();
            if let Err(err) = bindings.register(&name, store_type) {
                // Bound concurrently since the check; undo this call's entries
                for name in &added {
                    let _ = bindings.unregister(name);
                }
                return Err(err);
            }
            added.push(name);
        }
        debug!(target: "tessera::config", bindings = count, "Registered configured data stores");
        Ok(())
    }
}
