//! Options-driven data store factory
//!
//! Functionally equivalent to a [`DataStoreRegistry`](crate::DataStoreRegistry),
//! but the name → type table is an immutable options object populated once
//! at startup. Use it where bindings are fixed by configuration and runtime
//! registry mutation is undesired.
//!
//! ```text
//! let mut options = DataStoreFactoryOptions::new();
//! options.register::<SqlHandle>("OrdersDb")?;
//! options.register::<DocumentHandle>("Catalog")?;
//!
//! let factory = DataStoreFactory::new(options, resolver);
//! let orders = factory.resolve_as::<SqlHandle>("OrdersDb")?;
//! ```

use crate::container::DataStoreResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{downcast_store, DataStore, DataStoreKind, DataStoreValue, Error, Result};
use tracing::debug;

/// Startup-time name → type table consumed by [`DataStoreFactory`]
#[derive(Debug, Clone, Default)]
pub struct DataStoreFactoryOptions {
    bindings: HashMap<String, DataStoreValue>,
}

impl DataStoreFactoryOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to the handle type `T`
    ///
    /// # Errors
    ///
    /// `Error::DuplicateBinding` if `name` is already bound,
    /// `Error::InvalidName` if it is empty.
    pub fn register<T: DataStoreKind>(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.register_value(DataStoreValue::of::<T>(name)?)
    }

    /// Add a validated binding
    pub fn register_value(&mut self, value: DataStoreValue) -> Result<&mut Self> {
        if self.bindings.contains_key(value.name()) {
            return Err(Error::duplicate(value.name()));
        }
        self.bindings.insert(value.name().to_string(), value);
        Ok(self)
    }

    /// Builder-style variant of [`DataStoreFactoryOptions::register`]
    pub fn with<T: DataStoreKind>(mut self, name: impl Into<String>) -> Result<Self> {
        self.register::<T>(name)?;
        Ok(self)
    }

    /// Binding for `name`
    pub fn get(&self, name: &str) -> Option<&DataStoreValue> {
        self.bindings.get(name)
    }

    /// Check whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no binding is configured
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bound names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Resolve handles from a fixed options table
pub struct DataStoreFactory {
    options: Arc<DataStoreFactoryOptions>,
    resolver: Arc<dyn DataStoreResolver>,
}

impl DataStoreFactory {
    /// Freeze `options` into a factory
    pub fn new(options: DataStoreFactoryOptions, resolver: Arc<dyn DataStoreResolver>) -> Self {
        DataStoreFactory {
            options: Arc::new(options),
            resolver,
        }
    }

    /// Factory sharing this one's options but resolving through `resolver`
    ///
    /// Used to hand the same startup table to each service scope.
    pub fn with_resolver(&self, resolver: Arc<dyn DataStoreResolver>) -> Self {
        DataStoreFactory {
            options: Arc::clone(&self.options),
            resolver,
        }
    }

    /// Resolve the handle bound to `name`
    ///
    /// # Errors
    ///
    /// `Error::DataStoreNotFound` if `name` is not in the options; resolver
    /// errors are returned unchanged.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DataStore>> {
        let value = self.options.get(name).ok_or_else(|| Error::not_found(name))?;
        debug!(
            target: "tessera::factory",
            name,
            store_type = value.concrete().type_name(),
            "Resolving data store"
        );
        self.resolver.resolve(value.concrete())
    }

    /// Resolve the handle bound to `name` as its concrete type
    pub fn resolve_as<T: DataStore>(&self, name: &str) -> Result<Arc<T>> {
        downcast_store::<T>(self.resolve(name)?)
    }

    /// The frozen options
    pub fn options(&self) -> &DataStoreFactoryOptions {
        &self.options
    }
}

impl std::fmt::Debug for DataStoreFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStoreFactory")
            .field("names", &self.options.names())
            .finish()
    }
}
