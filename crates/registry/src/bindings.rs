//! Name → handle type registries
//!
//! Two interchangeable binding tables map a logical data store name to the
//! concrete handle type that serves it:
//!
//! - [`ScopedDataStore`]: owned by one logical scope (one request, one job)
//!   and dropped with it.
//! - [`StaticDataStore`]: shared by every scope in the process. The shared
//!   instance is initialised lazily on first use; independent instances can
//!   still be created for tests.
//!
//! Both are backed by `DashMap`, so registration uses an atomic
//! insert-if-absent and concurrent registrations of the same name can never
//! silently overwrite each other.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tessera_core::{validate_name, DataStoreType, Error, Result};
use tracing::debug;

/// Name → handle type binding table
pub trait DataStoreBindings: Send + Sync {
    /// Bind `name` to `store_type`
    ///
    /// # Errors
    ///
    /// `Error::DuplicateBinding` if the name is already bound,
    /// `Error::InvalidName` if it is empty.
    fn register(&self, name: &str, store_type: DataStoreType) -> Result<()>;

    /// Look up the handle type bound to `name`
    ///
    /// # Errors
    ///
    /// `Error::DataStoreNotFound` if the name is not bound.
    fn resolve(&self, name: &str) -> Result<DataStoreType>;

    /// Remove the binding for `name`, returning the type it was bound to
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedDataStore` if the name is not bound.
    fn unregister(&self, name: &str) -> Result<DataStoreType>;

    /// Check whether `name` is bound
    fn contains(&self, name: &str) -> bool;

    /// Number of bindings
    fn len(&self) -> usize;

    /// Check if there are no bindings
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All bound names, sorted
    fn names(&self) -> Vec<String>;
}

/// Shared map logic for both binding tables
#[derive(Default)]
struct BindingMap {
    entries: DashMap<String, DataStoreType>,
}

impl BindingMap {
    fn register(&self, scope: &'static str, name: &str, store_type: DataStoreType) -> Result<()> {
        validate_name(name)?;

        match self.entries.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::duplicate(name)),
            Entry::Vacant(slot) => {
                debug!(
                    target: "tessera::registry",
                    scope,
                    name,
                    store_type = store_type.type_name(),
                    "Registered data store binding"
                );
                slot.insert(store_type);
                Ok(())
            }
        }
    }

    fn resolve(&self, name: &str) -> Result<DataStoreType> {
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(name))
    }

    fn unregister(&self, scope: &'static str, name: &str) -> Result<DataStoreType> {
        match self.entries.remove(name) {
            Some((_, store_type)) => {
                debug!(target: "tessera::registry", scope, name, "Removed data store binding");
                Ok(store_type)
            }
            None => Err(Error::unsupported(name)),
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Binding table whose lifetime is bound to one logical scope
#[derive(Default)]
pub struct ScopedDataStore {
    map: BindingMap,
}

impl ScopedDataStore {
    /// Create an empty scoped table
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStoreBindings for ScopedDataStore {
    fn register(&self, name: &str, store_type: DataStoreType) -> Result<()> {
        self.map.register("scoped", name, store_type)
    }

    fn resolve(&self, name: &str) -> Result<DataStoreType> {
        self.map.resolve(name)
    }

    fn unregister(&self, name: &str) -> Result<DataStoreType> {
        self.map.unregister("scoped", name)
    }

    fn contains(&self, name: &str) -> bool {
        self.map.entries.contains_key(name)
    }

    fn len(&self) -> usize {
        self.map.entries.len()
    }

    fn names(&self) -> Vec<String> {
        self.map.names()
    }
}

impl std::fmt::Debug for ScopedDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedDataStore")
            .field("names", &self.map.names())
            .finish()
    }
}

/// Process-wide binding table, initialised on first use
static SHARED_STATIC_DATA_STORE: Lazy<Arc<StaticDataStore>> =
    Lazy::new(|| Arc::new(StaticDataStore::new()));

/// Binding table shared by every scope in the process
#[derive(Default)]
pub struct StaticDataStore {
    map: BindingMap,
}

impl StaticDataStore {
    /// Create an independent table
    ///
    /// Production code normally uses [`StaticDataStore::shared`]; tests create
    /// their own instances so they do not observe each other's bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table
    ///
    /// Initialised lazily and thread-safely on first call; every call returns
    /// the same instance.
    pub fn shared() -> Arc<StaticDataStore> {
        Arc::clone(&SHARED_STATIC_DATA_STORE)
    }
}

impl DataStoreBindings for StaticDataStore {
    fn register(&self, name: &str, store_type: DataStoreType) -> Result<()> {
        self.map.register("static", name, store_type)
    }

    fn resolve(&self, name: &str) -> Result<DataStoreType> {
        self.map.resolve(name)
    }

    fn unregister(&self, name: &str) -> Result<DataStoreType> {
        self.map.unregister("static", name)
    }

    fn contains(&self, name: &str) -> bool {
        self.map.entries.contains_key(name)
    }

    fn len(&self) -> usize {
        self.map.entries.len()
    }

    fn names(&self) -> Vec<String> {
        self.map.names()
    }
}

impl std::fmt::Debug for StaticDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDataStore")
            .field("names", &self.map.names())
            .finish()
    }
}
