//! Data store registry: resolve a handle instance by logical name
//!
//! A registry combines a name → type binding table with a resolver:
//!
//! ```text
//! get_data_store("OrdersDb")
//!   1. bindings.resolve("OrdersDb")   -> DataStoreType (or DataStoreNotFound)
//!   2. resolver.resolve(&type)        -> Arc<dyn DataStore> (errors unchanged)
//! ```
//!
//! Nothing is cached here. Whether two calls yield the same instance is
//! decided by the resolver's lifetime for that type (transient, scoped or
//! singleton).
//!
//! Two implementations share this contract:
//! - [`ScopedDataStoreRegistry`]: bindings live in one [`ScopedDataStore`]
//! - [`StaticDataStoreRegistry`]: bindings live in a [`StaticDataStore`],
//!   normally the process-wide one

use crate::bindings::{DataStoreBindings, ScopedDataStore, StaticDataStore};
use crate::container::{DataStoreResolver, ServiceScope};
use std::sync::Arc;
use tessera_core::{downcast_store, DataStore, DataStoreKind, DataStoreType, Result};
use tracing::debug;

/// Resolve data store handles by logical name
pub trait DataStoreRegistry: Send + Sync {
    /// Resolve the handle bound to `name`
    ///
    /// # Errors
    ///
    /// `Error::DataStoreNotFound` if `name` is not bound; otherwise whatever
    /// the resolver reports, unchanged.
    fn get_data_store(&self, name: &str) -> Result<Arc<dyn DataStore>>;

    /// Bind `name` to `store_type`
    fn register_data_store(&self, name: &str, store_type: DataStoreType) -> Result<()>;

    /// Remove the binding for `name`
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedDataStore` if `name` is not bound.
    fn remove_registered_data_store(&self, name: &str) -> Result<()>;

    /// Resolve the handle bound to `name` as its concrete type
    ///
    /// # Errors
    ///
    /// As [`DataStoreRegistry::get_data_store`], plus `Error::TypeMismatch`
    /// if the bound handle is not a `T`.
    fn get_data_store_as<T: DataStore>(&self, name: &str) -> Result<Arc<T>>
    where
        Self: Sized,
    {
        downcast_store::<T>(self.get_data_store(name)?)
    }

    /// Bind `name` to the handle type `T`
    fn register<T: DataStoreKind>(&self, name: &str) -> Result<()>
    where
        Self: Sized,
    {
        self.register_data_store(name, DataStoreType::of::<T>())
    }
}

fn resolve_by_name(
    registry: &'static str,
    bindings: &dyn DataStoreBindings,
    resolver: &dyn DataStoreResolver,
    name: &str,
) -> Result<Arc<dyn DataStore>> {
    let store_type = bindings.resolve(name)?;
    debug!(
        target: "tessera::registry",
        registry,
        name,
        store_type = store_type.type_name(),
        "Resolving data store"
    );
    resolver.resolve(&store_type)
}

/// Registry whose bindings are owned by one logical scope
pub struct ScopedDataStoreRegistry {
    bindings: Arc<ScopedDataStore>,
    resolver: Arc<dyn DataStoreResolver>,
}

impl ScopedDataStoreRegistry {
    /// Create a registry over an explicit binding table and resolver
    pub fn new(bindings: Arc<ScopedDataStore>, resolver: Arc<dyn DataStoreResolver>) -> Self {
        ScopedDataStoreRegistry { bindings, resolver }
    }

    /// Registry over a service scope's own binding table, resolving through
    /// the same scope
    pub fn for_scope(scope: &Arc<ServiceScope>) -> Self {
        let resolver: Arc<dyn DataStoreResolver> = Arc::clone(scope) as Arc<dyn DataStoreResolver>;
        Self::new(scope.data_stores(), resolver)
    }

    /// Binding table backing this registry
    pub fn bindings(&self) -> &Arc<ScopedDataStore> {
        &self.bindings
    }
}

impl DataStoreRegistry for ScopedDataStoreRegistry {
    fn get_data_store(&self, name: &str) -> Result<Arc<dyn DataStore>> {
        resolve_by_name("scoped", self.bindings.as_ref(), self.resolver.as_ref(), name)
    }

    fn register_data_store(&self, name: &str, store_type: DataStoreType) -> Result<()> {
        self.bindings.register(name, store_type)
    }

    fn remove_registered_data_store(&self, name: &str) -> Result<()> {
        self.bindings.unregister(name).map(|_| ())
    }
}

impl std::fmt::Debug for ScopedDataStoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedDataStoreRegistry")
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Registry whose bindings are shared process-wide
pub struct StaticDataStoreRegistry {
    bindings: Arc<StaticDataStore>,
    resolver: Arc<dyn DataStoreResolver>,
}

impl StaticDataStoreRegistry {
    /// Create a registry over an explicit binding table and resolver
    pub fn new(bindings: Arc<StaticDataStore>, resolver: Arc<dyn DataStoreResolver>) -> Self {
        StaticDataStoreRegistry { bindings, resolver }
    }

    /// Registry over the process-wide [`StaticDataStore`]
    pub fn shared(resolver: Arc<dyn DataStoreResolver>) -> Self {
        Self::new(StaticDataStore::shared(), resolver)
    }

    /// Binding table backing this registry
    pub fn bindings(&self) -> &Arc<StaticDataStore> {
        &self.bindings
    }
}

impl DataStoreRegistry for StaticDataStoreRegistry {
    fn get_data_store(&self, name: &str) -> Result<Arc<dyn DataStore>> {
        resolve_by_name("static", self.bindings.as_ref(), self.resolver.as_ref(), name)
    }

    fn register_data_store(&self, name: &str, store_type: DataStoreType) -> Result<()> {
        self.bindings.register(name, store_type)
    }

    fn remove_registered_data_store(&self, name: &str) -> Result<()> {
        self.bindings.unregister(name).map(|_| ())
    }
}

impl std::fmt::Debug for StaticDataStoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDataStoreRegistry")
            .field("bindings", &self.bindings)
            .finish()
    }
}
