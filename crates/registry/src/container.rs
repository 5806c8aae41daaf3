//! Dependency resolution for data store handles
//!
//! The registries never construct handles themselves: they look up a
//! [`DataStoreType`] and hand it to a [`DataStoreResolver`]. This module
//! provides the in-process resolver, a constructor map keyed by `TypeId`.
//!
//! ## Lifetimes
//!
//! | Lifetime | Cached in | Resolvable from |
//! |---|---|---|
//! | `Transient` | nowhere | container and scopes |
//! | `Singleton` | the provider (once per container) | container and scopes |
//! | `Scoped` | the [`ServiceScope`] | scopes only |
//!
//! Constructor errors are returned to the caller unchanged.

use crate::bindings::ScopedDataStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::sync::Arc;
use tessera_core::{DataStore, DataStoreKind, DataStoreType, Error, Result};
use tracing::debug;

/// Produces handle instances for a handle type
pub trait DataStoreResolver: Send + Sync {
    /// Materialise an instance of `store_type`
    fn resolve(&self, store_type: &DataStoreType) -> Result<Arc<dyn DataStore>>;
}

/// Caching policy of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// New instance on every resolution
    Transient,
    /// One instance per service scope
    Scoped,
    /// One instance per container
    Singleton,
}

type Constructor = Arc<dyn Fn(&dyn DataStoreResolver) -> Result<Arc<dyn DataStore>> + Send + Sync>;

struct Provider {
    store_type: DataStoreType,
    lifetime: ServiceLifetime,
    constructor: Constructor,
    singleton: OnceCell<Arc<dyn DataStore>>,
}

impl Provider {
    fn activate(&self, resolver: &dyn DataStoreResolver) -> Result<Arc<dyn DataStore>> {
        debug!(
            target: "tessera::container",
            store_type = self.store_type.type_name(),
            lifetime = ?self.lifetime,
            "Activating data store"
        );
        (self.constructor)(resolver)
    }

    fn singleton(&self, resolver: &dyn DataStoreResolver) -> Result<Arc<dyn DataStore>> {
        self.singleton
            .get_or_try_init(|| self.activate(resolver))
            .map(Arc::clone)
    }
}

/// Root dependency container
///
/// Providers are registered at startup; the container is then shared as
/// `Arc<ServiceContainer>` and used directly or through [`ServiceScope`]s.
#[derive(Default)]
pub struct ServiceContainer {
    providers: DashMap<TypeId, Arc<Provider>>,
    keys: DashMap<String, TypeId>,
}

impl ServiceContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transient provider for `T`
    pub fn add_transient<T, F>(&self, constructor: F) -> Result<()>
    where
        T: DataStoreKind,
        F: Fn(&dyn DataStoreResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Transient, constructor)
    }

    /// Register a scoped provider for `T`
    pub fn add_scoped<T, F>(&self, constructor: F) -> Result<()>
    where
        T: DataStoreKind,
        F: Fn(&dyn DataStoreResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Scoped, constructor)
    }

    /// Register a singleton provider for `T`
    pub fn add_singleton<T, F>(&self, constructor: F) -> Result<()>
    where
        T: DataStoreKind,
        F: Fn(&dyn DataStoreResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Singleton, constructor)
    }

    /// Register an already-built singleton instance of `T`
    pub fn add_instance<T: DataStoreKind>(&self, instance: Arc<T>) -> Result<()> {
        let store_type = DataStoreType::of::<T>();
        let key = store_type.short_name().to_string();
        let provider = Provider {
            store_type,
            lifetime: ServiceLifetime::Singleton,
            constructor: Arc::new(|_: &dyn DataStoreResolver| -> Result<Arc<dyn DataStore>> {
                Err(Error::Activation {
                    type_name: std::any::type_name::<T>(),
                    reason: "instance provider has no constructor".to_string(),
                })
            }),
            singleton: OnceCell::with_value(instance as Arc<dyn DataStore>),
        };
        self.insert(key, provider)
    }

    /// Register a provider for `T` with an explicit lifetime
    ///
    /// The provider's catalog key is the type's short name.
    ///
    /// # Errors
    ///
    /// `Error::DuplicateBinding` if `T` already has a provider.
    pub fn add<T, F>(&self, lifetime: ServiceLifetime, constructor: F) -> Result<()>
    where
        T: DataStoreKind,
        F: Fn(&dyn DataStoreResolver) -> Result<T> + Send + Sync + 'static,
    {
        let key = DataStoreType::of::<T>().short_name().to_string();
        self.add_keyed::<T, F>(key, lifetime, constructor)
    }

    /// Register a provider for `T` under a custom catalog key
    pub fn add_keyed<T, F>(
        &self,
        key: impl Into<String>,
        lifetime: ServiceLifetime,
        constructor: F,
    ) -> Result<()>
    where
        T: DataStoreKind,
        F: Fn(&dyn DataStoreResolver) -> Result<T> + Send + Sync + 'static,
    {
        let provider = Provider {
            store_type: DataStoreType::of::<T>(),
            lifetime,
            constructor: Arc::new(
                move |resolver: &dyn DataStoreResolver| -> Result<Arc<dyn DataStore>> {
                    constructor(resolver).map(|store| Arc::new(store) as Arc<dyn DataStore>)
                },
            ),
            singleton: OnceCell::new(),
        };
        self.insert(key.into(), provider)
    }

    fn insert(&self, key: String, provider: Provider) -> Result<()> {
        let type_id = provider.store_type.type_id();
        let type_name = provider.store_type.type_name();

        // Locks are always taken keys first, then providers
        let key_slot = match self.keys.entry(key) {
            Entry::Occupied(existing) => return Err(Error::duplicate(existing.key().clone())),
            Entry::Vacant(key_slot) => key_slot,
        };

        match self.providers.entry(type_id) {
            Entry::Occupied(_) => Err(Error::duplicate(type_name)),
            Entry::Vacant(slot) => {
                debug!(
                    target: "tessera::container",
                    key = %key_slot.key(),
                    store_type = type_name,
                    lifetime = ?provider.lifetime,
                    "Registered data store provider"
                );
                slot.insert(Arc::new(provider));
                key_slot.insert(type_id);
                Ok(())
            }
        }
    }

    /// Look up a handle type by catalog key
    pub fn type_for_key(&self, key: &str) -> Option<DataStoreType> {
        let type_id = *self.keys.get(key)?;
        self.providers
            .get(&type_id)
            .map(|provider| provider.store_type.clone())
    }

    /// Lifetime registered for `store_type`
    pub fn lifetime_of(&self, store_type: &DataStoreType) -> Option<ServiceLifetime> {
        self.providers
            .get(&store_type.type_id())
            .map(|provider| provider.lifetime)
    }

    /// Check whether `T` has a provider
    pub fn contains<T: DataStoreKind>(&self) -> bool {
        self.providers.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if no provider is registered
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Open a new service scope
    pub fn create_scope(self: &Arc<Self>) -> Arc<ServiceScope> {
        Arc::new(ServiceScope {
            root: Arc::clone(self),
            instances: DashMap::new(),
            data_stores: Arc::new(ScopedDataStore::new()),
        })
    }

    fn provider(&self, store_type: &DataStoreType) -> Result<Arc<Provider>> {
        self.providers
            .get(&store_type.type_id())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::ServiceNotRegistered {
                type_name: store_type.type_name(),
            })
    }
}

impl DataStoreResolver for ServiceContainer {
    fn resolve(&self, store_type: &DataStoreType) -> Result<Arc<dyn DataStore>> {
        let provider = self.provider(store_type)?;
        match provider.lifetime {
            ServiceLifetime::Transient => provider.activate(self),
            ServiceLifetime::Singleton => provider.singleton(self),
            ServiceLifetime::Scoped => Err(Error::ScopeRequired {
                type_name: store_type.type_name(),
            }),
        }
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("provider_count", &self.providers.len())
            .finish()
    }
}

/// One logical scope (a request, a job) over a [`ServiceContainer`]
///
/// Caches scoped instances and owns the scope's [`ScopedDataStore`] binding
/// table; both are discarded when the scope is dropped.
pub struct ServiceScope {
    root: Arc<ServiceContainer>,
    instances: DashMap<TypeId, Arc<dyn DataStore>>,
    data_stores: Arc<ScopedDataStore>,
}

impl ServiceScope {
    /// Container this scope was opened from
    pub fn root(&self) -> &Arc<ServiceContainer> {
        &self.root
    }

    /// Name → type table owned by this scope
    pub fn data_stores(&self) -> Arc<ScopedDataStore> {
        Arc::clone(&self.data_stores)
    }

    /// Number of scoped instances created so far
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl DataStoreResolver for ServiceScope {
    fn resolve(&self, store_type: &DataStoreType) -> Result<Arc<dyn DataStore>> {
        let provider = self.root.provider(store_type)?;
        match provider.lifetime {
            ServiceLifetime::Transient => provider.activate(self),
            ServiceLifetime::Singleton => provider.singleton(self.root.as_ref()),
            ServiceLifetime::Scoped => {
                let type_id = store_type.type_id();
                if let Some(existing) = self.instances.get(&type_id) {
                    return Ok(Arc::clone(existing.value()));
                }

                // Construct outside the map lock: the constructor may resolve
                // other scoped handles through this scope.
                let created = provider.activate(self)?;
                let winner = self.instances.entry(type_id).or_insert(created);
                Ok(Arc::clone(winner.value()))
            }
        }
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("instance_count", &self.instances.len())
            .field("data_stores", &self.data_stores)
            .finish()
    }
}
