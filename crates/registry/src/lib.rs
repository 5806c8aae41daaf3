//! Named data store registry for tessera
//!
//! This crate maps logical data store names to handle types and resolves
//! handle instances through a dependency container:
//! - DataStoreBindings: name → type tables (ScopedDataStore, StaticDataStore)
//! - DataStoreRegistry: mutable name-based resolution (scoped and static)
//! - DataStoreFactory: resolution from a fixed options table
//! - ServiceContainer / ServiceScope: constructor map with lifetimes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bindings;
pub mod container;
pub mod factory;
pub mod registry;

pub use bindings::{DataStoreBindings, ScopedDataStore, StaticDataStore};
pub use container::{DataStoreResolver, ServiceContainer, ServiceLifetime, ServiceScope};
pub use factory::{DataStoreFactory, DataStoreFactoryOptions};
pub use registry::{DataStoreRegistry, ScopedDataStoreRegistry, StaticDataStoreRegistry};
