//! Tessera - named data store registry with transactional enlistment
//!
//! Tessera lets an application work with several independently configured
//! data stores by logical name ("OrdersDb", "Catalog") and ties the handles
//! it touches to the unit of work that is in flight.
//!
//! # Quick Start
//!
//! ```ignore
//! use tessera::*;
//!
//! let container = Arc::new(ServiceContainer::new());
//! container.add_scoped(|_| Ok(SqlHandle::connect()))?;
//!
//! let scope = container.create_scope();
//! let registry = ScopedDataStoreRegistry::for_scope(&scope);
//! registry.register::<SqlHandle>("OrdersDb")?;
//!
//! let manager = UnitOfWorkManager::new();
//! let ledger = Arc::new(DataStoreEnlistmentProvider::new());
//!
//! let unit = manager.begin_unit_of_work()?;
//! unit.subscribe(Arc::new(EnlistmentFinalizer::new(ledger.clone())));
//! let orders = registry.get_data_store("OrdersDb")?;
//! ledger.enlist_data_store(unit.transaction_id(), orders);
//! unit.commit()?; // flushes and disposes OrdersDb
//! ```
//!
//! # Architecture
//!
//! - `tessera-core`: handle contract, binding value, errors
//! - `tessera-registry`: binding tables, registries, factory, container
//! - `tessera-concurrency`: enlistment ledger, units of work, manager
//! - [`config`]: the `tessera.toml` surface

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;

pub use config::{DataStoreConfig, TesseraConfig, CONFIG_FILE_NAME};
pub use tessera_concurrency::*;
pub use tessera_core::*;
pub use tessera_registry::*;
