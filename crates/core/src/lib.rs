//! Core types and traits for tessera
//!
//! This crate defines the foundational types used throughout the system:
//! - TransactionId: Unique identifier for a unit of work
//! - DataStore: Contract of a resolvable data store handle
//! - DataStoreType / StoreContract: Runtime handle type identity
//! - DataStoreValue: Validated name → handle type binding
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod store;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use store::{
    downcast_store, AsAnyArc, BoxFuture, DataStore, DataStoreKind, DataStoreType, StoreContract,
};
pub use types::TransactionId;
pub use value::{validate_name, DataStoreValue};
