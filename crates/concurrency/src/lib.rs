//! Transaction coordination for tessera
//!
//! This crate ties data store handles to logical transactions:
//! - DataStoreEnlistmentProvider: per-transaction ledger of enlisted handles
//! - UnitOfWork: Created → Beginning → Active → Completed state machine
//! - UnitOfWorkManager: active-transaction map and per-thread current unit
//! - finalize: flush/dispose of enlisted handles on completion

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod enlistment;
pub mod finalize;
pub mod manager;
pub mod unit_of_work;

pub use enlistment::DataStoreEnlistmentProvider;
pub use finalize::{
    finalize_transaction, finalize_transaction_async, EnlistmentFinalizer, FinalizeReport,
};
pub use manager::UnitOfWorkManager;
pub use unit_of_work::{
    ActiveUnitOfWork, IsolationLevel, UnitOfWork, UnitOfWorkListener, UnitOfWorkOutcome,
    UnitOfWorkSettings, UnitOfWorkState,
};
