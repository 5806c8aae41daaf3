//! Completion of enlisted data stores
//!
//! When a unit of work completes, the handles enlisted under its
//! transaction id are drained from the ledger and finalized:
//!
//! 1. on `Committed`, each handle is flushed
//! 2. every handle is disposed, whatever the outcome
//!
//! A failing handle does not stop the others from being finalized. The first
//! error is returned after every handle has been visited.
//!
//! [`EnlistmentFinalizer`] wires this to a unit of work's completion event.

use crate::enlistment::DataStoreEnlistmentProvider;
use crate::unit_of_work::{UnitOfWork, UnitOfWorkListener, UnitOfWorkOutcome};
use std::sync::Arc;
use tessera_core::{DataStore, Error, Result, TransactionId};
use tracing::{debug, warn};

/// Counts from one finalization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Handles that flushed successfully
    pub flushed: usize,
    /// Handles that disposed successfully
    pub disposed: usize,
    /// Flush or dispose calls that failed
    pub failures: usize,
}

#[derive(Default)]
struct Pass {
    report: FinalizeReport,
    first_error: Option<Error>,
}

impl Pass {
    fn record(
        &mut self,
        transaction_id: TransactionId,
        step: &'static str,
        handle: &Arc<dyn DataStore>,
        result: Result<()>,
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: "tessera::finalize",
                    transaction_id = %transaction_id,
                    store_type = handle.type_name(),
                    step,
                    error = %e,
                    "Data store finalization failed"
                );
                self.report.failures += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
                false
            }
        }
    }

    fn finish(
        self,
        transaction_id: TransactionId,
        outcome: UnitOfWorkOutcome,
    ) -> Result<FinalizeReport> {
        debug!(
            target: "tessera::finalize",
            transaction_id = %transaction_id,
            outcome = outcome.as_str(),
            flushed = self.report.flushed,
            disposed = self.report.disposed,
            failures = self.report.failures,
            "Finalized enlisted data stores"
        );
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

/// Drain and finalize the handles enlisted under `transaction_id`
///
/// A transaction with no enlistments yields an empty report.
pub fn finalize_transaction(
    ledger: &DataStoreEnlistmentProvider,
    transaction_id: TransactionId,
    outcome: UnitOfWorkOutcome,
) -> Result<FinalizeReport> {
    let Some(handles) = ledger.take_enlisted_data_stores(transaction_id) else {
        return Ok(FinalizeReport::default());
    };

    let mut pass = Pass::default();
    for handle in &handles {
        if outcome == UnitOfWorkOutcome::Committed
            && pass.record(transaction_id, "flush", handle, handle.flush())
        {
            pass.report.flushed += 1;
        }
        if pass.record(transaction_id, "dispose", handle, handle.dispose()) {
            pass.report.disposed += 1;
        }
    }
    pass.finish(transaction_id, outcome)
}

/// Async variant of [`finalize_transaction`], disposing through
/// [`DataStore::dispose_async`]
///
/// Handles are finalized one after another.
pub async fn finalize_transaction_async(
    ledger: &DataStoreEnlistmentProvider,
    transaction_id: TransactionId,
    outcome: UnitOfWorkOutcome,
) -> Result<FinalizeReport> {
    let Some(handles) = ledger.take_enlisted_data_stores(transaction_id) else {
        return Ok(FinalizeReport::default());
    };

    let mut pass = Pass::default();
    for handle in &handles {
        if outcome == UnitOfWorkOutcome::Committed
            && pass.record(transaction_id, "flush", handle, handle.flush())
        {
            pass.report.flushed += 1;
        }
        let disposed = handle.dispose_async().await;
        if pass.record(transaction_id, "dispose", handle, disposed) {
            pass.report.disposed += 1;
        }
    }
    pass.finish(transaction_id, outcome)
}

/// Listener that finalizes a unit's enlisted handles on completion
///
/// Subscribe it to each unit of work whose handles are enlisted in `ledger`.
/// Errors cannot propagate out of a listener, so they are logged.
pub struct EnlistmentFinalizer {
    ledger: Arc<DataStoreEnlistmentProvider>,
}

impl EnlistmentFinalizer {
    /// Finalizer draining `ledger`
    pub fn new(ledger: Arc<DataStoreEnlistmentProvider>) -> Self {
        EnlistmentFinalizer { ledger }
    }
}

impl UnitOfWorkListener for EnlistmentFinalizer {
    fn scope_beginning(&self, _unit_of_work: &UnitOfWork) {}

    fn scope_completed(&self, unit_of_work: &UnitOfWork) {
        let Some(outcome) = unit_of_work.outcome() else {
            return;
        };
        if let Err(e) = finalize_transaction(&self.ledger, unit_of_work.transaction_id(), outcome) {
            warn!(
                target: "tessera::finalize",
                transaction_id = %unit_of_work.transaction_id(),
                error = %e,
                "Finalization after completion reported an error"
            );
        }
    }
}
