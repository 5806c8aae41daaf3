//! Handles enlisted into units of work and finalized on completion

use crate::common::*;
use std::sync::Arc;

/// Registry, manager and ledger wired the way an application would.
struct Harness {
    scope: Arc<ServiceScope>,
    registry: ScopedDataStoreRegistry,
    manager: UnitOfWorkManager,
    ledger: Arc<DataStoreEnlistmentProvider>,
}

impl Harness {
    fn new() -> Self {
        let container = standard_container();
        let scope = container.create_scope();
        let registry = ScopedDataStoreRegistry::for_scope(&scope);
        registry.register::<SqlHandle>("OrdersDb").unwrap();
        registry.register::<DocumentHandle>("Catalog").unwrap();
        registry.register::<FailingHandle>("Flaky").unwrap();

        Harness {
            scope,
            registry,
            manager: UnitOfWorkManager::new(),
            ledger: Arc::new(DataStoreEnlistmentProvider::new()),
        }
    }

    fn begin(&self) -> ActiveUnitOfWork {
        let unit = self.manager.begin_unit_of_work().unwrap();
        unit.subscribe(Arc::new(EnlistmentFinalizer::new(self.ledger.clone())));
        unit
    }

    /// Resolve `name` and enlist it into the current unit of work
    fn use_store(&self, name: &str) -> Arc<dyn DataStore> {
        let handle = self.registry.get_data_store(name).unwrap();
        let current = self.manager.current_unit_of_work().unwrap();
        assert!(self
            .ledger
            .enlist_data_store(current.transaction_id(), handle.clone()));
        handle
    }
}

#[test]
fn test_commit_flushes_and_disposes_enlisted() {
    init_tracing();
    let harness = Harness::new();
    let unit = harness.begin();

    harness.use_store("OrdersDb");
    harness.use_store("Catalog");
    assert_eq!(harness.ledger.enlisted_count(unit.transaction_id()), 2);

    let orders = harness
        .registry
        .get_data_store_as::<SqlHandle>("OrdersDb")
        .unwrap();
    let catalog = harness
        .registry
        .get_data_store_as::<DocumentHandle>("Catalog")
        .unwrap();

    unit.commit().unwrap();
    assert_eq!(orders.calls.flushes(), 1);
    assert_eq!(orders.calls.disposals(), 1);
    assert_eq!(catalog.calls.flushes(), 1);
    assert_eq!(harness.ledger.transaction_count(), 0);
}

#[test]
fn test_rollback_disposes_without_flush() {
    let harness = Harness::new();
    let unit = harness.begin();
    harness.use_store("OrdersDb");
    let orders = harness
        .registry
        .get_data_store_as::<SqlHandle>("OrdersDb")
        .unwrap();

    drop(unit);
    assert_eq!(orders.calls.flushes(), 0);
    assert_eq!(orders.calls.disposals(), 1);
}

#[test]
fn test_failing_store_does_not_block_others() {
    let harness = Harness::new();
    let unit = harness.begin();
    let flaky = harness.use_store("Flaky");
    harness.use_store("OrdersDb");
    let orders = harness
        .registry
        .get_data_store_as::<SqlHandle>("OrdersDb")
        .unwrap();

    // Completion itself succeeds; the finalizer logs the flush failure
    unit.commit().unwrap();
    let flaky = downcast_store::<FailingHandle>(flaky).unwrap();
    assert_eq!(flaky.calls.disposals(), 1);
    assert_eq!(orders.calls.flushes(), 1);
    assert_eq!(orders.calls.disposals(), 1);
}

#[test]
fn test_manual_finalization_reports_first_error() {
    let harness = Harness::new();
    let unit = harness.manager.begin_unit_of_work().unwrap();
    harness.use_store("OrdersDb");
    harness.use_store("Flaky");
    let txn = unit.transaction_id();
    unit.commit().unwrap();

    // No finalizer subscribed: the ledger still holds both handles
    assert_eq!(harness.ledger.enlisted_count(txn), 2);
    let err = finalize_transaction(&harness.ledger, txn, UnitOfWorkOutcome::Committed)
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert!(!harness.ledger.remove_enlisted_data_stores(txn));
}

#[test]
fn test_units_keep_separate_enlistments() {
    let harness = Harness::new();

    let first = harness.begin();
    harness.use_store("OrdersDb");
    let first_id = first.transaction_id();

    // A second unit becomes current; its enlistments are its own
    let second = harness.begin();
    harness.use_store("Catalog");
    assert_eq!(harness.ledger.enlisted_count(first_id), 1);
    assert_eq!(harness.ledger.enlisted_count(second.transaction_id()), 1);

    second.rollback().unwrap();
    assert!(harness.ledger.is_enlisted(first_id));
    first.commit().unwrap();
    assert_eq!(harness.ledger.transaction_count(), 0);
    assert_eq!(harness.scope.instance_count(), 1);
}

#[tokio::test]
async fn test_async_finalization() {
    let harness = Harness::new();
    let unit = harness.manager.begin_unit_of_work().unwrap();
    let txn = unit.transaction_id();
    harness.use_store("OrdersDb");
    unit.rollback().unwrap();

    let report = finalize_transaction_async(&harness.ledger, txn, UnitOfWorkOutcome::RolledBack)
        .await
        .unwrap();
    assert_eq!(report.flushed, 0);
    assert_eq!(report.disposed, 1);
}
