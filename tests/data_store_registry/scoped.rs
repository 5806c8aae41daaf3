//! Scoped registry behavior over a service container

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_orders_db_scenario() {
    init_tracing();
    let container = standard_container();
    let scope = container.create_scope();
    let registry = ScopedDataStoreRegistry::for_scope(&scope);

    registry.register::<SqlHandle>("OrdersDb").unwrap();

    let first = registry.get_data_store_as::<SqlHandle>("OrdersDb").unwrap();
    let second = registry.get_data_store_as::<SqlHandle>("OrdersDb").unwrap();
    // SqlHandle is scoped: one instance per scope
    assert!(Arc::ptr_eq(&first, &second));

    let err = registry.get_data_store("Missing").unwrap_err();
    assert!(matches!(err, Error::DataStoreNotFound { ref name } if name == "Missing"));

    let err = registry.register::<DocumentHandle>("OrdersDb").unwrap_err();
    assert!(matches!(err, Error::DuplicateBinding { .. }));

    registry.remove_registered_data_store("OrdersDb").unwrap();
    assert!(registry.get_data_store("OrdersDb").unwrap_err().is_not_found());

    let err = registry.remove_registered_data_store("OrdersDb").unwrap_err();
    assert!(matches!(err, Error::UnsupportedDataStore { .. }));
}

#[test]
fn test_scopes_do_not_share_bindings_or_instances() {
    let container = standard_container();
    let scope_a = container.create_scope();
    let scope_b = container.create_scope();
    let registry_a = ScopedDataStoreRegistry::for_scope(&scope_a);
    let registry_b = ScopedDataStoreRegistry::for_scope(&scope_b);

    registry_a.register::<SqlHandle>("OrdersDb").unwrap();
    assert!(registry_b.get_data_store("OrdersDb").unwrap_err().is_not_found());

    registry_b.register::<SqlHandle>("OrdersDb").unwrap();
    let a = registry_a.get_data_store_as::<SqlHandle>("OrdersDb").unwrap();
    let b = registry_b.get_data_store_as::<SqlHandle>("OrdersDb").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_singleton_shared_across_scopes() {
    let container = standard_container();
    let a = ScopedDataStoreRegistry::for_scope(&container.create_scope());
    let b = ScopedDataStoreRegistry::for_scope(&container.create_scope());
    a.register::<DocumentHandle>("Catalog").unwrap();
    b.register::<DocumentHandle>("Catalog").unwrap();

    let first = a.get_data_store_as::<DocumentHandle>("Catalog").unwrap();
    let second = b.get_data_store_as::<DocumentHandle>("Catalog").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_transient_is_fresh_each_time() {
    let container = standard_container();
    let registry = ScopedDataStoreRegistry::for_scope(&container.create_scope());
    registry.register::<FailingHandle>("Flaky").unwrap();

    let first = registry.get_data_store_as::<FailingHandle>("Flaky").unwrap();
    let second = registry.get_data_store_as::<FailingHandle>("Flaky").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_bound_but_unprovided_type() {
    struct Orphan;

    impl DataStore for Orphan {
        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn dispose(&self) -> Result<()> {
            Ok(())
        }
    }

    impl DataStoreKind for Orphan {}

    let container = standard_container();
    let registry = ScopedDataStoreRegistry::for_scope(&container.create_scope());
    registry.register::<Orphan>("Orphaned").unwrap();

    assert!(matches!(
        registry.get_data_store("Orphaned"),
        Err(Error::ServiceNotRegistered { .. })
    ));
}

#[test]
fn test_scoped_type_through_root_container() {
    let container = standard_container();
    let bindings = Arc::new(ScopedDataStore::new());
    let registry = ScopedDataStoreRegistry::new(bindings, container);
    registry.register::<SqlHandle>("OrdersDb").unwrap();

    assert!(matches!(
        registry.get_data_store("OrdersDb"),
        Err(Error::ScopeRequired { .. })
    ));
}

#[test]
fn test_concurrent_resolution_yields_one_scoped_instance() {
    const THREADS: usize = 16;

    let container = standard_container();
    let scope = container.create_scope();
    let registry = Arc::new(ScopedDataStoreRegistry::for_scope(&scope));
    registry.register::<SqlHandle>("OrdersDb").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_data_store_as::<SqlHandle>("OrdersDb").unwrap()
            })
        })
        .collect();

    let resolved: Vec<Arc<SqlHandle>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for handle in &resolved[1..] {
        assert!(Arc::ptr_eq(handle, &resolved[0]));
    }
    assert_eq!(scope.instance_count(), 1);
}
