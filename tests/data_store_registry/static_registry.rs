//! Process-wide static registry
//!
//! Every test in this binary shares `StaticDataStore::shared()`, so each
//! test uses names no other test touches.

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_shared_table_is_visible_to_every_registry() {
    let container = standard_container();
    let writer = StaticDataStoreRegistry::shared(container.clone());
    let reader = StaticDataStoreRegistry::shared(container.clone());

    writer.register::<DocumentHandle>("static::Catalog").unwrap();
    assert!(reader
        .get_data_store_as::<DocumentHandle>("static::Catalog")
        .is_ok());
    assert!(StaticDataStore::shared().contains("static::Catalog"));

    reader
        .remove_registered_data_store("static::Catalog")
        .unwrap();
    assert!(!writer.bindings().contains("static::Catalog"));
}

#[test]
fn test_shared_table_survives_scopes() {
    let container = standard_container();
    {
        let scope = container.create_scope();
        let registry = StaticDataStoreRegistry::shared(scope);
        registry.register::<SqlHandle>("static::Orders").unwrap();
        assert!(registry.get_data_store("static::Orders").is_ok());
    }

    // The binding outlives the scope it was registered from
    let scope = container.create_scope();
    let registry = StaticDataStoreRegistry::shared(scope);
    assert!(registry.get_data_store_as::<SqlHandle>("static::Orders").is_ok());
    registry
        .remove_registered_data_store("static::Orders")
        .unwrap();
}

#[test]
fn test_private_static_table_is_isolated() {
    let container = standard_container();
    let private = StaticDataStoreRegistry::new(Arc::new(StaticDataStore::new()), container);
    private.register::<DocumentHandle>("static::Private").unwrap();

    assert!(!StaticDataStore::shared().contains("static::Private"));
    assert_eq!(private.bindings().len(), 1);
}

#[test]
fn test_concurrent_registration_on_shared_table() {
    const THREADS: usize = 32;

    let container = standard_container();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let registry = StaticDataStoreRegistry::shared(container);
                barrier.wait();
                registry
                    .register::<DocumentHandle>(&format!("static::concurrent-{}", i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let shared = StaticDataStore::shared();
    let registered = shared
        .names()
        .into_iter()
        .filter(|name| name.starts_with("static::concurrent-"))
        .count();
    assert_eq!(registered, THREADS);

    for i in 0..THREADS {
        shared
            .unregister(&format!("static::concurrent-{}", i))
            .unwrap();
    }
}
