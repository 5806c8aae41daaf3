//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

pub use tessera::*;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per process.
///
/// Output is captured by the test harness; run with `--nocapture` and
/// `RUST_LOG`-free defaults to see `debug` events from tessera targets.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Handles
// ============================================================================

/// Flush/dispose counters shared by every test handle.
#[derive(Debug, Default)]
pub struct Calls {
    pub flushes: AtomicUsize,
    pub disposals: AtomicUsize,
}

impl Calls {
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

/// Relational test handle.
#[derive(Debug, Default)]
pub struct SqlHandle {
    pub calls: Calls,
}

impl DataStore for SqlHandle {
    fn flush(&self) -> Result<()> {
        self.calls.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        self.calls.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DataStoreKind for SqlHandle {
    const CONTRACT: StoreContract = StoreContract::named("relational");
}

/// Document test handle.
#[derive(Debug, Default)]
pub struct DocumentHandle {
    pub calls: Calls,
}

impl DataStore for DocumentHandle {
    fn flush(&self) -> Result<()> {
        self.calls.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        self.calls.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DataStoreKind for DocumentHandle {
    const CONTRACT: StoreContract = StoreContract::named("document");
}

/// Handle whose flush always fails.
#[derive(Debug, Default)]
pub struct FailingHandle {
    pub calls: Calls,
}

impl DataStore for FailingHandle {
    fn flush(&self) -> Result<()> {
        self.calls.flushes.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("disk full"))
    }

    fn dispose(&self) -> Result<()> {
        self.calls.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DataStoreKind for FailingHandle {}

// ============================================================================
// Containers
// ============================================================================

/// Container with `SqlHandle` scoped, `DocumentHandle` singleton and
/// `FailingHandle` transient.
pub fn standard_container() -> Arc<ServiceContainer> {
    let container = Arc::new(ServiceContainer::new());
    container
        .add_scoped(|_| Ok(SqlHandle::default()))
        .unwrap();
    container
        .add_singleton(|_| Ok(DocumentHandle::default()))
        .unwrap();
    container
        .add_transient(|_| Ok(FailingHandle::default()))
        .unwrap();
    container
}

/// Coerce a concrete handle for the enlistment ledger.
pub fn as_store<T: DataStore>(handle: &Arc<T>) -> Arc<dyn DataStore> {
    handle.clone()
}
