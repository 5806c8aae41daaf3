//! Unit-of-work lifecycle through the manager

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_begin_makes_current_complete_releases() {
    init_tracing();
    let manager = UnitOfWorkManager::new();
    let uow = Arc::new(UnitOfWork::new(UnitOfWorkSettings::default()));

    assert!(manager.enlist_unit_of_work(&uow));
    uow.begin().unwrap();
    assert_eq!(
        manager.current_unit_of_work().unwrap().transaction_id(),
        uow.transaction_id()
    );
    assert!(manager.enlisted_transactions().contains(&uow.transaction_id()));

    uow.commit().unwrap();
    assert!(!manager
        .enlisted_transactions()
        .contains(&uow.transaction_id()));
    assert!(manager.current_unit_of_work().is_none());
}

#[test]
fn test_nested_completion_restores_outer() {
    let manager = UnitOfWorkManager::new();
    let outer = manager.begin_unit_of_work().unwrap();
    let inner = manager.begin_unit_of_work().unwrap();

    assert_eq!(
        manager.current_unit_of_work().unwrap().transaction_id(),
        inner.transaction_id()
    );

    inner.commit().unwrap();
    // The enclosing unit is current again
    assert_eq!(
        manager.current_unit_of_work().unwrap().transaction_id(),
        outer.transaction_id()
    );
    outer.commit().unwrap();
    assert!(manager.current_unit_of_work().is_none());
    assert_eq!(manager.active_count(), 0);
}

#[test]
fn test_completion_on_another_thread_releases_everywhere() {
    let manager = Arc::new(UnitOfWorkManager::new());
    let unit = manager.begin_unit_of_work().unwrap();
    let shared = Arc::clone(unit.unit_of_work());

    thread::spawn(move || shared.rollback().unwrap())
        .join()
        .unwrap();

    assert!(!manager.is_enlisted(unit.transaction_id()));
    // Beginning thread still carries the id, but the unit is no longer active
    assert!(manager.current_unit_of_work().is_none());
    assert_eq!(unit.outcome(), Some(UnitOfWorkOutcome::RolledBack));
}

#[test]
fn test_application_listeners_observe_lifecycle() {
    #[derive(Default)]
    struct Audit {
        begun: AtomicUsize,
        committed: AtomicUsize,
        rolled_back: AtomicUsize,
    }

    impl UnitOfWorkListener for Audit {
        fn scope_beginning(&self, _: &UnitOfWork) {
            self.begun.fetch_add(1, Ordering::SeqCst);
        }

        fn scope_completed(&self, unit_of_work: &UnitOfWork) {
            match unit_of_work.outcome() {
                Some(UnitOfWorkOutcome::Committed) => self.committed.fetch_add(1, Ordering::SeqCst),
                Some(UnitOfWorkOutcome::RolledBack) => {
                    self.rolled_back.fetch_add(1, Ordering::SeqCst)
                }
                None => 0,
            };
        }
    }

    let manager = UnitOfWorkManager::new();
    let audit = Arc::new(Audit::default());

    for commit in [true, false, true] {
        let uow = manager.create_unit_of_work(UnitOfWorkSettings::default());
        uow.subscribe(audit.clone());
        uow.begin().unwrap();
        if commit {
            uow.commit().unwrap();
        } else {
            uow.rollback().unwrap();
        }
    }

    assert_eq!(audit.begun.load(Ordering::SeqCst), 3);
    assert_eq!(audit.committed.load(Ordering::SeqCst), 2);
    assert_eq!(audit.rolled_back.load(Ordering::SeqCst), 1);
}

#[test]
fn test_auto_complete_from_settings() {
    let manager = UnitOfWorkManager::with_settings(UnitOfWorkSettings {
        auto_complete: true,
        isolation_level: IsolationLevel::Serializable,
    });

    let uow = {
        let unit = manager.begin_unit_of_work().unwrap();
        assert_eq!(unit.settings().isolation_level, IsolationLevel::Serializable);
        Arc::clone(unit.unit_of_work())
    };

    assert_eq!(uow.outcome(), Some(UnitOfWorkOutcome::Committed));
    assert!(uow.completed_at().is_some());
}

#[test]
fn test_invalid_transitions_surface_errors() {
    let manager = UnitOfWorkManager::new();
    let unit = manager.begin_unit_of_work().unwrap();
    let uow = Arc::clone(unit.unit_of_work());
    unit.commit().unwrap();

    let err = uow.commit().unwrap_err();
    assert!(err.to_string().contains("Completed"));
    assert!(matches!(uow.begin(), Err(Error::InvalidState { .. })));
}
