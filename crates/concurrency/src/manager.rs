//! Unit-of-work manager
//!
//! Tracks every unit of work that has been enlisted and not yet completed,
//! and exposes the "current" unit of work of the calling thread.
//!
//! ## Current unit of work
//!
//! Each thread keeps a small map `manager id → stack of transaction ids` in
//! a thread-local slot. When an enlisted unit begins, the manager's listener
//! pushes it onto the beginning thread's stack. Completing a unit pops it
//! from the completing thread's stack, so finishing a nested unit makes the
//! enclosing one current again. Lookups go through the active map: a unit
//! that has completed is never reported as current, even on threads that
//! still carry its id.
//!
//! Managers are independent: two managers on the same thread each have
//! their own current unit.
//!
//! Async tasks that migrate between worker threads do not carry the slot
//! with them. Begin and use a unit of work from the same thread.
//!
//! ## Ownership
//!
//! ```text
//! UnitOfWorkManager ──Arc──▶ ManagerState ──DashMap──▶ Arc<UnitOfWork>
//!                                 ▲                          │
//!                                 └──Weak── ManagerListener ◀┘ (subscribed)
//! ```
//!
//! The listener holds a weak reference so units of work never keep a
//! dropped manager alive.

use crate::unit_of_work::{
    ActiveUnitOfWork, UnitOfWork, UnitOfWorkListener, UnitOfWorkSettings, UnitOfWorkState,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tessera_core::{Result, TransactionId};
use tracing::{debug, info, warn};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Units begun on this thread, innermost last, per manager
    static CURRENT_UNIT_OF_WORK: RefCell<HashMap<u64, Vec<TransactionId>>> =
        RefCell::new(HashMap::new());
}

struct ManagerState {
    id: u64,
    active: DashMap<TransactionId, Arc<UnitOfWork>>,
    settings: UnitOfWorkSettings,
}

struct ManagerListener {
    state: Weak<ManagerState>,
}

impl UnitOfWorkListener for ManagerListener {
    fn scope_beginning(&self, unit_of_work: &UnitOfWork) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let transaction_id = unit_of_work.transaction_id();
        CURRENT_UNIT_OF_WORK.with(|current| {
            let mut current = current.borrow_mut();
            let stack = current.entry(state.id).or_default();
            // Units completed on other threads leave stale ids behind
            stack.retain(|id| state.active.contains_key(id));
            stack.push(transaction_id);
        });
        debug!(
            target: "tessera::uow",
            manager = state.id,
            transaction_id = %transaction_id,
            "Unit of work is now current"
        );
    }

    fn scope_completed(&self, unit_of_work: &UnitOfWork) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let transaction_id = unit_of_work.transaction_id();
        state.active.remove(&transaction_id);
        CURRENT_UNIT_OF_WORK.with(|current| {
            let mut current = current.borrow_mut();
            if let Some(stack) = current.get_mut(&state.id) {
                stack.retain(|id| *id != transaction_id);
                if stack.is_empty() {
                    current.remove(&state.id);
                }
            }
        });
        debug!(
            target: "tessera::uow",
            manager = state.id,
            transaction_id = %transaction_id,
            remaining = state.active.len(),
            "Unit of work released"
        );
    }
}

/// Coordinator of in-flight units of work
///
/// Construct once at startup and share it (by `Arc`) with everything that
/// begins or looks up units of work.
pub struct UnitOfWorkManager {
    state: Arc<ManagerState>,
}

impl UnitOfWorkManager {
    /// Create a manager whose units use default settings
    pub fn new() -> Self {
        Self::with_settings(UnitOfWorkSettings::default())
    }

    /// Create a manager whose units use `settings`
    pub fn with_settings(settings: UnitOfWorkSettings) -> Self {
        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        info!(target: "tessera::uow", manager = id, ?settings, "Unit of work manager started");
        UnitOfWorkManager {
            state: Arc::new(ManagerState {
                id,
                active: DashMap::new(),
                settings,
            }),
        }
    }

    /// Settings applied by [`UnitOfWorkManager::begin_unit_of_work`]
    pub fn settings(&self) -> &UnitOfWorkSettings {
        &self.state.settings
    }

    /// Start tracking `unit_of_work`
    ///
    /// Subscribes the manager to the unit's lifecycle and adds it to the
    /// active map. Returns `false`, without subscribing again, if a unit with
    /// the same transaction id is already tracked or the unit has already
    /// completed.
    ///
    /// A unit that completes on another thread while it is being enlisted is
    /// dropped from the active map again and reported as not enlisted.
    pub fn enlist_unit_of_work(&self, unit_of_work: &Arc<UnitOfWork>) -> bool {
        if unit_of_work.state() == UnitOfWorkState::Completed {
            warn!(
                target: "tessera::uow",
                transaction_id = %unit_of_work.transaction_id(),
                "Refusing to enlist a completed unit of work"
            );
            return false;
        }

        let transaction_id = unit_of_work.transaction_id();
        match self.state.active.entry(transaction_id) {
            Entry::Occupied(_) => {
                warn!(
                    target: "tessera::uow",
                    transaction_id = %transaction_id,
                    "Unit of work already enlisted"
                );
                return false;
            }
            Entry::Vacant(entry) => {
                unit_of_work.subscribe(Arc::new(ManagerListener {
                    state: Arc::downgrade(&self.state),
                }));
                entry.insert(Arc::clone(unit_of_work));
            }
        }

        // Completion may have snapshotted its listeners before ours was added
        if unit_of_work.is_completed() {
            self.state.active.remove(&transaction_id);
            warn!(
                target: "tessera::uow",
                transaction_id = %transaction_id,
                "Unit of work completed while being enlisted"
            );
            return false;
        }

        debug!(
            target: "tessera::uow",
            transaction_id = %transaction_id,
            "Unit of work enlisted"
        );
        true
    }

    /// The innermost unit of work begun on this thread that is still active
    pub fn current_unit_of_work(&self) -> Option<Arc<UnitOfWork>> {
        CURRENT_UNIT_OF_WORK.with(|current| {
            let current = current.borrow();
            let stack = current.get(&self.state.id)?;
            stack.iter().rev().find_map(|id| self.get(*id))
        })
    }

    /// Tracked unit of work for `transaction_id`
    pub fn get(&self, transaction_id: TransactionId) -> Option<Arc<UnitOfWork>> {
        self.state
            .active
            .get(&transaction_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Transaction ids of all tracked units
    pub fn enlisted_transactions(&self) -> Vec<TransactionId> {
        self.state.active.iter().map(|entry| *entry.key()).collect()
    }

    /// Check whether `transaction_id` is tracked
    pub fn is_enlisted(&self, transaction_id: TransactionId) -> bool {
        self.state.active.contains_key(&transaction_id)
    }

    /// Number of tracked units
    pub fn active_count(&self) -> usize {
        self.state.active.len()
    }

    /// Create a unit with `settings` and enlist it, without beginning it
    pub fn create_unit_of_work(&self, settings: UnitOfWorkSettings) -> Arc<UnitOfWork> {
        let unit_of_work = Arc::new(UnitOfWork::new(settings));
        self.enlist_unit_of_work(&unit_of_work);
        unit_of_work
    }

    /// Create, enlist and begin a unit with the manager's settings
    pub fn begin_unit_of_work(&self) -> Result<ActiveUnitOfWork> {
        self.begin_unit_of_work_with(self.state.settings.clone())
    }

    /// Create, enlist and begin a unit with `settings`
    ///
    /// The returned guard completes the unit on drop if no outcome was set.
    pub fn begin_unit_of_work_with(
        &self,
        settings: UnitOfWorkSettings,
    ) -> Result<ActiveUnitOfWork> {
        let unit_of_work = self.create_unit_of_work(settings);
        unit_of_work.begin()?;
        Ok(ActiveUnitOfWork::new(unit_of_work))
    }

    /// Stop tracking every unit of work
    ///
    /// Units are not completed; they simply stop being reachable through
    /// this manager.
    pub fn shutdown(&self) {
        let abandoned = self.state.active.len();
        self.state.active.clear();
        CURRENT_UNIT_OF_WORK.with(|current| {
            current.borrow_mut().remove(&self.state.id);
        });
        if abandoned > 0 {
            warn!(
                target: "tessera::uow",
                manager = self.state.id,
                abandoned,
                "Unit of work manager shut down with active units"
            );
        } else {
            info!(target: "tessera::uow", manager = self.state.id, "Unit of work manager shut down");
        }
    }
}

impl Default for UnitOfWorkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnitOfWorkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWorkManager")
            .field("id", &self.state.id)
            .field("active", &self.state.active.len())
            .field("settings", &self.state.settings)
            .finish()
    }
}

impl Drop for UnitOfWorkManager {
    fn drop(&mut self) {
        // Thread-local slots of other threads are left behind; ids are never
        // reused, so they can't be mistaken for a later manager's unit.
        self.shutdown();
    }
}
