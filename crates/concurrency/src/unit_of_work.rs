//! Unit of work lifecycle
//!
//! A unit of work is one logical transaction identified by a
//! [`TransactionId`]. It moves through a strict state machine:
//!
//! ```text
//! Created ──begin()──▶ Beginning ──▶ Active ──commit()/rollback()──▶ Completed
//! ```
//!
//! Terminal state (no transitions allowed): `Completed`.
//!
//! Lifecycle events are delivered to explicitly subscribed
//! [`UnitOfWorkListener`]s:
//! - `scope_beginning` fires while the unit is in `Beginning`, on the thread
//!   that called `begin()`
//! - `scope_completed` fires after the unit reached `Completed`, on the
//!   thread that called `commit()` or `rollback()`
//!
//! Listener lists are snapshotted before dispatch, so a listener may
//! subscribe further listeners without deadlocking; those only see later
//! events.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tessera_core::{Error, Result, TransactionId};
use tracing::{debug, info};

/// Transaction isolation requested for a unit of work
///
/// Carried for the data stores that honour it; the coordination layer
/// itself does not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads allowed
    ReadUncommitted,
    /// Only committed data is visible
    #[default]
    ReadCommitted,
    /// Rows read stay stable for the transaction's duration
    RepeatableRead,
    /// Full serializability
    Serializable,
    /// Reads observe a point-in-time snapshot
    Snapshot,
}

/// Behaviour applied to units of work created by a manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitOfWorkSettings {
    /// Commit automatically when an [`ActiveUnitOfWork`] guard is dropped
    /// without an explicit outcome. When `false` the guard rolls back.
    pub auto_complete: bool,

    /// Isolation level handed to participating stores
    pub isolation_level: IsolationLevel,
}

impl Default for UnitOfWorkSettings {
    fn default() -> Self {
        UnitOfWorkSettings {
            auto_complete: false,
            isolation_level: IsolationLevel::ReadCommitted,
        }
    }
}

/// Unit of work state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    /// Constructed, not yet begun
    Created,
    /// `begin()` in progress, beginning listeners are running
    Beginning,
    /// Begun; data stores may be enlisted
    Active,
    /// Committed or rolled back
    Completed,
}

impl UnitOfWorkState {
    /// Static name, used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkState::Created => "Created",
            UnitOfWorkState::Beginning => "Beginning",
            UnitOfWorkState::Active => "Active",
            UnitOfWorkState::Completed => "Completed",
        }
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a unit of work ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfWorkOutcome {
    /// Changes are to be made durable
    Committed,
    /// Changes are to be discarded
    RolledBack,
}

impl UnitOfWorkOutcome {
    /// Static name, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkOutcome::Committed => "Committed",
            UnitOfWorkOutcome::RolledBack => "RolledBack",
        }
    }
}

/// Receiver of unit-of-work lifecycle events
///
/// Register with [`UnitOfWork::subscribe`]. Callbacks run synchronously on
/// the thread driving the transition and must not block for long.
pub trait UnitOfWorkListener: Send + Sync {
    /// The unit of work is beginning
    fn scope_beginning(&self, unit_of_work: &UnitOfWork);

    /// The unit of work completed; [`UnitOfWork::outcome`] is set
    fn scope_completed(&self, unit_of_work: &UnitOfWork);
}

#[derive(Debug)]
struct Lifecycle {
    state: UnitOfWorkState,
    outcome: Option<UnitOfWorkOutcome>,
    began_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// One logical transaction
pub struct UnitOfWork {
    transaction_id: TransactionId,
    settings: UnitOfWorkSettings,
    created_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    listeners: Mutex<Vec<Arc<dyn UnitOfWorkListener>>>,
}

impl UnitOfWork {
    /// Create a unit of work with a fresh transaction id
    pub fn new(settings: UnitOfWorkSettings) -> Self {
        Self::with_id(TransactionId::new(), settings)
    }

    /// Create a unit of work with a caller-chosen transaction id
    pub fn with_id(transaction_id: TransactionId, settings: UnitOfWorkSettings) -> Self {
        UnitOfWork {
            transaction_id,
            settings,
            created_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle {
                state: UnitOfWorkState::Created,
                outcome: None,
                began_at: None,
                completed_at: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Transaction id, stable for the unit's lifetime
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Settings this unit was created with
    pub fn settings(&self) -> &UnitOfWorkSettings {
        &self.settings
    }

    /// Current state
    pub fn state(&self) -> UnitOfWorkState {
        self.lifecycle.lock().state
    }

    /// True while in `Active`
    pub fn is_active(&self) -> bool {
        self.state() == UnitOfWorkState::Active
    }

    /// True once committed or rolled back
    pub fn is_completed(&self) -> bool {
        self.state() == UnitOfWorkState::Completed
    }

    /// Outcome, set on completion
    pub fn outcome(&self) -> Option<UnitOfWorkOutcome> {
        self.lifecycle.lock().outcome
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When `begin()` succeeded
    pub fn began_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().began_at
    }

    /// When the unit completed
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().completed_at
    }

    /// Register a lifecycle listener
    pub fn subscribe(&self, listener: Arc<dyn UnitOfWorkListener>) {
        self.listeners.lock().push(listener);
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Begin the unit of work
    ///
    /// Fires `scope_beginning` on every listener, then moves to `Active`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the unit is in `Created`.
    pub fn begin(&self) -> Result<()> {
        self.transition(UnitOfWorkState::Created, UnitOfWorkState::Beginning)?;

        for listener in self.listener_snapshot() {
            listener.scope_beginning(self);
        }

        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.state = UnitOfWorkState::Active;
            lifecycle.began_at = Some(Utc::now());
        }

        info!(
            target: "tessera::uow",
            transaction_id = %self.transaction_id,
            isolation = ?self.settings.isolation_level,
            "Unit of work active"
        );
        Ok(())
    }

    /// Complete with [`UnitOfWorkOutcome::Committed`]
    pub fn commit(&self) -> Result<()> {
        self.complete(UnitOfWorkOutcome::Committed)
    }

    /// Complete with [`UnitOfWorkOutcome::RolledBack`]
    pub fn rollback(&self) -> Result<()> {
        self.complete(UnitOfWorkOutcome::RolledBack)
    }

    /// Move to `Completed` with `outcome`, then fire `scope_completed`
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the unit is in `Active`. A unit completes
    /// exactly once.
    pub fn complete(&self, outcome: UnitOfWorkOutcome) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != UnitOfWorkState::Active {
                return Err(self.invalid_transition(lifecycle.state, UnitOfWorkState::Completed));
            }
            lifecycle.state = UnitOfWorkState::Completed;
            lifecycle.outcome = Some(outcome);
            lifecycle.completed_at = Some(Utc::now());
        }

        for listener in self.listener_snapshot() {
            listener.scope_completed(self);
        }

        info!(
            target: "tessera::uow",
            transaction_id = %self.transaction_id,
            outcome = outcome.as_str(),
            "Unit of work completed"
        );
        Ok(())
    }

    fn transition(&self, from: UnitOfWorkState, to: UnitOfWorkState) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != from {
            return Err(self.invalid_transition(lifecycle.state, to));
        }
        lifecycle.state = to;
        Ok(())
    }

    fn invalid_transition(&self, from: UnitOfWorkState, to: UnitOfWorkState) -> Error {
        Error::InvalidState {
            transaction_id: self.transaction_id.to_string(),
            from: from.as_str(),
            to: to.as_str(),
        }
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn UnitOfWorkListener>> {
        self.listeners.lock().clone()
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("UnitOfWork")
            .field("transaction_id", &self.transaction_id)
            .field("state", &lifecycle.state)
            .field("outcome", &lifecycle.outcome)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Guard over a begun unit of work
///
/// Dropping the guard while the unit is still `Active` completes it:
/// commit when `auto_complete` is set, rollback otherwise.
pub struct ActiveUnitOfWork {
    unit_of_work: Arc<UnitOfWork>,
}

impl ActiveUnitOfWork {
    pub(crate) fn new(unit_of_work: Arc<UnitOfWork>) -> Self {
        ActiveUnitOfWork { unit_of_work }
    }

    /// The guarded unit of work
    pub fn unit_of_work(&self) -> &Arc<UnitOfWork> {
        &self.unit_of_work
    }

    /// Commit and release the guard
    pub fn commit(self) -> Result<()> {
        self.unit_of_work.commit()
    }

    /// Roll back and release the guard
    pub fn rollback(self) -> Result<()> {
        self.unit_of_work.rollback()
    }
}

impl std::ops::Deref for ActiveUnitOfWork {
    type Target = UnitOfWork;

    fn deref(&self) -> &UnitOfWork {
        &self.unit_of_work
    }
}

impl fmt::Debug for ActiveUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveUnitOfWork")
            .field(&self.unit_of_work)
            .finish()
    }
}

impl Drop for ActiveUnitOfWork {
    fn drop(&mut self) {
        if !self.unit_of_work.is_active() {
            return;
        }
        let outcome = if self.unit_of_work.settings.auto_complete {
            UnitOfWorkOutcome::Committed
        } else {
            debug!(
                target: "tessera::uow",
                transaction_id = %self.unit_of_work.transaction_id,
                "Unit of work dropped without outcome, rolling back"
            );
            UnitOfWorkOutcome::RolledBack
        };
        // Another thread may have completed the unit since the check
        let _ = self.unit_of_work.complete(outcome);
    }
}
