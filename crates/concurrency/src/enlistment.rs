//! Transaction-scoped enlistment ledger
//!
//! Tracks, per transaction id, which data store handles were touched during
//! that transaction. The ledger is a pure bookkeeping structure:
//!
//! - it never flushes, disposes or otherwise calls into a handle;
//! - the code that completes a unit of work drains the ledger for its
//!   transaction id and finalizes the returned handles (see
//!   [`finalize`](crate::finalize)).
//!
//! ## Concurrency
//!
//! Backed by `DashMap<TransactionId, Vec<Arc<dyn DataStore>>>`. Bucket
//! creation and append happen under the entry's shard lock, so concurrent
//! enlistments into the same transaction never lose a handle and
//! enlistments into different transactions do not contend on a global lock.
//!
//! ## Duplicates
//!
//! Handles are NOT deduplicated: enlisting the same handle twice yields two
//! entries. Callers enlist each distinct handle once per transaction.

use dashmap::DashMap;
use std::sync::Arc;
use tessera_core::{DataStore, TransactionId};
use tracing::{debug, trace};

/// Ledger of data store handles enlisted per transaction
#[derive(Default)]
pub struct DataStoreEnlistmentProvider {
    enlisted: DashMap<TransactionId, Vec<Arc<dyn DataStore>>>,
}

impl DataStoreEnlistmentProvider {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `handle` participates in `transaction_id`
    ///
    /// Creates the transaction's bucket on first enlistment. The ledger never
    /// rejects an enlistment, so this always returns `true`.
    pub fn enlist_data_store(
        &self,
        transaction_id: TransactionId,
        handle: Arc<dyn DataStore>,
    ) -> bool {
        trace!(
            target: "tessera::enlistment",
            transaction_id = %transaction_id,
            store_type = handle.type_name(),
            "Enlisting data store"
        );
        self.enlisted.entry(transaction_id).or_default().push(handle);
        true
    }

    /// Handles enlisted under `transaction_id`
    ///
    /// Returns an empty list if nothing is enlisted. Callers must not rely
    /// on ordering.
    pub fn get_enlisted_data_stores(
        &self,
        transaction_id: TransactionId,
    ) -> Vec<Arc<dyn DataStore>> {
        self.enlisted
            .get(&transaction_id)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    /// Forget every handle enlisted under `transaction_id`
    ///
    /// Returns `false` if the transaction had no enlistments. That is the
    /// "already clean" case, not an error.
    pub fn remove_enlisted_data_stores(&self, transaction_id: TransactionId) -> bool {
        self.take_enlisted_data_stores(transaction_id).is_some()
    }

    /// Atomically remove and return the handles enlisted under `transaction_id`
    pub fn take_enlisted_data_stores(
        &self,
        transaction_id: TransactionId,
    ) -> Option<Vec<Arc<dyn DataStore>>> {
        let removed = self.enlisted.remove(&transaction_id).map(|(_, handles)| handles);
        if let Some(handles) = &removed {
            debug!(
                target: "tessera::enlistment",
                transaction_id = %transaction_id,
                count = handles.len(),
                "Released enlisted data stores"
            );
        }
        removed
    }

    /// Check whether `transaction_id` has any enlistment
    pub fn is_enlisted(&self, transaction_id: TransactionId) -> bool {
        self.enlisted.contains_key(&transaction_id)
    }

    /// Number of handles enlisted under `transaction_id`
    pub fn enlisted_count(&self, transaction_id: TransactionId) -> usize {
        self.enlisted
            .get(&transaction_id)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }

    /// Number of transactions with at least one enlistment
    pub fn transaction_count(&self) -> usize {
        self.enlisted.len()
    }

    /// Transaction ids currently present in the ledger
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.enlisted.iter().map(|entry| *entry.key()).collect()
    }
}

impl std::fmt::Debug for DataStoreEnlistmentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStoreEnlistmentProvider")
            .field("transaction_count", &self.enlisted.len())
            .finish()
    }
}
