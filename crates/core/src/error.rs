//! Error types for tessera
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every failure here reflects a configuration or programming error rather
//! than a transient fault, so nothing in the workspace retries: errors are
//! propagated to the caller unchanged.

use std::io;
use thiserror::Error;

/// Result type alias for tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the data store registry and enlistment layers
#[derive(Debug, Error)]
pub enum Error {
    /// No handle type is bound to the logical name
    #[error("Data store not found: '{name}'")]
    DataStoreNotFound {
        /// Logical data store name that was looked up
        name: String,
    },

    /// The logical name is already bound in this registry
    #[error("Data store '{name}' is already registered")]
    DuplicateBinding {
        /// Logical data store name
        name: String,
    },

    /// Removal of a name that was never registered
    #[error("Unsupported data store: '{name}' is not registered")]
    UnsupportedDataStore {
        /// Logical data store name
        name: String,
    },

    /// A handle type does not fulfil the contract it was declared against
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected contract or type name
        expected: String,
        /// Actual contract or type name
        actual: String,
    },

    /// The container has no provider for the requested handle type
    #[error("No provider registered for data store type {type_name}")]
    ServiceNotRegistered {
        /// Rust type name of the requested handle
        type_name: &'static str,
    },

    /// A scoped provider was resolved outside of a service scope
    #[error("Data store type {type_name} is scoped and must be resolved from a service scope")]
    ScopeRequired {
        /// Rust type name of the requested handle
        type_name: &'static str,
    },

    /// A provider's constructor failed
    #[error("Failed to activate {type_name}: {reason}")]
    Activation {
        /// Rust type name of the requested handle
        type_name: &'static str,
        /// Failure reported by the constructor
        reason: String,
    },

    /// Illegal unit-of-work state transition
    #[error("Unit of work {transaction_id} cannot move from {from} to {to}")]
    InvalidState {
        /// Transaction id of the unit of work
        transaction_id: String,
        /// State the unit of work was in
        from: &'static str,
        /// State that was requested
        to: &'static str,
    },

    /// Error raised by a data store handle while flushing or disposing
    #[error("Data store error: {0}")]
    Store(String),

    /// Logical name failed validation
    #[error("Invalid data store name: {0}")]
    InvalidName(String),

    /// Configuration could not be parsed or applied
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (config file access)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand for [`Error::DataStoreNotFound`]
    pub fn not_found(name: impl Into<String>) -> Self {
        Error::DataStoreNotFound { name: name.into() }
    }

    /// Shorthand for [`Error::DuplicateBinding`]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Error::DuplicateBinding { name: name.into() }
    }

    /// Shorthand for [`Error::UnsupportedDataStore`]
    pub fn unsupported(name: impl Into<String>) -> Self {
        Error::UnsupportedDataStore { name: name.into() }
    }

    /// Shorthand for [`Error::Store`]
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// True for the binding-not-found kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DataStoreNotFound { .. })
    }

    /// True for duplicate or unsupported binding errors
    ///
    /// Both indicate a configuration bug in the name table.
    pub fn is_binding_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateBinding { .. } | Error::UnsupportedDataStore { .. }
        )
    }
}
