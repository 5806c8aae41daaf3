//! Validated name → handle type binding
//!
//! A `DataStoreValue` is created once when a binding is declared (in code or
//! from a configuration file) and is immutable afterwards. Construction is
//! the point where misconfiguration surfaces: a handle type that does not
//! fulfil the contract it was declared against is rejected before any
//! runtime traffic reaches the registry.

use crate::error::{Error, Result};
use crate::store::{DataStoreKind, DataStoreType, StoreContract};
use std::fmt;

/// Immutable binding of a logical name to a concrete handle type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStoreValue {
    name: String,
    base: StoreContract,
    concrete: DataStoreType,
}

impl DataStoreValue {
    /// Create a binding, validating that `concrete` directly fulfils `base`
    ///
    /// # Errors
    ///
    /// - `Error::InvalidName` if `name` is empty or whitespace
    /// - `Error::TypeMismatch` if the concrete type declares another contract
    pub fn new(
        name: impl Into<String>,
        base: StoreContract,
        concrete: DataStoreType,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        if concrete.contract() != &base {
            return Err(Error::TypeMismatch {
                expected: base.to_string(),
                actual: format!("{} ({})", concrete.type_name(), concrete.contract()),
            });
        }

        Ok(DataStoreValue {
            name,
            base,
            concrete,
        })
    }

    /// Binding for `T` against the contract `T` declares
    pub fn of<T: DataStoreKind>(name: impl Into<String>) -> Result<Self> {
        Self::new(name, T::CONTRACT, DataStoreType::of::<T>())
    }

    /// Logical data store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared base contract
    pub fn base(&self) -> &StoreContract {
        &self.base
    }

    /// Concrete handle type
    pub fn concrete(&self) -> &DataStoreType {
        &self.concrete
    }

    /// Split into `(name, concrete type)`
    pub fn into_parts(self) -> (String, DataStoreType) {
        (self.name, self.concrete)
    }
}

impl fmt::Display for DataStoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}]",
            self.name,
            self.concrete.short_name(),
            self.base
        )
    }
}

/// Reject empty logical names
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName(
            "data store name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
