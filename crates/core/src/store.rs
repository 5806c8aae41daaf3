//! Data store handle contract and runtime type descriptors
//!
//! A *handle* is an object representing one configured persistence endpoint
//! (a database connection family, a document store client, ...). This crate
//! never opens connections: it only names handle types and passes
//! `Arc<dyn DataStore>` references around.
//!
//! ## Type identity
//!
//! Name-based resolution needs a runtime notion of "handle type". Instead of
//! reflection, every concrete handle type implements [`DataStoreKind`], and
//! [`DataStoreType::of`] captures its `TypeId`, type name and declared
//! [`StoreContract`] in a cloneable descriptor.
//!
//! ```text
//! struct SqlHandle { .. }
//! impl DataStore for SqlHandle { .. }
//! impl DataStoreKind for SqlHandle {
//!     const CONTRACT: StoreContract = StoreContract::named("relational");
//! }
//!
//! let ty = DataStoreType::of::<SqlHandle>();
//! assert_eq!(ty.short_name(), "SqlHandle");
//! ```

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future returned by asynchronous handle operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Upcast helper so a `Arc<dyn DataStore>` can be downcast to its concrete type
///
/// Blanket-implemented for every `Send + Sync + 'static` type; handle
/// implementations never implement it by hand.
pub trait AsAnyArc: Any + Send + Sync {
    /// Convert into a type-erased `Arc<dyn Any>`
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Contract every resolvable data store handle fulfils
///
/// The registry and enlistment layers only store and return references to
/// this trait; the code that coordinates a unit of work is the only caller of
/// `flush` and `dispose`.
pub trait DataStore: AsAnyArc {
    /// Persist pending changes held by this handle
    fn flush(&self) -> Result<()>;

    /// Release the handle's resources
    fn dispose(&self) -> Result<()>;

    /// Asynchronous counterpart of [`DataStore::dispose`]
    ///
    /// The default completes immediately with the result of `dispose`.
    fn dispose_async(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(std::future::ready(self.dispose()))
    }

    /// Rust type name of the concrete handle
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl fmt::Debug for dyn DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Downcast a type-erased handle to its concrete type
///
/// # Errors
///
/// Returns `Error::TypeMismatch` if the handle is not a `T`.
pub fn downcast_store<T: DataStore>(handle: Arc<dyn DataStore>) -> Result<Arc<T>> {
    let actual = handle.type_name();
    handle
        .into_any_arc()
        .downcast::<T>()
        .map_err(|_| Error::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: actual.to_string(),
        })
}

/// Named contract (base type) that a handle type fulfils
///
/// Contracts group handle types by the capability repositories rely on,
/// e.g. `"relational"` for SQL-speaking handles. A handle type that declares
/// nothing fulfils [`StoreContract::DATA_STORE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreContract(Cow<'static, str>);

impl StoreContract {
    /// Root contract: any data store handle
    pub const DATA_STORE: StoreContract = StoreContract::named("data_store");

    /// Contract with a static name, usable in `const` position
    pub const fn named(name: &'static str) -> Self {
        StoreContract(Cow::Borrowed(name))
    }

    /// Contract from a runtime string (configuration files)
    pub fn new(name: impl Into<String>) -> Self {
        StoreContract(Cow::Owned(name.into()))
    }

    /// Contract name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compile-time description of a concrete handle type
pub trait DataStoreKind: DataStore + Sized {
    /// Contract this handle type directly fulfils
    const CONTRACT: StoreContract = StoreContract::DATA_STORE;
}

/// Runtime identity of a concrete handle type
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone)]
pub struct DataStoreType {
    id: TypeId,
    type_name: &'static str,
    contract: StoreContract,
}

impl DataStoreType {
    /// Descriptor for `T`
    pub fn of<T: DataStoreKind>() -> Self {
        DataStoreType {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            contract: T::CONTRACT,
        }
    }

    /// `TypeId` of the concrete handle
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without module path or generic arguments
    pub fn short_name(&self) -> &'static str {
        let base = self
            .type_name
            .split('<')
            .next()
            .unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Contract declared by the handle type
    pub fn contract(&self) -> &StoreContract {
        &self.contract
    }

    /// True if this descriptor names `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for DataStoreType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataStoreType {}

impl Hash for DataStoreType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStoreType")
            .field("type_name", &self.type_name)
            .field("contract", &self.contract)
            .finish()
    }
}

impl fmt::Display for DataStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
