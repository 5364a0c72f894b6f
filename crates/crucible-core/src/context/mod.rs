//! Execution context and the decorator composer.
//!
//! An [`ExecutionContext`] owns exactly one [`ScopedStorage`] for the lifetime
//! of a test group. Cloning a context is cheap and shares the same storage,
//! which is what lets facades "drop back" to the shared context: every bound
//! facade and the undecorated context observe the same mutations.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::discovery::Catalog;
use crate::errors::{CoreError, CoreResult};
use crate::storage::ScopedStorage;

/// Per-test-group execution context. Owns the group's storage.
#[derive(Clone)]
pub struct ExecutionContext {
    id: Uuid,
    storage: Arc<Mutex<ScopedStorage>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::with_storage(ScopedStorage::new())
    }

    /// Build a context whose default storage namespace comes from `config`.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::with_storage(ScopedStorage::with_default_namespace(
            config.default_namespace.clone(),
        ))
    }

    fn with_storage(storage: ScopedStorage) -> Self {
        Self {
            id: Uuid::new_v4(),
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Lock the group's storage. The context is single-threaded by design, so
    /// the lock is uncontended; a poisoned lock is recovered rather than
    /// propagated.
    pub fn storage(&self) -> MutexGuard<'_, ScopedStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convenience write into a namespace.
    pub fn put<V: Any + Send + Sync>(&self, namespace: &str, key: impl Into<String>, value: V) {
        self.storage().sub(namespace).put(key, value);
    }

    /// Convenience read from a namespace (zero value when absent).
    pub fn get<T: Any + Clone + Default>(&self, namespace: &str, key: &str) -> T {
        self.storage().sub(namespace).get(key)
    }
}

/// A context composed with extra capability facades.
///
/// Derefs to the base [`ExecutionContext`], so all existing context
/// operations forward to the base; the facades share the base's storage.
pub struct Composed {
    base: ExecutionContext,
    facades: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Deref for Composed {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::fmt::Debug for Composed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composed")
            .field("id", &self.base.id())
            .finish_non_exhaustive()
    }
}

impl Composed {
    /// The shared base context.
    pub fn context(&self) -> &ExecutionContext {
        &self.base
    }

    /// The facade bound under `name`, downcast to its concrete type.
    pub fn facade<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.facades
            .get(name)
            .and_then(|f| Arc::clone(f).downcast::<T>().ok())
    }

    /// Names of all bound facades.
    pub fn facade_names(&self) -> impl Iterator<Item = &str> {
        self.facades.keys().map(String::as_str)
    }
}

/// Compose `base` with the facades named in `requests`, each resolved through
/// discovery and bound to the base's storage at composition time.
///
/// Composing onto an absent base is a configuration defect and fails fast
/// with [`CoreError::CompositionFailure`].
pub fn decorate(
    base: Option<&ExecutionContext>,
    catalog: &Catalog,
    scopes: &[String],
    requests: &[&str],
) -> CoreResult<Composed> {
    let base = base.ok_or(CoreError::CompositionFailure)?.clone();
    let mut facades = HashMap::new();
    for name in requests {
        let construct = catalog.resolve_facade(name, scopes)?;
        debug!(context = %base.id(), facade = name, "binding facade");
        facades.insert((*name).to_string(), construct(base.clone()));
    }
    Ok(Composed { base, facades })
}
