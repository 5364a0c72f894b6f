//! Namespaced key/value storage shared across one test execution.
//!
//! Values are type-erased at rest and cast back at read time by the caller's
//! expected type. Reads of absent keys return the type's default value, never
//! an error; callers that need to tell "missing" from "present-but-zero" use
//! typed sentinels. One storage instance lives exactly as long as its
//! execution context and is mutated by a single logical thread of control.

use std::any::Any;
use std::collections::HashMap;

use tracing::debug;

/// Namespace used when a caller asks for storage without naming one.
pub const DEFAULT_NAMESPACE: &str = "default";

type StoredValue = Box<dyn Any + Send + Sync>;

/// One namespace's entries.
#[derive(Default)]
pub struct Store {
    entries: HashMap<String, StoredValue>,
}

impl Store {
    /// Store `value` under `key`, overwriting any previous value.
    pub fn put<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Read the value under `key` as `T`. Returns `T::default()` when the key
    /// is absent or holds a value of a different type.
    pub fn get<T: Any + Clone + Default>(&self, key: &str) -> T {
        self.entries
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }

    /// Read a field out of a complex stored value of type `R` via `extract`,
    /// so callers need not know the raw shape. Returns `T::default()` when
    /// the key is absent or not an `R`.
    pub fn get_with<R: Any, T: Default>(&self, key: &str, extract: impl FnOnce(&R) -> T) -> T {
        self.entries
            .get(key)
            .and_then(|v| v.downcast_ref::<R>())
            .map(extract)
            .unwrap_or_default()
    }

    /// Read element `index` of a stored `Vec<T>`. Returns `T::default()` when
    /// the key is absent, not a sequence of `T`, or the index is out of range.
    pub fn get_index<T: Any + Clone + Default>(&self, key: &str, index: usize) -> T {
        self.entries
            .get(key)
            .and_then(|v| v.downcast_ref::<Vec<T>>())
            .and_then(|seq| seq.get(index))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `key` holds a value of any type.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hierarchical store: namespace -> sub-store.
///
/// Namespace lookup never fails: an unknown namespace is created empty on
/// first access (get-or-create).
pub struct ScopedStorage {
    default_namespace: String,
    namespaces: HashMap<String, Store>,
}

impl Default for ScopedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedStorage {
    pub fn new() -> Self {
        Self::with_default_namespace(DEFAULT_NAMESPACE)
    }

    /// Use `namespace` as the root sub-store name instead of
    /// [`DEFAULT_NAMESPACE`].
    pub fn with_default_namespace(namespace: impl Into<String>) -> Self {
        Self {
            default_namespace: namespace.into(),
            namespaces: HashMap::new(),
        }
    }

    /// Sub-store for `namespace`, created empty if absent.
    pub fn sub(&mut self, namespace: &str) -> &mut Store {
        if !self.namespaces.contains_key(namespace) {
            debug!(namespace, "creating storage namespace");
        }
        self.namespaces.entry(namespace.to_string()).or_default()
    }

    /// The default (root) sub-store.
    pub fn root(&mut self) -> &mut Store {
        let namespace = self.default_namespace.clone();
        self.sub(&namespace)
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }
}
