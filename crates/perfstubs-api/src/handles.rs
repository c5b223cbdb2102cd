//! Name-keyed handle table for tool implementations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::tool::Handle;

/// Maps names to at most one live entry each.
///
/// A single mutex covers the whole lookup-or-create sequence, so racing
/// first-time creations of the same name all receive the same handle.
/// Handles are 1-based slot indices; [`Handle::NULL`] never names an entry.
pub struct HandleTable<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    by_name: HashMap<String, Handle>,
    entries: Vec<Arc<T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_name: HashMap::new(),
                entries: Vec::new(),
            }),
        }
    }

    /// Handle of `name`, creating its entry with `make` on first sighting.
    ///
    /// `make` runs with the table locked and must not call back into it.
    pub fn get_or_insert_with(&self, name: &str, make: impl FnOnce() -> T) -> Handle {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.by_name.get(name) {
            return *handle;
        }
        inner.entries.push(Arc::new(make()));
        let handle = Handle::from_raw(inner.entries.len());
        inner.by_name.insert(name.to_owned(), handle);
        handle
    }

    /// Existing handle for `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Handle> {
        self.inner.lock().by_name.get(name).copied()
    }

    /// Entry behind `handle`, `None` for null or foreign handles.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        let index = handle.raw().checked_sub(1)?;
        self.inner.lock().entries.get(index).cloned()
    }

    /// All entries in creation order.
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<T>> {
        self.inner.lock().entries.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
