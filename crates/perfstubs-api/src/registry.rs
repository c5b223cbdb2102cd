//! Registered tools.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::tool::Tool;

/// Identifier handed back by [`Registry::register`].
///
/// Strictly increasing within a registry, starting at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolId(i32);

impl ToolId {
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Liveness flag shared between a registration and whatever bound to it.
///
/// Revoked on deregistration; dispatch checks it before every forward.
#[derive(Debug, Clone)]
pub struct Lease(Arc<AtomicBool>);

impl Lease {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A tool as stored by the registry.
#[derive(Clone)]
pub struct Registration {
    pub id: ToolId,
    pub name: String,
    pub tool: Arc<dyn Tool>,
    pub lease: Lease,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("live", &self.lease.is_live())
            .finish_non_exhaustive()
    }
}

struct Inner {
    next_id: i32,
    tools: BTreeMap<ToolId, Registration>,
}

/// Tools that announced themselves, keyed by [`ToolId`].
///
/// The earliest live registration is the active one.
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                tools: BTreeMap::new(),
            }),
        }
    }

    /// Register a tool under its own name.
    pub fn register(&self, tool: Arc<dyn Tool>) -> ToolId {
        let name = tool.name().to_owned();
        self.register_named(name, tool)
    }

    /// Register a tool under an explicit display name.
    pub fn register_named(&self, name: impl Into<String>, tool: Arc<dyn Tool>) -> ToolId {
        let name = name.into();
        let id = {
            let mut inner = self.inner.lock();
            let id = ToolId(inner.next_id);
            inner.next_id += 1;
            inner.tools.insert(
                id,
                Registration {
                    id,
                    name: name.clone(),
                    tool,
                    lease: Lease::new(),
                },
            );
            id
        };
        tracing::debug!(%id, tool = %name, "registered tool");
        id
    }

    /// Invalidate a registration.
    ///
    /// Returns `false` for unknown or already-deregistered ids.
    pub fn deregister(&self, id: ToolId) -> bool {
        let removed = self.inner.lock().tools.remove(&id);
        match removed {
            Some(registration) => {
                registration.lease.revoke();
                tracing::debug!(%id, tool = %registration.name, "deregistered tool");
                true
            }
            None => false,
        }
    }

    /// The tool dispatch should bind to: the first one registered.
    #[must_use]
    pub fn active(&self) -> Option<Registration> {
        self.inner.lock().tools.values().next().cloned()
    }

    #[must_use]
    pub fn get(&self, id: ToolId) -> Option<Registration> {
        self.inner.lock().tools.get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let registry = Registry::new();
        let a = registry.register(Arc::new(Named("a")));
        let b = registry.register(Arc::new(Named("b")));
        assert!(b > a);
        assert_eq!(a.raw(), 1);
        assert_eq!(registry.len(), 2);

        registry.deregister(b);
        let c = registry.register(Arc::new(Named("c")));
        assert!(c > b);
    }

    #[test]
    fn first_registration_is_active() {
        let registry = Registry::new();
        assert!(registry.active().is_none());

        let first = registry.register(Arc::new(Named("first")));
        registry.register_named("second tool", Arc::new(Named("second")));
        assert_eq!(registry.active().unwrap().id, first);

        registry.deregister(first);
        assert_eq!(registry.active().unwrap().name, "second tool");
    }

    #[test]
    fn deregistration_revokes_the_lease() {
        let registry = Registry::new();
        let id = registry.register(Arc::new(Named("t")));
        let lease = registry.get(id).unwrap().lease;
        assert!(lease.is_live());

        assert!(registry.deregister(id));
        assert!(!lease.is_live());
        assert!(!registry.deregister(id));
        assert!(registry.is_empty());
    }
}
