//! One-time resolution of the tool to dispatch to.

use std::fmt;
use std::sync::Arc;

use crate::error::{ResolveError, Result};
use crate::registry::{Lease, Registry, ToolId};
use crate::tool::{Capabilities, Tool};

/// How a tool is found when nothing was injected directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Only tools pushed into the registry.
    Static,
    /// Registered tools first, then the well-known `perftool_*` symbols of
    /// the running process.
    Dynamic,
}

impl Strategy {
    /// The strategy selected by the build: `Dynamic` with the
    /// `dynamic-lookup` feature, `Static` otherwise.
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(feature = "dynamic-lookup") {
            Self::Dynamic
        } else {
            Self::Static
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::build_default()
    }
}

/// Where a binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Handed straight to the dispatcher.
    Injected,
    /// Taken from a registry.
    Registered(ToolId),
    /// Found by symbol lookup.
    Symbols,
}

/// A resolved tool with the capability set captured at binding time.
pub struct Binding {
    tool: Arc<dyn Tool>,
    capabilities: Capabilities,
    lease: Option<Lease>,
    origin: Origin,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("tool", &self.tool.name())
            .field("capabilities", &self.capabilities)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl Binding {
    /// Capture `tool`'s capabilities.
    ///
    /// A tool without `init` cannot be bound.
    pub fn new(tool: Arc<dyn Tool>, lease: Option<Lease>, origin: Origin) -> Result<Self> {
        let capabilities = tool.capabilities();
        if !capabilities.contains(Capabilities::INIT) {
            return Err(ResolveError::MissingInit(tool.name().to_owned()));
        }
        Ok(Self {
            tool,
            capabilities,
            lease,
            origin,
        })
    }

    /// The tool, if it implements `capability` and its registration is
    /// still live.
    #[inline]
    pub(crate) fn get(&self, capability: Capabilities) -> Option<&dyn Tool> {
        (self.capabilities.contains(capability) && self.is_live()).then_some(&*self.tool)
    }

    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.lease.as_ref().map_or(true, Lease::is_live)
    }

    #[must_use]
    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }

    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.origin
    }
}

/// Resolve the tool to bind.
///
/// The earliest registered tool wins. Symbol lookup is attempted only under
/// [`Strategy::Dynamic`] and only when the registry is empty.
pub fn resolve(registry: &Registry, strategy: Strategy) -> Result<Binding> {
    if let Some(registration) = registry.active() {
        return Binding::new(
            registration.tool,
            Some(registration.lease),
            Origin::Registered(registration.id),
        );
    }
    match strategy {
        Strategy::Static => Err(ResolveError::NoTool),
        Strategy::Dynamic => lookup_symbols(),
    }
}

#[cfg(feature = "dynamic-lookup")]
fn lookup_symbols() -> Result<Binding> {
    let tool = crate::binding::ForeignTool::lookup()?;
    Binding::new(Arc::new(tool), None, Origin::Symbols)
}

#[cfg(not(feature = "dynamic-lookup"))]
fn lookup_symbols() -> Result<Binding> {
    Err(ResolveError::NoTool)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Full;

    impl Tool for Full {
        fn name(&self) -> &str {
            "full"
        }
    }

    struct NoInit;

    impl Tool for NoInit {
        fn name(&self) -> &str {
            "no init"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::TIMER_CREATE | Capabilities::TIMER_START
        }
    }

    #[test]
    fn registered_tool_takes_precedence() {
        let registry = Registry::new();
        let id = registry.register(Arc::new(Full));

        for strategy in [Strategy::Static, Strategy::Dynamic] {
            let binding = resolve(&registry, strategy).unwrap();
            assert_eq!(binding.origin(), Origin::Registered(id));
            assert_eq!(binding.tool_name(), "full");
        }
    }

    #[test]
    fn static_strategy_without_registration_fails() {
        let err = resolve(&Registry::new(), Strategy::Static).unwrap_err();
        assert!(matches!(err, ResolveError::NoTool));
    }

    #[test]
    fn dynamic_strategy_without_symbols_fails() {
        assert!(resolve(&Registry::new(), Strategy::Dynamic).is_err());
    }

    #[test]
    fn tool_without_init_is_rejected() {
        let registry = Registry::new();
        registry.register(Arc::new(NoInit));
        let err = resolve(&registry, Strategy::Static).unwrap_err();
        assert!(matches!(err, ResolveError::MissingInit(name) if name == "no init"));
    }

    #[test]
    fn revoked_lease_hides_the_tool() {
        let registry = Registry::new();
        let id = registry.register(Arc::new(Full));
        let binding = resolve(&registry, Strategy::Static).unwrap();
        assert!(binding.get(Capabilities::TIMER_START).is_some());

        registry.deregister(id);
        assert!(!binding.is_live());
        assert!(binding.get(Capabilities::TIMER_START).is_none());
        assert_eq!(binding.capabilities(), Capabilities::all());
    }
}
