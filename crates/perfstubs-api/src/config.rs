//! Facade configuration.

use crate::resolver::Strategy;

/// How the dispatcher resolves its tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Resolution strategy.
    pub strategy: Strategy,
    /// When false no tool is bound and every call is a no-op.
    pub enabled: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FacadeConfig {
    /// Enabled, with the build's default strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            strategy: Strategy::build_default(),
            enabled: true,
        }
    }

    /// Set the resolution strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable binding altogether.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
