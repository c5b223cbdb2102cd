//! Resolution error types.

use thiserror::Error;

/// Why no tool got bound.
///
/// Never returned from a dispatch call; the dispatcher keeps it as a
/// diagnostic and degrades every operation to a no-op.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Nothing registered and nothing found by symbol lookup.
    #[error("no measurement tool registered")]
    NoTool,

    /// The tool does not implement `init`.
    #[error("tool {0:?} does not implement init")]
    MissingInit(String),

    /// A mandatory symbol is absent from the global namespace.
    #[error("symbol {0} not found")]
    MissingSymbol(&'static str),

    /// Binding was switched off by configuration.
    #[error("instrumentation disabled by configuration")]
    Disabled,

    /// The process's own symbol table could not be opened.
    #[cfg(feature = "dynamic-lookup")]
    #[error("symbol lookup failed: {0}")]
    Library(#[from] libloading::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ResolveError>;
