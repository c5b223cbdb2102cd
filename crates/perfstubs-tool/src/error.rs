//! Error types for the reference tool.

use std::path::PathBuf;

use thiserror::Error;

/// Errors writing or reading a data dump.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The dump file could not be opened.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ToolError>;
