//! Reference tool configuration.

use std::path::PathBuf;

/// Environment variable naming the file `dump_data` writes to.
pub const DUMP_PATH_ENV: &str = "PERFSTUBS_DUMP_PATH";

/// Name the tool registers under unless configured otherwise.
pub const DEFAULT_NAME: &str = "reference tool";

/// Reference tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Name reported at registration.
    pub name: String,
    /// Where `dump_data` writes its snapshot. Nothing is written when unset.
    pub dump_path: Option<PathBuf>,
    /// Dump once more when the tool is finalized.
    pub dump_on_finalize: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolConfig {
    /// Create a configuration that never writes to disk.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            dump_path: None,
            dump_on_finalize: false,
        }
    }

    /// Read the dump path from [`DUMP_PATH_ENV`].
    ///
    /// A configured path also enables dumping on finalize.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os(DUMP_PATH_ENV) {
            Some(path) if !path.is_empty() => Self::new()
                .with_dump_path(PathBuf::from(path))
                .with_dump_on_finalize(true),
            _ => Self::new(),
        }
    }

    /// Set the registration name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the snapshot path.
    #[must_use]
    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    /// Dump when the tool is finalized.
    #[must_use]
    pub const fn with_dump_on_finalize(mut self, enabled: bool) -> Self {
        self.dump_on_finalize = enabled;
        self
    }
}
