//! Reference measurement tool for the perfstubs facade.
//!
//! Registers itself with the process-wide registry and measures everything
//! instrumented code reports: per-thread timers with inclusive and exclusive
//! time, counter statistics, metadata and parameters.
//!
//! # Usage
//!
//! ```ignore
//! use perfstubs_tool::{ReferenceTool, ToolConfig};
//!
//! let (tool, _id) = ReferenceTool::register(ToolConfig::from_env());
//! // ... instrumented work
//! perfstubs_api::finalize();
//! ```
//!
//! With `PERFSTUBS_DUMP_PATH` set, the tool writes a bincode
//! [`ToolSnapshot`] there on `dump_data` and on finalize; read it back with
//! [`read_snapshot`].

mod config;
mod error;
mod snapshot;
mod stats;
mod tool;

// Re-export public API
pub use config::{ToolConfig, DEFAULT_NAME, DUMP_PATH_ENV};
pub use error::{Result, ToolError};
pub use snapshot::{read_snapshot, ToolSnapshot};
pub use stats::{ThreadStats, TimerStats, TIMER_METRICS};
pub use tool::ReferenceTool;
