//! Instrumentation facade for an optional performance measurement tool.
//!
//! Library code is instrumented once against this crate. At run time the
//! calls reach whichever tool registered itself, or do nothing at all when
//! no tool is present.
//!
//! # Feature Flags
//!
//! - `profiling`: Enable the instrumentation macros. When disabled, all
//!   macros expand to no-ops for zero overhead.
//! - `dynamic-lookup` (default): When no tool registered itself, look for
//!   the well-known `perftool_*` symbols in the running process.
//!
//! # Usage
//!
//! A tool registers itself before the first instrumented call:
//!
//! ```ignore
//! perfstubs_api::registry().register(Arc::new(MyTool::default()));
//! ```
//!
//! Instrumented code then calls the free functions or the macros:
//!
//! ```ignore
//! use perfstubs_api::{sample_counter, scoped_timer};
//!
//! fn step() {
//!     scoped_timer!("step");
//!     sample_counter!("particles", 1024.0);
//! }
//! ```
//!
//! For tests or embedding, build a [`Dispatcher`] or a [`Facade`] over your
//! own [`Registry`] instead of using the process-wide instance.

pub mod abi;
mod binding;
mod config;
mod dispatch;
mod error;
mod facade;
pub mod ffi;
mod handles;
mod macros;
mod registry;
mod resolver;
mod result;
#[cfg(test)]
mod testing;
mod tool;

// Re-export public API
pub use abi::{PluginData, RawCounterData, RawMetadata, RawTimerData};
pub use binding::{BindingTable, ForeignTool, SYMBOL_TOOL_NAME};
pub use config::FacadeConfig;
pub use dispatch::Dispatcher;
pub use error::{ResolveError, Result};
pub use facade::{
    counter_data, create_counter, dump_data, dynamic_phase_start, dynamic_phase_stop, finalize,
    free_counter_data_raw, free_metadata_raw, free_timer_data_raw, get, get_counter_data_raw,
    get_metadata_raw, get_timer_data_raw, init, init_with_config, is_initialized, metadata,
    register_thread, registry, sample_counter, set_metadata, set_parameter, timer_create,
    timer_data, timer_start, timer_stop, Facade,
};
pub use handles::HandleTable;
pub use macros::{make_timer_name, PhaseGuard, ScopedTimer};
pub use registry::{Lease, Registration, Registry, ToolId};
pub use resolver::{resolve, Binding, Origin, Strategy};
pub use result::{
    CounterData, CounterRecord, CounterStats, Metadata, MetadataEntry, TimerData, TimerRecord,
};
pub use tool::{Capabilities, Handle, Tool};
