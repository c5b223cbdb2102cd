//! Lazily bound facade and the process-wide instance behind the free
//! functions.

use std::sync::OnceLock;

use crate::abi::{RawCounterData, RawMetadata, RawTimerData};
use crate::config::FacadeConfig;
use crate::dispatch::Dispatcher;
use crate::registry::Registry;
use crate::result::{CounterData, Metadata, TimerData};
use crate::tool::Handle;

/// Builds one [`Dispatcher`] from a registry on first use.
///
/// Concurrent first callers block until the single construction finishes.
/// Each thread's first [`Facade::get`] afterwards announces that thread.
pub struct Facade<'r> {
    registry: &'r Registry,
    config: FacadeConfig,
    cell: OnceLock<Dispatcher>,
    /// Runs once, right after a tool got bound.
    on_bind: Option<fn()>,
}

impl<'r> Facade<'r> {
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, FacadeConfig::new())
    }

    #[must_use]
    pub const fn with_config(registry: &'r Registry, config: FacadeConfig) -> Self {
        Self::build(registry, config, None)
    }

    const fn build(registry: &'r Registry, config: FacadeConfig, on_bind: Option<fn()>) -> Self {
        Self {
            registry,
            config,
            cell: OnceLock::new(),
            on_bind,
        }
    }

    /// The dispatcher, constructed with the facade's own config if needed.
    pub fn get(&self) -> &Dispatcher {
        self.get_with(self.config)
    }

    /// The dispatcher, constructed with `config` if this call is the first.
    ///
    /// Once constructed, `config` is ignored.
    pub fn get_with(&self, config: FacadeConfig) -> &Dispatcher {
        let dispatcher = self.cell.get_or_init(|| {
            let dispatcher = Dispatcher::resolve(self.registry, &config);
            if let Some(hook) = self.on_bind.filter(|_| dispatcher.initialized()) {
                hook();
            }
            dispatcher
        });
        dispatcher.announce_thread();
        dispatcher
    }

    /// The dispatcher if something already constructed it.
    #[must_use]
    pub fn peek(&self) -> Option<&Dispatcher> {
        self.cell.get()
    }
}

static REGISTRY: Registry = Registry::new();
static FACADE: Facade<'static> =
    Facade::build(&REGISTRY, FacadeConfig::new(), Some(finalize_at_exit));

/// Statics are never dropped, so the process-wide tool is finalized from an
/// exit handler instead.
fn finalize_at_exit() {
    extern "C" fn teardown() {
        finalize();
    }
    // SAFETY: `teardown` takes no arguments and only reaches statics.
    if unsafe { libc::atexit(teardown) } != 0 {
        tracing::warn!("unable to finalize the measurement tool at exit");
    }
}

/// The process-wide registry tools push themselves into.
#[must_use]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// The process-wide dispatcher, binding a tool on first use.
pub fn get() -> &'static Dispatcher {
    FACADE.get()
}

/// Force binding now. Later calls are no-ops.
pub fn init() {
    get();
}

/// Force binding now with an explicit config.
///
/// Has no effect on the configuration if binding already happened.
pub fn init_with_config(config: FacadeConfig) {
    FACADE.get_with(config);
}

/// Whether a tool is bound, without triggering binding.
#[must_use]
pub fn is_initialized() -> bool {
    FACADE.peek().is_some_and(Dispatcher::initialized)
}

pub fn register_thread() {
    get().register_thread();
}

/// Finalize the bound tool. Does not bind one if nothing has yet.
pub fn finalize() {
    if let Some(dispatcher) = FACADE.peek() {
        dispatcher.finalize();
    }
}

pub fn dump_data() {
    get().dump_data();
}

#[must_use]
pub fn timer_create(name: &str) -> Handle {
    get().timer_create(name)
}

#[inline]
pub fn timer_start(timer: Handle) {
    get().timer_start(timer);
}

#[inline]
pub fn timer_stop(timer: Handle) {
    get().timer_stop(timer);
}

pub fn set_parameter(name: &str, value: i64) {
    get().set_parameter(name, value);
}

pub fn dynamic_phase_start(prefix: &str, index: i32) {
    get().dynamic_phase_start(prefix, index);
}

pub fn dynamic_phase_stop(prefix: &str, index: i32) {
    get().dynamic_phase_stop(prefix, index);
}

#[must_use]
pub fn create_counter(name: &str) -> Handle {
    get().create_counter(name)
}

#[inline]
pub fn sample_counter(counter: Handle, value: f64) {
    get().sample_counter(counter, value);
}

pub fn set_metadata(name: &str, value: &str) {
    get().set_metadata(name, value);
}

#[must_use]
pub fn timer_data() -> TimerData {
    get().timer_data()
}

#[must_use]
pub fn counter_data() -> CounterData {
    get().counter_data()
}

#[must_use]
pub fn metadata() -> Metadata {
    get().metadata()
}

/// Fill `out` from the bound tool. Pair with [`free_timer_data_raw`].
pub fn get_timer_data_raw(out: &mut RawTimerData) {
    get().get_timer_data_into(out);
}

/// Release what [`get_timer_data_raw`] allocated. Null is accepted.
///
/// # Safety
///
/// `data` is null or points to an aggregate that is zeroed or was filled
/// by this crate.
pub unsafe fn free_timer_data_raw(data: *mut RawTimerData) {
    // SAFETY: upheld by the caller.
    if let Some(data) = unsafe { data.as_mut() } {
        unsafe { data.release() };
    }
}

/// Fill `out` from the bound tool. Pair with [`free_counter_data_raw`].
pub fn get_counter_data_raw(out: &mut RawCounterData) {
    get().get_counter_data_into(out);
}

/// Release what [`get_counter_data_raw`] allocated. Null is accepted.
///
/// # Safety
///
/// `data` is null or points to an aggregate that is zeroed or was filled
/// by this crate.
pub unsafe fn free_counter_data_raw(data: *mut RawCounterData) {
    // SAFETY: upheld by the caller.
    if let Some(data) = unsafe { data.as_mut() } {
        unsafe { data.release() };
    }
}

/// Fill `out` from the bound tool. Pair with [`free_metadata_raw`].
pub fn get_metadata_raw(out: &mut RawMetadata) {
    get().get_metadata_into(out);
}

/// Release what [`get_metadata_raw`] allocated. Null is accepted.
///
/// # Safety
///
/// `data` is null or points to an aggregate that is zeroed or was filled
/// by this crate.
pub unsafe fn free_metadata_raw(data: *mut RawMetadata) {
    // SAFETY: upheld by the caller.
    if let Some(data) = unsafe { data.as_mut() } {
        unsafe { data.release() };
    }
}
