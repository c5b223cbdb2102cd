//! The dispatcher: forwards every operation to the bound tool, or drops it.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::abi::{RawCounterData, RawMetadata, RawTimerData};
use crate::config::FacadeConfig;
use crate::error::{ResolveError, Result};
use crate::registry::Registry;
use crate::resolver::{self, Binding, Origin};
use crate::result::{CounterData, Metadata, TimerData};
use crate::tool::{Capabilities, Handle, Tool};

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Dispatcher this thread last announced itself to.
    static ANNOUNCED: Cell<u64> = const { Cell::new(0) };
}

/// Binding context shared by every instrumented thread.
///
/// Built once; the binding never changes afterwards. When nothing is bound,
/// or the bound tool lacks an operation, that operation does nothing and
/// returns its default ([`Handle::NULL`], empty data).
pub struct Dispatcher {
    id: u64,
    binding: Option<Binding>,
    error: Option<ResolveError>,
    /// Threads that announced themselves.
    seen: Mutex<HashSet<ThreadId>>,
    /// Name-keyed caches behind the `*_named` calls.
    timers: Mutex<HashMap<String, Handle>>,
    counters: Mutex<HashMap<String, Handle>>,
    finalized: AtomicBool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("binding", &self.binding)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// A dispatcher with nothing bound.
    #[must_use]
    pub fn unbound() -> Self {
        Self::build(None, None)
    }

    /// Bind `tool` directly, bypassing any registry.
    #[must_use]
    pub fn with_tool(tool: Arc<dyn Tool>) -> Self {
        Self::from_resolution(Binding::new(tool, None, Origin::Injected))
    }

    /// Resolve a tool from `registry` according to `config`.
    #[must_use]
    pub fn resolve(registry: &Registry, config: &FacadeConfig) -> Self {
        let resolution = if config.enabled {
            resolver::resolve(registry, config.strategy)
        } else {
            Err(ResolveError::Disabled)
        };
        Self::from_resolution(resolution)
    }

    fn from_resolution(resolution: Result<Binding>) -> Self {
        match resolution {
            Ok(binding) => {
                tracing::debug!(
                    tool = binding.tool_name(),
                    origin = ?binding.origin(),
                    capabilities = ?binding.capabilities(),
                    "bound measurement tool"
                );
                Self::build(Some(binding), None)
            }
            Err(error) => {
                if cfg!(debug_assertions) && !matches!(error, ResolveError::Disabled) {
                    tracing::warn!("unable to bind a measurement tool: {error}");
                } else {
                    tracing::debug!("unable to bind a measurement tool: {error}");
                }
                Self::build(None, Some(error))
            }
        }
    }

    fn build(binding: Option<Binding>, error: Option<ResolveError>) -> Self {
        let dispatcher = Self {
            id: NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed),
            binding,
            error,
            seen: Mutex::new(HashSet::new()),
            timers: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            finalized: AtomicBool::new(false),
        };
        // The constructing thread is covered by `init`.
        dispatcher.seen.lock().insert(thread::current().id());
        let _ = ANNOUNCED.try_with(|a| a.set(dispatcher.id));
        if let Some(tool) = dispatcher.tool(Capabilities::INIT) {
            tool.init();
        }
        dispatcher
    }

    #[inline]
    fn tool(&self, capability: Capabilities) -> Option<&dyn Tool> {
        self.binding.as_ref()?.get(capability)
    }

    /// True once a tool is bound. Never reverts.
    #[inline]
    #[must_use]
    pub const fn initialized(&self) -> bool {
        self.binding.is_some()
    }

    /// The binding, if any.
    #[must_use]
    pub const fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Name of the bound tool.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.binding.as_ref().map(Binding::tool_name)
    }

    /// Whether calls needing `capability` currently reach the tool.
    #[must_use]
    pub fn is_bound(&self, capability: Capabilities) -> bool {
        self.tool(capability).is_some()
    }

    /// Why nothing got bound, when that is the case.
    #[must_use]
    pub const fn resolution_error(&self) -> Option<&ResolveError> {
        self.error.as_ref()
    }

    /// Announce the calling thread to the tool.
    ///
    /// Fires the tool's `register_thread` at most once per thread. A thread
    /// only counts as registered once that callback could run.
    pub fn register_thread(&self) {
        let _ = ANNOUNCED.try_with(|a| a.set(self.id));
        let Some(tool) = self.tool(Capabilities::REGISTER_THREAD) else {
            return;
        };
        if self.seen.lock().insert(thread::current().id()) {
            tool.register_thread();
        }
    }

    /// Cheap per-call check that registers the thread on its first visit.
    #[inline]
    pub(crate) fn announce_thread(&self) {
        if !self.initialized() {
            return;
        }
        let known = ANNOUNCED.try_with(|a| a.get() == self.id).unwrap_or(true);
        if !known {
            self.register_thread();
        }
    }

    /// Whether the calling thread has announced itself.
    #[must_use]
    pub fn is_thread_registered(&self) -> bool {
        self.seen.lock().contains(&thread::current().id())
    }

    /// Number of threads that announced themselves.
    #[must_use]
    pub fn registered_threads(&self) -> usize {
        self.seen.lock().len()
    }

    /// Run the tool's `finalize`. Later calls, and drop, do nothing.
    pub fn finalize(&self) {
        if !self.initialized() || self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(tool) = self.tool(Capabilities::FINALIZE) {
            tool.finalize();
        }
    }

    pub fn dump_data(&self) {
        if let Some(tool) = self.tool(Capabilities::DUMP_DATA) {
            tool.dump_data();
        }
    }

    /// Create the timer called `name`. Store the handle and replay it into
    /// [`Dispatcher::timer_start`] and [`Dispatcher::timer_stop`].
    #[must_use]
    pub fn timer_create(&self, name: &str) -> Handle {
        self.tool(Capabilities::TIMER_CREATE)
            .map_or(Handle::NULL, |tool| tool.timer_create(name))
    }

    #[inline]
    pub fn timer_start(&self, timer: Handle) {
        if let Some(tool) = self.tool(Capabilities::TIMER_START) {
            tool.timer_start(timer);
        }
    }

    #[inline]
    pub fn timer_stop(&self, timer: Handle) {
        if let Some(tool) = self.tool(Capabilities::TIMER_STOP) {
            tool.timer_stop(timer);
        }
    }

    pub fn set_parameter(&self, name: &str, value: i64) {
        if let Some(tool) = self.tool(Capabilities::SET_PARAMETER) {
            tool.set_parameter(name, value);
        }
    }

    pub fn dynamic_phase_start(&self, prefix: &str, index: i32) {
        if let Some(tool) = self.tool(Capabilities::DYNAMIC_PHASE_START) {
            tool.dynamic_phase_start(prefix, index);
        }
    }

    pub fn dynamic_phase_stop(&self, prefix: &str, index: i32) {
        if let Some(tool) = self.tool(Capabilities::DYNAMIC_PHASE_STOP) {
            tool.dynamic_phase_stop(prefix, index);
        }
    }

    /// Create the counter called `name`.
    #[must_use]
    pub fn create_counter(&self, name: &str) -> Handle {
        self.tool(Capabilities::CREATE_COUNTER)
            .map_or(Handle::NULL, |tool| tool.create_counter(name))
    }

    #[inline]
    pub fn sample_counter(&self, counter: Handle, value: f64) {
        if let Some(tool) = self.tool(Capabilities::SAMPLE_COUNTER) {
            tool.sample_counter(counter, value);
        }
    }

    pub fn set_metadata(&self, name: &str, value: &str) {
        if let Some(tool) = self.tool(Capabilities::SET_METADATA) {
            tool.set_metadata(name, value);
        }
    }

    /// Cached handle of the timer called `name`, created on first use.
    #[must_use]
    pub fn find_timer(&self, name: &str) -> Handle {
        self.find_cached(&self.timers, name, Capabilities::TIMER_CREATE, |tool| {
            tool.timer_create(name)
        })
    }

    /// Cached handle of the counter called `name`, created on first use.
    #[must_use]
    pub fn find_counter(&self, name: &str) -> Handle {
        self.find_cached(&self.counters, name, Capabilities::CREATE_COUNTER, |tool| {
            tool.create_counter(name)
        })
    }

    /// The cache lock is never held across the tool call; a racing insert
    /// of the same name keeps whichever handle landed first.
    fn find_cached(
        &self,
        cache: &Mutex<HashMap<String, Handle>>,
        name: &str,
        capability: Capabilities,
        create: impl FnOnce(&dyn Tool) -> Handle,
    ) -> Handle {
        if let Some(handle) = cache.lock().get(name) {
            return *handle;
        }
        let Some(tool) = self.tool(capability) else {
            return Handle::NULL;
        };
        let handle = create(tool);
        if handle.is_null() {
            return handle;
        }
        *cache.lock().entry(name.to_owned()).or_insert(handle)
    }

    /// Start the timer called `name`.
    pub fn start_named(&self, name: &str) {
        if self.is_bound(Capabilities::TIMER_START) {
            self.timer_start(self.find_timer(name));
        }
    }

    /// Stop the timer called `name`.
    pub fn stop_named(&self, name: &str) {
        if self.is_bound(Capabilities::TIMER_STOP) {
            self.timer_stop(self.find_timer(name));
        }
    }

    /// Sample the counter called `name`.
    pub fn sample_named(&self, name: &str, value: f64) {
        if self.is_bound(Capabilities::SAMPLE_COUNTER) {
            self.sample_counter(self.find_counter(name), value);
        }
    }

    #[must_use]
    pub fn timer_data(&self) -> TimerData {
        self.tool(Capabilities::GET_TIMER_DATA)
            .map(Tool::timer_data)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn counter_data(&self) -> CounterData {
        self.tool(Capabilities::GET_COUNTER_DATA)
            .map(Tool::counter_data)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.tool(Capabilities::GET_METADATA)
            .map(Tool::metadata)
            .unwrap_or_default()
    }

    /// Populate a zero-initialized C aggregate; left untouched when unbound.
    ///
    /// Release the result with [`RawTimerData::release`].
    pub fn get_timer_data_into(&self, out: &mut RawTimerData) {
        if let Some(tool) = self.tool(Capabilities::GET_TIMER_DATA) {
            *out = RawTimerData::from_owned(&tool.timer_data());
        }
    }

    /// Populate a zero-initialized C aggregate; left untouched when unbound.
    pub fn get_counter_data_into(&self, out: &mut RawCounterData) {
        if let Some(tool) = self.tool(Capabilities::GET_COUNTER_DATA) {
            *out = RawCounterData::from_owned(&tool.counter_data());
        }
    }

    /// Populate a zero-initialized C aggregate; left untouched when unbound.
    pub fn get_metadata_into(&self, out: &mut RawMetadata) {
        if let Some(tool) = self.tool(Capabilities::GET_METADATA) {
            *out = RawMetadata::from_owned(&tool.metadata());
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.finalize();
    }
}
