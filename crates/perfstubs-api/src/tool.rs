//! The capability interface a measurement tool implements.

use std::ffi::c_void;

use bitflags::bitflags;

use crate::result::{CounterData, Metadata, TimerData};

bitflags! {
    /// Operations a tool actually implements.
    ///
    /// One flag per binding slot. The dispatcher captures a tool's set once,
    /// when it binds, and skips every operation whose flag is missing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const INIT = 1 << 0;
        const REGISTER_THREAD = 1 << 1;
        const FINALIZE = 1 << 2;
        const DUMP_DATA = 1 << 3;
        const TIMER_CREATE = 1 << 4;
        const TIMER_START = 1 << 5;
        const TIMER_STOP = 1 << 6;
        const SET_PARAMETER = 1 << 7;
        const DYNAMIC_PHASE_START = 1 << 8;
        const DYNAMIC_PHASE_STOP = 1 << 9;
        const CREATE_COUNTER = 1 << 10;
        const SAMPLE_COUNTER = 1 << 11;
        const SET_METADATA = 1 << 12;
        const GET_TIMER_DATA = 1 << 13;
        const GET_COUNTER_DATA = 1 << 14;
        const GET_METADATA = 1 << 15;
        const FREE_TIMER_DATA = 1 << 16;
        const FREE_COUNTER_DATA = 1 << 17;
        const FREE_METADATA = 1 << 18;
    }
}

/// Opaque timer or counter handle.
///
/// Owned and interpreted only by the tool that produced it; the facade
/// passes it back verbatim. [`Handle::NULL`] is what every creation call
/// returns when nothing is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    /// The unbound sentinel.
    pub const NULL: Self = Self(0);

    /// Wrap a raw value produced by a tool.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Wrap a pointer returned across the C ABI.
    #[must_use]
    pub fn from_ptr(ptr: *const c_void) -> Self {
        Self(ptr as usize)
    }

    /// The raw value.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// The value as a pointer for handing back across the C ABI.
    #[must_use]
    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A measurement backend.
///
/// Every operation except [`Tool::name`] defaults to a no-op, so a tool
/// implements only what it supports and narrows [`Tool::capabilities`] to
/// match. Implementations are shared by every instrumented thread and must
/// not block for long: callers run them inline.
#[allow(unused_variables)]
pub trait Tool: Send + Sync {
    /// Human-readable identity, reported at registration.
    fn name(&self) -> &str;

    /// Operations this tool implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn init(&self) {}

    fn register_thread(&self) {}

    fn finalize(&self) {}

    fn dump_data(&self) {}

    /// Create (or look up) the timer called `name`.
    ///
    /// Repeated calls with the same name must return the same handle.
    fn timer_create(&self, name: &str) -> Handle {
        Handle::NULL
    }

    fn timer_start(&self, timer: Handle) {}

    fn timer_stop(&self, timer: Handle) {}

    fn set_parameter(&self, name: &str, value: i64) {}

    fn dynamic_phase_start(&self, prefix: &str, index: i32) {}

    fn dynamic_phase_stop(&self, prefix: &str, index: i32) {}

    /// Create (or look up) the counter called `name`.
    ///
    /// Repeated calls with the same name must return the same handle.
    fn create_counter(&self, name: &str) -> Handle {
        Handle::NULL
    }

    fn sample_counter(&self, counter: Handle, value: f64) {}

    fn set_metadata(&self, name: &str, value: &str) {}

    fn timer_data(&self) -> TimerData {
        TimerData::default()
    }

    fn counter_data(&self) -> CounterData {
        CounterData::default()
    }

    fn metadata(&self) -> Metadata {
        Metadata::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl Tool for Bare {
        fn name(&self) -> &str {
            "bare"
        }
    }

    #[test]
    fn default_operations_are_inert() {
        let tool = Bare;
        assert!(tool.timer_create("x").is_null());
        assert!(tool.create_counter("c").is_null());
        tool.timer_start(Handle::NULL);
        tool.sample_counter(Handle::NULL, 1.0);
        assert!(tool.timer_data().timers.is_empty());
        assert!(tool.metadata().entries.is_empty());
    }

    #[test]
    fn handle_round_trips_through_pointer() {
        let handle = Handle::from_raw(0xdead_beef);
        assert_eq!(Handle::from_ptr(handle.as_ptr()), handle);
        assert!(!handle.is_null());
        assert!(Handle::default().is_null());
    }
}
