//! Instrumentation macros and scope guards.

use crate::dispatch::Dispatcher;
use crate::facade;
use crate::tool::Handle;

/// RAII guard that starts a timer on creation and stops it on drop.
#[must_use = "the timer stops as soon as the guard is dropped"]
pub struct ScopedTimer<'a> {
    dispatcher: &'a Dispatcher,
    timer: Handle,
}

impl<'a> ScopedTimer<'a> {
    /// Start `timer` on `dispatcher`.
    #[inline]
    pub fn new(dispatcher: &'a Dispatcher, timer: Handle) -> Self {
        dispatcher.timer_start(timer);
        Self { dispatcher, timer }
    }

    /// Start the timer called `name` on `dispatcher`.
    #[inline]
    pub fn with_name(dispatcher: &'a Dispatcher, name: &str) -> Self {
        Self::new(dispatcher, dispatcher.find_timer(name))
    }

    #[must_use]
    pub const fn timer(&self) -> Handle {
        self.timer
    }
}

impl ScopedTimer<'static> {
    /// Start the timer called `name` on the process-wide dispatcher.
    #[inline]
    pub fn named(name: &str) -> Self {
        Self::with_name(facade::get(), name)
    }
}

impl Drop for ScopedTimer<'_> {
    #[inline]
    fn drop(&mut self) {
        self.dispatcher.timer_stop(self.timer);
    }
}

/// RAII guard around one iteration of a dynamic phase.
#[must_use = "the phase stops as soon as the guard is dropped"]
pub struct PhaseGuard<'a> {
    dispatcher: &'a Dispatcher,
    prefix: &'a str,
    index: i32,
}

impl<'a> PhaseGuard<'a> {
    #[inline]
    pub fn new(dispatcher: &'a Dispatcher, prefix: &'a str, index: i32) -> Self {
        dispatcher.dynamic_phase_start(prefix, index);
        Self {
            dispatcher,
            prefix,
            index,
        }
    }
}

impl Drop for PhaseGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.dispatcher.dynamic_phase_stop(self.prefix, self.index);
    }
}

/// Timer name for a source location: `func [{file} {line,0}]`.
#[must_use]
pub fn make_timer_name(file: &str, func: &str, line: u32) -> String {
    format!("{func} [{{{file}}} {{{line},0}}]")
}

/// Name of the enclosing function, without its module path.
#[doc(hidden)]
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = type_name_of(f);
        let path = path.strip_suffix("::f").unwrap_or(path);
        let path = path.trim_end_matches("::{{closure}}");
        path.rsplit("::").next().unwrap_or(path)
    }};
}

/// Time the rest of the enclosing scope under `name`.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
///
/// # Examples
///
/// ```ignore
/// use perfstubs_api::scoped_timer;
///
/// fn solve() {
///     scoped_timer!("solve");
///     // ... work
/// } // timer stopped here
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! scoped_timer {
    ($name:expr) => {
        let _timer = $crate::ScopedTimer::named($name);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! scoped_timer {
    ($name:expr) => {};
}

/// Time the rest of the enclosing scope under a name derived from the
/// enclosing function and source location.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! scoped_timer_fn {
    () => {
        let _timer = $crate::ScopedTimer::named(&$crate::make_timer_name(
            file!(),
            $crate::function_name!(),
            line!(),
        ));
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! scoped_timer_fn {
    () => {};
}

/// Sample the counter called `name`.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! sample_counter {
    ($name:expr, $value:expr) => {
        $crate::get().sample_named($name, $value);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! sample_counter {
    ($name:expr, $value:expr) => {};
}

/// Attach a name/value pair to the measurement.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! metadata {
    ($name:expr, $value:expr) => {
        $crate::set_metadata($name, $value);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! metadata {
    ($name:expr, $value:expr) => {};
}

/// Run the rest of the enclosing scope as iteration `index` of the phase
/// `prefix`.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! dynamic_phase {
    ($prefix:expr, $index:expr) => {
        let _phase = $crate::PhaseGuard::new($crate::get(), $prefix, $index);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! dynamic_phase {
    ($prefix:expr, $index:expr) => {};
}
