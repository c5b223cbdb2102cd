//! Per-thread timer stacks and their aggregated statistics.

use std::collections::HashMap;
use std::time::Instant;

use perfstubs_api::{CounterStats, Handle};

/// Metric names reported for every timer, in value order.
pub const TIMER_METRICS: [&str; 3] = ["Calls", "Inclusive Time", "Exclusive Time"];

/// Accumulated measurements of one timer on one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerStats {
    /// Completed start/stop pairs.
    pub calls: u64,
    /// Total time between start and stop, in nanoseconds.
    pub inclusive_ns: u64,
    /// Inclusive time minus time spent in nested timers.
    pub exclusive_ns: u64,
}

impl TimerStats {
    /// Values in [`TIMER_METRICS`] order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn values(&self) -> [f64; 3] {
        [
            self.calls as f64,
            self.inclusive_ns as f64,
            self.exclusive_ns as f64,
        ]
    }
}

/// A running timer.
#[derive(Debug, Clone, Copy)]
struct Frame {
    timer: Handle,
    start: Instant,
    children_ns: u64,
}

/// Measurement state of a single thread.
#[derive(Debug, Default)]
pub struct ThreadStats {
    stack: Vec<Frame>,
    timers: HashMap<Handle, TimerStats>,
    counters: HashMap<Handle, CounterStats>,
}

impl ThreadStats {
    /// Create empty thread state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `timer` onto this thread's stack.
    pub fn start(&mut self, timer: Handle, now: Instant) {
        self.stack.push(Frame {
            timer,
            start: now,
            children_ns: 0,
        });
    }

    /// Stop the innermost running instance of `timer`.
    ///
    /// Timers started after it and still running are stopped too. Returns
    /// `false` when `timer` is not running on this thread.
    pub fn stop(&mut self, timer: Handle, now: Instant) -> bool {
        let Some(depth) = self.stack.iter().rposition(|f| f.timer == timer) else {
            return false;
        };
        while self.stack.len() > depth {
            if let Some(frame) = self.stack.pop() {
                self.close(frame, now);
            }
        }
        true
    }

    fn close(&mut self, frame: Frame, now: Instant) {
        let inclusive =
            u64::try_from(now.saturating_duration_since(frame.start).as_nanos()).unwrap_or(u64::MAX);
        let stats = self.timers.entry(frame.timer).or_default();
        stats.calls += 1;
        stats.inclusive_ns = stats.inclusive_ns.saturating_add(inclusive);
        stats.exclusive_ns = stats
            .exclusive_ns
            .saturating_add(inclusive.saturating_sub(frame.children_ns));
        if let Some(parent) = self.stack.last_mut() {
            parent.children_ns = parent.children_ns.saturating_add(inclusive);
        }
    }

    /// Fold one counter sample in.
    pub fn sample(&mut self, counter: Handle, value: f64) {
        self.counters.entry(counter).or_default().record(value);
    }

    /// Timers currently running, innermost last.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn timer(&self, timer: Handle) -> TimerStats {
        self.timers.get(&timer).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn counter(&self, counter: Handle) -> CounterStats {
        self.counters.get(&counter).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const OUTER: Handle = Handle::from_raw(1);
    const INNER: Handle = Handle::from_raw(2);

    #[test]
    fn nested_timers_split_exclusive_time() {
        let t0 = Instant::now();
        let mut thread = ThreadStats::new();

        thread.start(OUTER, t0);
        thread.start(INNER, t0 + Duration::from_nanos(100));
        assert!(thread.stop(INNER, t0 + Duration::from_nanos(400)));
        assert!(thread.stop(OUTER, t0 + Duration::from_nanos(1000)));

        let outer = thread.timer(OUTER);
        assert_eq!(outer.calls, 1);
        assert_eq!(outer.inclusive_ns, 1000);
        assert_eq!(outer.exclusive_ns, 700);

        let inner = thread.timer(INNER);
        assert_eq!((inner.inclusive_ns, inner.exclusive_ns), (300, 300));
        assert_eq!(thread.depth(), 0);
    }

    #[test]
    fn stopping_an_outer_timer_closes_inner_ones() {
        let t0 = Instant::now();
        let mut thread = ThreadStats::new();

        thread.start(OUTER, t0);
        thread.start(INNER, t0);
        assert!(thread.stop(OUTER, t0 + Duration::from_nanos(50)));

        assert_eq!(thread.timer(INNER).calls, 1);
        assert_eq!(thread.timer(OUTER).calls, 1);
        assert_eq!(thread.timer(OUTER).exclusive_ns, 0);
        assert_eq!(thread.depth(), 0);
    }

    #[test]
    fn stop_without_start_is_ignored() {
        let mut thread = ThreadStats::new();
        assert!(!thread.stop(OUTER, Instant::now()));
        assert_eq!(thread.timer(OUTER), TimerStats::default());
    }

    #[test]
    fn recursive_timer_counts_each_call() {
        let t0 = Instant::now();
        let mut thread = ThreadStats::new();

        thread.start(OUTER, t0);
        thread.start(OUTER, t0 + Duration::from_nanos(10));
        thread.stop(OUTER, t0 + Duration::from_nanos(20));
        thread.stop(OUTER, t0 + Duration::from_nanos(30));

        let stats = thread.timer(OUTER);
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.inclusive_ns, 40);
        assert_eq!(stats.exclusive_ns, 30);
    }

    #[test]
    fn counter_samples_accumulate() {
        let mut thread = ThreadStats::new();
        for value in [1.0, 2.0, 3.0] {
            thread.sample(OUTER, value);
        }
        let stats = thread.counter(OUTER);
        approx::assert_relative_eq!(stats.total, 6.0);
        approx::assert_relative_eq!(stats.min, 1.0);
        approx::assert_relative_eq!(stats.max, 3.0);
    }
}
