//! The reference measurement tool.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;
use perfstubs_api::{
    CounterData, CounterRecord, Handle, HandleTable, Metadata, MetadataEntry, TimerData,
    TimerRecord, Tool, ToolId,
};

use crate::config::ToolConfig;
use crate::error::Result;
use crate::snapshot::ToolSnapshot;
use crate::stats::{ThreadStats, TIMER_METRICS};

#[derive(Default)]
struct Threads {
    /// Dense per-thread index, in order of first appearance.
    index: HashMap<ThreadId, usize>,
    stats: Vec<ThreadStats>,
}

impl Threads {
    fn current(&mut self) -> &mut ThreadStats {
        let next = self.stats.len();
        let index = *self.index.entry(thread::current().id()).or_insert(next);
        if index == next {
            self.stats.push(ThreadStats::new());
        }
        &mut self.stats[index]
    }
}

/// A complete in-process measurement tool.
///
/// Timers record calls plus inclusive and exclusive time per thread; nested
/// timers are tracked on a per-thread stack. Counters keep per-thread
/// [`perfstubs_api::CounterStats`]. Dynamic phases are timers named
/// `"{prefix} {index}"`.
pub struct ReferenceTool {
    config: ToolConfig,
    timers: HandleTable<String>,
    counters: HandleTable<String>,
    threads: Mutex<Threads>,
    metadata: Mutex<Vec<MetadataEntry>>,
    parameters: Mutex<BTreeMap<String, i64>>,
    finalized: AtomicBool,
}

impl Default for ReferenceTool {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

impl ReferenceTool {
    /// Create a new tool.
    #[must_use]
    pub fn new(config: ToolConfig) -> Self {
        Self {
            config,
            timers: HandleTable::new(),
            counters: HandleTable::new(),
            threads: Mutex::new(Threads::default()),
            metadata: Mutex::new(Vec::new()),
            parameters: Mutex::new(BTreeMap::new()),
            finalized: AtomicBool::new(false),
        }
    }

    /// Create a tool and register it with the process-wide registry.
    ///
    /// Must run before the first instrumented call to be picked up.
    pub fn register(config: ToolConfig) -> (Arc<Self>, ToolId) {
        let tool = Arc::new(Self::new(config));
        let id = perfstubs_api::registry().register(tool.clone());
        (tool, id)
    }

    #[must_use]
    pub const fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Everything measured so far.
    #[must_use]
    pub fn snapshot(&self) -> ToolSnapshot {
        ToolSnapshot {
            timers: self.timer_data(),
            counters: self.counter_data(),
            metadata: self.metadata(),
            parameters: self
                .parameters
                .lock()
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
        }
    }

    /// Write a snapshot to the configured dump path.
    ///
    /// Returns `false` without touching the disk when no path is set.
    pub fn dump(&self) -> Result<bool> {
        let Some(path) = &self.config.dump_path else {
            return Ok(false);
        };
        self.snapshot().write(path)?;
        tracing::info!(path = %path.display(), "wrote measurement snapshot");
        Ok(true)
    }

    /// Number of threads seen so far.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.lock().stats.len()
    }

    fn phase_name(prefix: &str, index: i32) -> String {
        format!("{prefix} {index}")
    }
}

impl Tool for ReferenceTool {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn init(&self) {
        tracing::debug!(tool = %self.config.name, "measurement started");
        self.threads.lock().current();
    }

    fn register_thread(&self) {
        let mut threads = self.threads.lock();
        threads.current();
        tracing::trace!(threads = threads.stats.len(), "registered thread");
    }

    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(tool = %self.config.name, "measurement finished");
        if self.config.dump_on_finalize {
            self.dump_data();
        }
    }

    fn dump_data(&self) {
        tracing::info!(
            timers = self.timers.len(),
            counters = self.counters.len(),
            threads = self.num_threads(),
            "measurement summary"
        );
        if let Err(e) = self.dump() {
            tracing::warn!("Failed to write measurement snapshot: {}", e);
        }
    }

    fn timer_create(&self, name: &str) -> Handle {
        self.timers.get_or_insert_with(name, || {
            tracing::trace!(timer = name, "created timer");
            name.to_owned()
        })
    }

    fn timer_start(&self, timer: Handle) {
        if self.timers.get(timer).is_none() {
            return;
        }
        let now = Instant::now();
        self.threads.lock().current().start(timer, now);
    }

    fn timer_stop(&self, timer: Handle) {
        let now = Instant::now();
        if !self.threads.lock().current().stop(timer, now) {
            tracing::trace!(?timer, "stop without matching start");
        }
    }

    fn set_parameter(&self, name: &str, value: i64) {
        tracing::trace!(parameter = name, value, "set parameter");
        self.parameters.lock().insert(name.to_owned(), value);
    }

    fn dynamic_phase_start(&self, prefix: &str, index: i32) {
        let timer = self.timer_create(&Self::phase_name(prefix, index));
        self.timer_start(timer);
    }

    fn dynamic_phase_stop(&self, prefix: &str, index: i32) {
        if let Some(timer) = self.timers.find(&Self::phase_name(prefix, index)) {
            self.timer_stop(timer);
        }
    }

    fn create_counter(&self, name: &str) -> Handle {
        self.counters.get_or_insert_with(name, || {
            tracing::trace!(counter = name, "created counter");
            name.to_owned()
        })
    }

    fn sample_counter(&self, counter: Handle, value: f64) {
        if self.counters.get(counter).is_none() {
            return;
        }
        self.threads.lock().current().sample(counter, value);
    }

    fn set_metadata(&self, name: &str, value: &str) {
        let mut metadata = self.metadata.lock();
        match metadata.iter_mut().find(|e| e.name == name) {
            Some(entry) => value.clone_into(&mut entry.value),
            None => metadata.push(MetadataEntry {
                name: name.to_owned(),
                value: value.to_owned(),
            }),
        }
    }

    fn timer_data(&self) -> TimerData {
        let names = self.timers.entries();
        let threads = self.threads.lock();
        let timers = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let handle = Handle::from_raw(i + 1);
                TimerRecord {
                    name: name.as_ref().clone(),
                    values: threads
                        .stats
                        .iter()
                        .flat_map(|thread| thread.timer(handle).values())
                        .collect(),
                }
            })
            .collect();
        TimerData {
            num_threads: threads.stats.len(),
            metric_names: TIMER_METRICS.iter().map(|m| (*m).to_owned()).collect(),
            timers,
        }
    }

    fn counter_data(&self) -> CounterData {
        let names = self.counters.entries();
        let threads = self.threads.lock();
        let counters = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let handle = Handle::from_raw(i + 1);
                CounterRecord {
                    name: name.as_ref().clone(),
                    threads: threads
                        .stats
                        .iter()
                        .map(|thread| thread.counter(handle))
                        .collect(),
                }
            })
            .collect();
        CounterData {
            num_threads: threads.stats.len(),
            counters,
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            entries: self.metadata.lock().clone(),
        }
    }
}
