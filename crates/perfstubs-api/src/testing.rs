//! Recording tool shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::handles::HandleTable;
use crate::result::{Metadata, MetadataEntry, TimerData, TimerRecord};
use crate::tool::{Capabilities, Handle, Tool};

#[derive(Default)]
pub struct Calls {
    pub init: AtomicUsize,
    pub register_thread: AtomicUsize,
    pub finalize: AtomicUsize,
    pub dump_data: AtomicUsize,
    pub timer_start: AtomicUsize,
    pub timer_stop: AtomicUsize,
    pub sample_counter: AtomicUsize,
    pub phases: AtomicUsize,
    pub parameters: AtomicUsize,
}

pub struct Recorder {
    pub capabilities: Capabilities,
    pub calls: Calls,
    pub timers: HandleTable<String>,
    pub counters: HandleTable<String>,
    pub metadata: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            calls: Calls::default(),
            timers: HandleTable::new(),
            counters: HandleTable::new(),
            metadata: Mutex::new(Vec::new()),
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl Tool for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn init(&self) {
        bump(&self.calls.init);
    }

    fn register_thread(&self) {
        bump(&self.calls.register_thread);
    }

    fn finalize(&self) {
        bump(&self.calls.finalize);
    }

    fn dump_data(&self) {
        bump(&self.calls.dump_data);
    }

    fn timer_create(&self, name: &str) -> Handle {
        self.timers.get_or_insert_with(name, || name.to_owned())
    }

    fn timer_start(&self, _timer: Handle) {
        bump(&self.calls.timer_start);
    }

    fn timer_stop(&self, _timer: Handle) {
        bump(&self.calls.timer_stop);
    }

    fn set_parameter(&self, _name: &str, _value: i64) {
        bump(&self.calls.parameters);
    }

    fn dynamic_phase_start(&self, _prefix: &str, _index: i32) {
        bump(&self.calls.phases);
    }

    fn dynamic_phase_stop(&self, _prefix: &str, _index: i32) {
        bump(&self.calls.phases);
    }

    fn create_counter(&self, name: &str) -> Handle {
        self.counters.get_or_insert_with(name, || name.to_owned())
    }

    fn sample_counter(&self, _counter: Handle, _value: f64) {
        bump(&self.calls.sample_counter);
    }

    fn set_metadata(&self, name: &str, value: &str) {
        self.metadata.lock().push((name.to_owned(), value.to_owned()));
    }

    fn timer_data(&self) -> TimerData {
        TimerData {
            num_threads: 1,
            metric_names: vec![
                "Calls".into(),
                "Inclusive Time".into(),
                "Exclusive Time".into(),
            ],
            timers: vec![TimerRecord {
                name: "Main Timer".into(),
                values: vec![1.0, 20.0, 10.0],
            }],
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            entries: self
                .metadata
                .lock()
                .iter()
                .map(|(name, value)| MetadataEntry {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}
