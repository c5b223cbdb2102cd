//! Owned query results.
//!
//! Each type is a self-describing sequence of records. Ownership moves to
//! the caller and storage is released when the value drops.

use serde::{Deserialize, Serialize};

/// Timer measurements: one record per timer, each holding
/// `num_threads * metric_names.len()` values laid out thread-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerData {
    /// Number of thread columns in every record.
    pub num_threads: usize,
    /// Metric names, e.g. "Calls" or "Inclusive Time".
    pub metric_names: Vec<String>,
    /// One record per timer.
    pub timers: Vec<TimerRecord>,
}

/// Values of a single timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub name: String,
    /// `values[thread * num_metrics + metric]`.
    pub values: Vec<f64>,
}

impl TimerData {
    #[must_use]
    pub fn num_timers(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn num_metrics(&self) -> usize {
        self.metric_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Look up a timer by name.
    #[must_use]
    pub fn timer(&self, name: &str) -> Option<&TimerRecord> {
        self.timers.iter().find(|t| t.name == name)
    }

    /// Index of a metric by name.
    #[must_use]
    pub fn metric_index(&self, metric: &str) -> Option<usize> {
        self.metric_names.iter().position(|m| m == metric)
    }

    /// Value of `metric` for `timer` on `thread`.
    #[must_use]
    pub fn value(&self, timer: usize, thread: usize, metric: usize) -> Option<f64> {
        if thread >= self.num_threads || metric >= self.num_metrics() {
            return None;
        }
        self.timers
            .get(timer)?
            .values
            .get(thread * self.num_metrics() + metric)
            .copied()
    }
}

/// Statistics of one counter on one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterStats {
    pub num_samples: f64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    pub sum_of_squares: f64,
}

impl CounterStats {
    /// Fold one sample in.
    pub fn record(&mut self, value: f64) {
        if self.num_samples == 0.0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.num_samples += 1.0;
        self.total += value;
        self.sum_of_squares += value * value;
    }

    /// Mean of the recorded samples, zero when there are none.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.num_samples == 0.0 {
            0.0
        } else {
            self.total / self.num_samples
        }
    }
}

/// Counter measurements: one record per counter, one stats entry per thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterData {
    pub num_threads: usize,
    pub counters: Vec<CounterRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub name: String,
    /// Indexed by thread.
    pub threads: Vec<CounterStats>,
}

impl CounterData {
    #[must_use]
    pub fn num_counters(&self) -> usize {
        self.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<&CounterRecord> {
        self.counters.iter().find(|c| c.name == name)
    }
}

/// Name/value metadata pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub entries: Vec<MetadataEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

impl Metadata {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}
