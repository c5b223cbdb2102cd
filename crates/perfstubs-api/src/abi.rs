//! C layout of the tool boundary.
//!
//! Raw aggregates carry counts plus heap arrays. Whoever allocates an
//! aggregate also frees it: a foreign tool through its own `free_*`
//! callback, this crate through [`RawTimerData::release`] and friends.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::ptr;

use crate::result::{
    CounterData, CounterRecord, CounterStats, Metadata, MetadataEntry, TimerData, TimerRecord,
};

pub type InitFn = unsafe extern "C" fn();
pub type RegisterThreadFn = unsafe extern "C" fn();
pub type FinalizeFn = unsafe extern "C" fn();
pub type DumpDataFn = unsafe extern "C" fn();
pub type TimerCreateFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
pub type TimerStartFn = unsafe extern "C" fn(*const c_void);
pub type TimerStopFn = unsafe extern "C" fn(*const c_void);
pub type SetParameterFn = unsafe extern "C" fn(*const c_char, i64);
pub type DynamicPhaseStartFn = unsafe extern "C" fn(*const c_char, c_int);
pub type DynamicPhaseStopFn = unsafe extern "C" fn(*const c_char, c_int);
pub type CreateCounterFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
pub type SampleCounterFn = unsafe extern "C" fn(*const c_void, f64);
pub type SetMetadataFn = unsafe extern "C" fn(*const c_char, *const c_char);
pub type GetTimerDataFn = unsafe extern "C" fn(*mut RawTimerData);
pub type GetCounterDataFn = unsafe extern "C" fn(*mut RawCounterData);
pub type GetMetadataFn = unsafe extern "C" fn(*mut RawMetadata);
pub type FreeTimerDataFn = unsafe extern "C" fn(*mut RawTimerData);
pub type FreeCounterDataFn = unsafe extern "C" fn(*mut RawCounterData);
pub type FreeMetadataFn = unsafe extern "C" fn(*mut RawMetadata);

/// Registration record a foreign tool hands to `ps_register_tool`.
///
/// Any callback may be null; the tool then lacks that capability.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginData {
    pub tool_name: *const c_char,
    pub initialize: Option<InitFn>,
    pub finalize: Option<FinalizeFn>,
    pub register_thread: Option<RegisterThreadFn>,
    pub dump_data: Option<DumpDataFn>,
    pub timer_create: Option<TimerCreateFn>,
    pub timer_start: Option<TimerStartFn>,
    pub timer_stop: Option<TimerStopFn>,
    pub set_parameter: Option<SetParameterFn>,
    pub dynamic_phase_start: Option<DynamicPhaseStartFn>,
    pub dynamic_phase_stop: Option<DynamicPhaseStopFn>,
    pub create_counter: Option<CreateCounterFn>,
    pub sample_counter: Option<SampleCounterFn>,
    pub set_metadata: Option<SetMetadataFn>,
    pub get_timer_data: Option<GetTimerDataFn>,
    pub get_counter_data: Option<GetCounterDataFn>,
    pub get_metadata: Option<GetMetadataFn>,
    pub free_timer_data: Option<FreeTimerDataFn>,
    pub free_counter_data: Option<FreeCounterDataFn>,
    pub free_metadata: Option<FreeMetadataFn>,
}

impl Default for PluginData {
    fn default() -> Self {
        Self {
            tool_name: ptr::null(),
            initialize: None,
            finalize: None,
            register_thread: None,
            dump_data: None,
            timer_create: None,
            timer_start: None,
            timer_stop: None,
            set_parameter: None,
            dynamic_phase_start: None,
            dynamic_phase_stop: None,
            create_counter: None,
            sample_counter: None,
            set_metadata: None,
            get_timer_data: None,
            get_counter_data: None,
            get_metadata: None,
            free_timer_data: None,
            free_counter_data: None,
            free_metadata: None,
        }
    }
}

/// Timer query result in C layout.
///
/// `values` holds `num_timers * num_threads * num_metrics` entries laid out
/// `[timer][thread][metric]`.
#[repr(C)]
#[derive(Debug)]
pub struct RawTimerData {
    pub num_timers: c_uint,
    pub num_threads: c_uint,
    pub num_metrics: c_uint,
    pub timer_names: *mut *mut c_char,
    pub metric_names: *mut *mut c_char,
    pub values: *mut f64,
}

/// Counter query result in C layout.
///
/// Every statistic array holds `num_counters * num_threads` entries laid
/// out `[counter][thread]`.
#[repr(C)]
#[derive(Debug)]
pub struct RawCounterData {
    pub num_counters: c_uint,
    pub num_threads: c_uint,
    pub counter_names: *mut *mut c_char,
    pub num_samples: *mut f64,
    pub value_total: *mut f64,
    pub value_min: *mut f64,
    pub value_max: *mut f64,
    pub value_sumsqr: *mut f64,
}

/// Metadata query result in C layout.
#[repr(C)]
#[derive(Debug)]
pub struct RawMetadata {
    pub num_values: c_uint,
    pub names: *mut *mut c_char,
    pub values: *mut *mut c_char,
}

impl Default for RawTimerData {
    fn default() -> Self {
        Self {
            num_timers: 0,
            num_threads: 0,
            num_metrics: 0,
            timer_names: ptr::null_mut(),
            metric_names: ptr::null_mut(),
            values: ptr::null_mut(),
        }
    }
}

impl Default for RawCounterData {
    fn default() -> Self {
        Self {
            num_counters: 0,
            num_threads: 0,
            counter_names: ptr::null_mut(),
            num_samples: ptr::null_mut(),
            value_total: ptr::null_mut(),
            value_min: ptr::null_mut(),
            value_max: ptr::null_mut(),
            value_sumsqr: ptr::null_mut(),
        }
    }
}

impl Default for RawMetadata {
    fn default() -> Self {
        Self {
            num_values: 0,
            names: ptr::null_mut(),
            values: ptr::null_mut(),
        }
    }
}

fn count(len: usize) -> c_uint {
    c_uint::try_from(len).unwrap_or(c_uint::MAX)
}

fn len(count: c_uint) -> usize {
    count as usize
}

/// Product of array dimensions, `None` when it does not fit in memory.
fn cells(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
}

/// Move a vector onto the heap as a bare array; empty vectors become null.
fn leak_array<T>(items: Vec<T>) -> *mut T {
    if items.is_empty() {
        ptr::null_mut()
    } else {
        Box::into_raw(items.into_boxed_slice()).cast()
    }
}

/// Reclaim an array made by [`leak_array`] and null the field.
///
/// # Safety
/// `*field` must be null or come from `leak_array` with exactly `len` items.
unsafe fn free_array<T>(field: &mut *mut T, len: usize) -> Option<Box<[T]>> {
    if field.is_null() {
        return None;
    }
    let raw = ptr::slice_from_raw_parts_mut(*field, len);
    *field = ptr::null_mut();
    // SAFETY: guaranteed by the caller.
    Some(unsafe { Box::from_raw(raw) })
}

fn leak_strings<'a>(strings: impl Iterator<Item = &'a str>) -> *mut *mut c_char {
    leak_array(
        strings
            .map(|s| CString::new(s.replace('\0', "")).unwrap_or_default().into_raw())
            .collect(),
    )
}

/// # Safety
/// Same contract as [`free_array`], and every non-null entry must come from
/// `CString::into_raw`.
unsafe fn free_strings(field: &mut *mut *mut c_char, len: usize) {
    // SAFETY: forwarded from the caller.
    if let Some(strings) = unsafe { free_array(field, len) } {
        for s in strings.iter().copied().filter(|s| !s.is_null()) {
            // SAFETY: produced by `CString::into_raw`.
            drop(unsafe { CString::from_raw(s) });
        }
    }
}

/// Copy `len` strings out of a C array. A null array or entry reads as "".
///
/// # Safety
/// `array` must be null or point to `len` readable entries, each null or a
/// valid nul-terminated string.
unsafe fn read_strings(array: *const *mut c_char, len: usize) -> Vec<String> {
    (0..len)
        .map(|i| {
            if array.is_null() {
                return String::new();
            }
            // SAFETY: `i < len`, guaranteed readable by the caller.
            let entry = unsafe { *array.add(i) };
            if entry.is_null() {
                String::new()
            } else {
                // SAFETY: nul-terminated per the caller's contract.
                unsafe { CStr::from_ptr(entry) }
                    .to_string_lossy()
                    .into_owned()
            }
        })
        .collect()
}

/// Read entry `i` of a double array, zero when the array is absent.
///
/// # Safety
/// `array` must be null or point to more than `i` readable entries.
unsafe fn read_f64(array: *const f64, i: usize) -> f64 {
    if array.is_null() {
        0.0
    } else {
        // SAFETY: bounds guaranteed by the caller.
        unsafe { *array.add(i) }
    }
}

impl RawTimerData {
    /// Allocate a C-layout copy of `data`.
    ///
    /// Release it with [`RawTimerData::release`].
    #[must_use]
    pub fn from_owned(data: &TimerData) -> Self {
        let num_metrics = data.num_metrics();
        let per_timer = data.num_threads * num_metrics;
        let values: Vec<f64> = data
            .timers
            .iter()
            .flat_map(|t| (0..per_timer).map(|i| t.values.get(i).copied().unwrap_or(0.0)))
            .collect();
        Self {
            num_timers: count(data.timers.len()),
            num_threads: count(data.num_threads),
            num_metrics: count(num_metrics),
            timer_names: leak_strings(data.timers.iter().map(|t| t.name.as_str())),
            metric_names: leak_strings(data.metric_names.iter().map(String::as_str)),
            values: leak_array(values),
        }
    }

    /// Copy the aggregate into an owned value.
    ///
    /// # Safety
    /// Every non-null array must hold as many entries as the counts imply,
    /// and every non-null name must be nul-terminated.
    #[must_use]
    pub unsafe fn read(&self) -> TimerData {
        let timers = len(self.num_timers);
        let threads = len(self.num_threads);
        let metrics = len(self.num_metrics);
        if cells(&[timers, threads, metrics]).is_none() {
            return TimerData::default();
        }
        let per_timer = threads * metrics;
        // SAFETY: forwarded from the caller.
        let names = unsafe { read_strings(self.timer_names, timers) };
        let metric_names = unsafe { read_strings(self.metric_names, metrics) };
        let timers = names
            .into_iter()
            .enumerate()
            .map(|(t, name)| TimerRecord {
                name,
                values: (0..per_timer)
                    // SAFETY: `t * per_timer + i` stays below the implied length.
                    .map(|i| unsafe { read_f64(self.values, t * per_timer + i) })
                    .collect(),
            })
            .collect();
        TimerData {
            num_threads: threads,
            metric_names,
            timers,
        }
    }

    /// Free every array and null its field; counts are left untouched.
    ///
    /// Safe to repeat: already-null fields are skipped. Counts whose product
    /// overflows cannot come from [`RawTimerData::from_owned`], so `values`
    /// is left alone then.
    ///
    /// # Safety
    /// Non-null arrays must come from [`RawTimerData::from_owned`] and the
    /// counts must not have been changed since.
    pub unsafe fn release(&mut self) {
        let timers = len(self.num_timers);
        let metrics = len(self.num_metrics);
        // SAFETY: forwarded from the caller.
        unsafe {
            free_strings(&mut self.timer_names, timers);
            free_strings(&mut self.metric_names, metrics);
            if let Some(values) = cells(&[timers, len(self.num_threads), metrics]) {
                free_array(&mut self.values, values);
            }
        }
    }

    /// True when no array is allocated.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.timer_names.is_null() && self.metric_names.is_null() && self.values.is_null()
    }
}

impl RawCounterData {
    /// Allocate a C-layout copy of `data`.
    #[must_use]
    pub fn from_owned(data: &CounterData) -> Self {
        let threads = data.num_threads;
        let column = |f: fn(&CounterStats) -> f64| -> *mut f64 {
            leak_array(
                data.counters
                    .iter()
                    .flat_map(|c| {
                        (0..threads).map(move |t| c.threads.get(t).map_or(0.0, f))
                    })
                    .collect(),
            )
        };
        Self {
            num_counters: count(data.counters.len()),
            num_threads: count(threads),
            counter_names: leak_strings(data.counters.iter().map(|c| c.name.as_str())),
            num_samples: column(|s| s.num_samples),
            value_total: column(|s| s.total),
            value_min: column(|s| s.min),
            value_max: column(|s| s.max),
            value_sumsqr: column(|s| s.sum_of_squares),
        }
    }

    /// Copy the aggregate into an owned value.
    ///
    /// # Safety
    /// Every non-null array must hold as many entries as the counts imply,
    /// and every non-null name must be nul-terminated.
    #[must_use]
    pub unsafe fn read(&self) -> CounterData {
        let counters = len(self.num_counters);
        let threads = len(self.num_threads);
        if cells(&[counters, threads]).is_none() {
            return CounterData::default();
        }
        // SAFETY: forwarded from the caller.
        let names = unsafe { read_strings(self.counter_names, counters) };
        let counters = names
            .into_iter()
            .enumerate()
            .map(|(c, name)| CounterRecord {
                name,
                threads: (0..threads)
                    .map(|t| {
                        let i = c * threads + t;
                        // SAFETY: `i` stays below `num_counters * num_threads`.
                        unsafe {
                            CounterStats {
                                num_samples: read_f64(self.num_samples, i),
                                total: read_f64(self.value_total, i),
                                min: read_f64(self.value_min, i),
                                max: read_f64(self.value_max, i),
                                sum_of_squares: read_f64(self.value_sumsqr, i),
                            }
                        }
                    })
                    .collect(),
            })
            .collect();
        CounterData {
            num_threads: threads,
            counters,
        }
    }

    /// Free every array and null its field; counts are left untouched.
    ///
    /// # Safety
    /// Non-null arrays must come from [`RawCounterData::from_owned`] and the
    /// counts must not have been changed since.
    pub unsafe fn release(&mut self) {
        let counters = len(self.num_counters);
        // SAFETY: forwarded from the caller.
        unsafe {
            free_strings(&mut self.counter_names, counters);
            let Some(n) = cells(&[counters, len(self.num_threads)]) else {
                return;
            };
            free_array(&mut self.num_samples, n);
            free_array(&mut self.value_total, n);
            free_array(&mut self.value_min, n);
            free_array(&mut self.value_max, n);
            free_array(&mut self.value_sumsqr, n);
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.counter_names.is_null()
            && self.num_samples.is_null()
            && self.value_total.is_null()
            && self.value_min.is_null()
            && self.value_max.is_null()
            && self.value_sumsqr.is_null()
    }
}

impl RawMetadata {
    /// Allocate a C-layout copy of `metadata`.
    #[must_use]
    pub fn from_owned(metadata: &Metadata) -> Self {
        Self {
            num_values: count(metadata.entries.len()),
            names: leak_strings(metadata.entries.iter().map(|e| e.name.as_str())),
            values: leak_strings(metadata.entries.iter().map(|e| e.value.as_str())),
        }
    }

    /// Copy the aggregate into an owned value.
    ///
    /// # Safety
    /// Both arrays must be null or hold `num_values` entries, each null or
    /// nul-terminated.
    #[must_use]
    pub unsafe fn read(&self) -> Metadata {
        let n = len(self.num_values);
        // SAFETY: forwarded from the caller.
        let (names, values) = unsafe { (read_strings(self.names, n), read_strings(self.values, n)) };
        Metadata {
            entries: names
                .into_iter()
                .zip(values)
                .map(|(name, value)| MetadataEntry { name, value })
                .collect(),
        }
    }

    /// Free both arrays and null them; the count is left untouched.
    ///
    /// # Safety
    /// Non-null arrays must come from [`RawMetadata::from_owned`] and the
    /// count must not have been changed since.
    pub unsafe fn release(&mut self) {
        let n = len(self.num_values);
        // SAFETY: forwarded from the caller.
        unsafe {
            free_strings(&mut self.names, n);
            free_strings(&mut self.values, n);
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.names.is_null() && self.values.is_null()
    }
}
