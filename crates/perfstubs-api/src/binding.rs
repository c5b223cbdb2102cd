//! Binding table for tools reached across the C ABI.

use std::ffi::{c_char, CStr, CString};

use crate::abi::{
    CreateCounterFn, DumpDataFn, DynamicPhaseStartFn, DynamicPhaseStopFn, FinalizeFn,
    FreeCounterDataFn, FreeMetadataFn, FreeTimerDataFn, GetCounterDataFn, GetMetadataFn,
    GetTimerDataFn, InitFn, PluginData, RawCounterData, RawMetadata, RawTimerData,
    RegisterThreadFn, SampleCounterFn, SetMetadataFn, SetParameterFn, TimerCreateFn,
    TimerStartFn, TimerStopFn,
};
use crate::result::{CounterData, Metadata, TimerData};
use crate::tool::{Capabilities, Handle, Tool};

/// Name reported for tools found by symbol lookup.
pub const SYMBOL_TOOL_NAME: &str = "perftool symbols";

/// One function pointer per operation; `None` means unbound.
///
/// Filled once, from a [`PluginData`] record or from symbol lookup, and
/// never modified afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingTable {
    pub init: Option<InitFn>,
    pub register_thread: Option<RegisterThreadFn>,
    pub finalize: Option<FinalizeFn>,
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

impl BindingTable {
    /// Copy the callback slots of a registration record.
    #[must_use]
    pub const fn from_plugin(data: &PluginData) -> Self {
        Self {
            init: data.initialize,
            register_thread: data.register_thread,
            finalize: data.finalize,
            dump_data: data.dump_data,
            timer_create: data.timer_create,
            timer_start: data.timer_start,
            timer_stop: data.timer_stop,
            set_parameter: data.set_parameter,
            dynamic_phase_start: data.dynamic_phase_start,
            dynamic_phase_stop: data.dynamic_phase_stop,
            create_counter: data.create_counter,
            sample_counter: data.sample_counter,
            set_metadata: data.set_metadata,
            get_timer_data: data.get_timer_data,
            get_counter_data: data.get_counter_data,
            get_metadata: data.get_metadata,
            free_timer_data: data.free_timer_data,
            free_counter_data: data.free_counter_data,
            free_metadata: data.free_metadata,
        }
    }

    /// Set of bound slots.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let slots = [
            (self.init.is_some(), Capabilities::INIT),
            (self.register_thread.is_some(), Capabilities::REGISTER_THREAD),
            (self.finalize.is_some(), Capabilities::FINALIZE),
            (self.dump_data.is_some(), Capabilities::DUMP_DATA),
            (self.timer_create.is_some(), Capabilities::TIMER_CREATE),
            (self.timer_start.is_some(), Capabilities::TIMER_START),
            (self.timer_stop.is_some(), Capabilities::TIMER_STOP),
            (self.set_parameter.is_some(), Capabilities::SET_PARAMETER),
            (self.dynamic_phase_start.is_some(), Capabilities::DYNAMIC_PHASE_START),
            (self.dynamic_phase_stop.is_some(), Capabilities::DYNAMIC_PHASE_STOP),
            (self.create_counter.is_some(), Capabilities::CREATE_COUNTER),
            (self.sample_counter.is_some(), Capabilities::SAMPLE_COUNTER),
            (self.set_metadata.is_some(), Capabilities::SET_METADATA),
            (self.get_timer_data.is_some(), Capabilities::GET_TIMER_DATA),
            (self.get_counter_data.is_some(), Capabilities::GET_COUNTER_DATA),
            (self.get_metadata.is_some(), Capabilities::GET_METADATA),
            (self.free_timer_data.is_some(), Capabilities::FREE_TIMER_DATA),
            (self.free_counter_data.is_some(), Capabilities::FREE_COUNTER_DATA),
            (self.free_metadata.is_some(), Capabilities::FREE_METADATA),
        ];
        slots
            .into_iter()
            .filter(|(bound, _)| *bound)
            .fold(Capabilities::empty(), |caps, (_, flag)| caps | flag)
    }
}

/// A tool implemented behind C function pointers.
pub struct ForeignTool {
    name: String,
    table: BindingTable,
    #[cfg(feature = "dynamic-lookup")]
    _library: Option<libloading::Library>,
}

impl std::fmt::Debug for ForeignTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignTool")
            .field("name", &self.name)
            .field("capabilities", &self.table.capabilities())
            .finish_non_exhaustive()
    }
}

impl ForeignTool {
    /// Wrap a binding table.
    ///
    /// # Safety
    /// Every bound slot must point to a function with the declared signature
    /// that stays callable from any thread for the lifetime of this value.
    #[must_use]
    pub unsafe fn new(name: impl Into<String>, table: BindingTable) -> Self {
        Self {
            name: name.into(),
            table,
            #[cfg(feature = "dynamic-lookup")]
            _library: None,
        }
    }

    /// Wrap a registration record.
    ///
    /// # Safety
    /// As for [`ForeignTool::new`]; `tool_name` must be null or a valid
    /// nul-terminated string.
    #[must_use]
    pub unsafe fn from_plugin(data: &PluginData) -> Self {
        let name = if data.tool_name.is_null() {
            String::from("unnamed tool")
        } else {
            // SAFETY: nul-terminated per the caller's contract.
            unsafe { CStr::from_ptr(data.tool_name) }
                .to_string_lossy()
                .into_owned()
        };
        // SAFETY: forwarded from the caller.
        unsafe { Self::new(name, BindingTable::from_plugin(data)) }
    }

    /// Bind the well-known `perftool_*` symbols of the running process.
    ///
    /// Fails unless at least `perftool_init` is present; every other slot
    /// stays unbound when its symbol is missing.
    #[cfg(feature = "dynamic-lookup")]
    pub fn lookup() -> crate::error::Result<Self> {
        let library = symbols::this_process()?;
        // SAFETY: the `perftool_*` names are reserved for tools exposing
        // exactly these signatures.
        let table = unsafe { symbols::bind(&library) };
        if table.init.is_none() {
            return Err(crate::error::ResolveError::MissingSymbol("perftool_init"));
        }
        Ok(Self {
            name: SYMBOL_TOOL_NAME.to_owned(),
            table,
            _library: Some(library),
        })
    }

    #[must_use]
    pub const fn table(&self) -> &BindingTable {
        &self.table
    }
}

fn with_c_str<R>(s: &str, f: impl FnOnce(*const c_char) -> R) -> Option<R> {
    CString::new(s).ok().map(|c| f(c.as_ptr()))
}

impl Tool for ForeignTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.table.capabilities()
    }

    fn init(&self) {
        if let Some(f) = self.table.init {
            // SAFETY: upheld at construction.
            unsafe { f() };
        }
    }

    fn register_thread(&self) {
        if let Some(f) = self.table.register_thread {
            // SAFETY: upheld at construction.
            unsafe { f() };
        }
    }

    fn finalize(&self) {
        if let Some(f) = self.table.finalize {
            // SAFETY: upheld at construction.
            unsafe { f() };
        }
    }

    fn dump_data(&self) {
        if let Some(f) = self.table.dump_data {
            // SAFETY: upheld at construction.
            unsafe { f() };
        }
    }

    fn timer_create(&self, name: &str) -> Handle {
        self.table
            .timer_create
            // SAFETY: upheld at construction; the name outlives the call.
            .and_then(|f| with_c_str(name, |n| unsafe { f(n) }))
            .map_or(Handle::NULL, |p| Handle::from_ptr(p.cast_const()))
    }

    fn timer_start(&self, timer: Handle) {
        if let Some(f) = self.table.timer_start {
            // SAFETY: upheld at construction.
            unsafe { f(timer.as_ptr()) };
        }
    }

    fn timer_stop(&self, timer: Handle) {
        if let Some(f) = self.table.timer_stop {
            // SAFETY: upheld at construction.
            unsafe { f(timer.as_ptr()) };
        }
    }

    fn set_parameter(&self, name: &str, value: i64) {
        if let Some(f) = self.table.set_parameter {
            // SAFETY: upheld at construction.
            with_c_str(name, |n| unsafe { f(n, value) });
        }
    }

    fn dynamic_phase_start(&self, prefix: &str, index: i32) {
        if let Some(f) = self.table.dynamic_phase_start {
            // SAFETY: upheld at construction.
            with_c_str(prefix, |p| unsafe { f(p, index) });
        }
    }

    fn dynamic_phase_stop(&self, prefix: &str, index: i32) {
        if let Some(f) = self.table.dynamic_phase_stop {
            // SAFETY: upheld at construction.
            with_c_str(prefix, |p| unsafe { f(p, index) });
        }
    }

    fn create_counter(&self, name: &str) -> Handle {
        self.table
            .create_counter
            // SAFETY: upheld at construction.
            .and_then(|f| with_c_str(name, |n| unsafe { f(n) }))
            .map_or(Handle::NULL, |p| Handle::from_ptr(p.cast_const()))
    }

    fn sample_counter(&self, counter: Handle, value: f64) {
        if let Some(f) = self.table.sample_counter {
            // SAFETY: upheld at construction.
            unsafe { f(counter.as_ptr(), value) };
        }
    }

    fn set_metadata(&self, name: &str, value: &str) {
        if let Some(f) = self.table.set_metadata {
            with_c_str(name, |n| {
                // SAFETY: upheld at construction.
                with_c_str(value, |v| unsafe { f(n, v) })
            });
        }
    }

    fn timer_data(&self) -> TimerData {
        let Some(get) = self.table.get_timer_data else {
            return TimerData::default();
        };
        let mut raw = RawTimerData::default();
        // SAFETY: upheld at construction; the tool fills `raw` consistently
        // with its counts and keeps ownership until its free callback runs.
        unsafe {
            get(&mut raw);
            let data = raw.read();
            match self.table.free_timer_data {
                Some(free) => free(&mut raw),
                None => tracing::debug!(tool = %self.name, "no free_timer_data, result leaked"),
            }
            data
        }
    }

    fn counter_data(&self) -> CounterData {
        let Some(get) = self.table.get_counter_data else {
            return CounterData::default();
        };
        let mut raw = RawCounterData::default();
        // SAFETY: as in `timer_data`.
        unsafe {
            get(&mut raw);
            let data = raw.read();
            match self.table.free_counter_data {
                Some(free) => free(&mut raw),
                None => tracing::debug!(tool = %self.name, "no free_counter_data, result leaked"),
            }
            data
        }
    }

    fn metadata(&self) -> Metadata {
        let Some(get) = self.table.get_metadata else {
            return Metadata::default();
        };
        let mut raw = RawMetadata::default();
        // SAFETY: as in `timer_data`.
        unsafe {
            get(&mut raw);
            let data = raw.read();
            match self.table.free_metadata {
                Some(free) => free(&mut raw),
                None => tracing::debug!(tool = %self.name, "no free_metadata, result leaked"),
            }
            data
        }
    }
}

#[cfg(feature = "dynamic-lookup")]
mod symbols {
    use libloading::Library;

    use super::BindingTable;

    /// Handle on the global symbol namespace of the running process.
    pub(super) fn this_process() -> Result<Library, libloading::Error> {
        #[cfg(unix)]
        {
            Ok(libloading::os::unix::Library::this().into())
        }
        #[cfg(windows)]
        {
            libloading::os::windows::Library::this().map(Into::into)
        }
    }

    /// # Safety
    /// A symbol found under `name` must have signature `T`.
    unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Option<T> {
        // SAFETY: forwarded from the caller.
        unsafe { library.get::<T>(name) }.ok().map(|s| *s)
    }

    /// # Safety
    /// Every `perftool_*` symbol present must have its declared signature.
    pub(super) unsafe fn bind(library: &Library) -> BindingTable {
        // SAFETY: forwarded from the caller.
        unsafe {
            BindingTable {
                init: symbol(library, b"perftool_init\0"),
                register_thread: symbol(library, b"perftool_register_thread\0"),
                finalize: symbol(library, b"perftool_exit\0"),
                dump_data: symbol(library, b"perftool_dump_data\0"),
                timer_create: symbol(library, b"perftool_timer_create\0"),
                timer_start: symbol(library, b"perftool_timer_start\0"),
                timer_stop: symbol(library, b"perftool_timer_stop\0"),
                set_parameter: symbol(library, b"perftool_set_parameter\0"),
                dynamic_phase_start: symbol(library, b"perftool_dynamic_phase_start\0"),
                dynamic_phase_stop: symbol(library, b"perftool_dynamic_phase_stop\0"),
                create_counter: symbol(library, b"perftool_create_counter\0"),
                sample_counter: symbol(library, b"perftool_sample_counter\0"),
                set_metadata: symbol(library, b"perftool_set_metadata\0"),
                get_timer_data: symbol(library, b"perftool_get_timer_data\0"),
                get_counter_data: symbol(library, b"perftool_get_counter_data\0"),
                get_metadata: symbol(library, b"perftool_get_metadata\0"),
                free_timer_data: symbol(library, b"perftool_free_timer_data\0"),
                free_counter_data: symbol(library, b"perftool_free_counter_data\0"),
                free_metadata: symbol(library, b"perftool_free_metadata\0"),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::result::{CounterRecord, CounterStats, MetadataEntry, TimerRecord};

    static INITS: AtomicUsize = AtomicUsize::new(0);
    static STARTS: AtomicUsize = AtomicUsize::new(0);
    static FREES: AtomicUsize = AtomicUsize::new(0);
    static TIMER: u8 = 0;

    unsafe extern "C" fn init() {
        INITS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn timer_create(_name: *const c_char) -> *mut c_void {
        std::ptr::addr_of!(TIMER).cast_mut().cast()
    }

    unsafe extern "C" fn timer_start(timer: *const c_void) {
        if timer == std::ptr::addr_of!(TIMER).cast() {
            STARTS.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe extern "C" fn get_timer_data(out: *mut RawTimerData) {
        let data = TimerData {
            num_threads: 1,
            metric_names: vec!["Calls".into(), "Inclusive Time".into(), "Exclusive Time".into()],
            timers: vec![TimerRecord {
                name: "Main Timer".into(),
                values: vec![1.0, 20.0, 10.0],
            }],
        };
        unsafe { *out = RawTimerData::from_owned(&data) };
    }

    unsafe extern "C" fn free_timer_data(data: *mut RawTimerData) {
        if let Some(data) = unsafe { data.as_mut() } {
            FREES.fetch_add(1, Ordering::SeqCst);
            unsafe { data.release() };
        }
    }

    unsafe extern "C" fn get_counter_data(out: *mut RawCounterData) {
        let data = CounterData {
            num_threads: 1,
            counters: vec![CounterRecord {
                name: "A Counter".into(),
                threads: vec![CounterStats {
                    num_samples: 3.0,
                    total: 6.0,
                    min: 1.0,
                    max: 3.0,
                    sum_of_squares: 14.0,
                }],
            }],
        };
        unsafe { *out = RawCounterData::from_owned(&data) };
    }

    unsafe extern "C" fn get_metadata(out: *mut RawMetadata) {
        let data = Metadata {
            entries: vec![MetadataEntry {
                name: "Name string".into(),
                value: "Value string".into(),
            }],
        };
        unsafe { *out = RawMetadata::from_owned(&data) };
    }

    unsafe extern "C" fn free_metadata(data: *mut RawMetadata) {
        if let Some(data) = unsafe { data.as_mut() } {
            unsafe { data.release() };
        }
    }

    /// A C-style tool with timers and queries but no counters.
    pub(crate) fn plugin(name: &'static CStr) -> PluginData {
        PluginData {
            tool_name: name.as_ptr(),
            initialize: Some(init),
            timer_create: Some(timer_create),
            timer_start: Some(timer_start),
            get_timer_data: Some(get_timer_data),
            free_timer_data: Some(free_timer_data),
            get_counter_data: Some(get_counter_data),
            get_metadata: Some(get_metadata),
            free_metadata: Some(free_metadata),
            ..PluginData::default()
        }
    }

    #[test]
    fn capabilities_mirror_bound_slots() {
        let table = BindingTable::from_plugin(&plugin(c"c tool"));
        let caps = table.capabilities();
        assert!(caps.contains(Capabilities::INIT | Capabilities::TIMER_CREATE));
        assert!(!caps.contains(Capabilities::SAMPLE_COUNTER));
        assert!(!caps.contains(Capabilities::FREE_COUNTER_DATA));
        assert_eq!(BindingTable::default().capabilities(), Capabilities::empty());
    }

    #[test]
    fn foreign_tool_forwards_bound_slots() {
        let tool = unsafe { ForeignTool::from_plugin(&plugin(c"c tool")) };
        assert_eq!(tool.name(), "c tool");

        let before = INITS.load(Ordering::SeqCst);
        tool.init();
        assert!(INITS.load(Ordering::SeqCst) > before);

        let timer = tool.timer_create("t");
        assert!(!timer.is_null());
        let starts = STARTS.load(Ordering::SeqCst);
        tool.timer_start(timer);
        assert!(STARTS.load(Ordering::SeqCst) > starts);

        // Unbound slots are inert.
        assert!(tool.create_counter("c").is_null());
        tool.sample_counter(Handle::NULL, 1.0);
        tool.timer_stop(timer);
    }

    #[test]
    fn foreign_queries_copy_out_and_free() {
        let tool = unsafe { ForeignTool::from_plugin(&plugin(c"c tool")) };

        let frees = FREES.load(Ordering::SeqCst);
        let timers = tool.timer_data();
        assert!(FREES.load(Ordering::SeqCst) > frees);
        assert_eq!(timers.num_timers(), 1);
        assert_eq!(timers.timers[0].name, "Main Timer");
        assert_eq!(timers.timers[0].values, vec![1.0, 20.0, 10.0]);

        let metadata = tool.metadata();
        assert_eq!(metadata.get("Name string"), Some("Value string"));

        // No free callback: the copy is still correct.
        let counters = tool.counter_data();
        assert_eq!(counters.counter("A Counter").unwrap().threads[0].total, 6.0);
    }

    #[test]
    fn unnamed_plugin_gets_placeholder_name() {
        let tool = unsafe { ForeignTool::from_plugin(&PluginData::default()) };
        assert_eq!(tool.name(), "unnamed tool");
        assert_eq!(tool.capabilities(), Capabilities::empty());
        assert!(tool.timer_data().is_empty());
    }

    #[cfg(feature = "dynamic-lookup")]
    #[test]
    fn lookup_without_perftool_symbols_fails() {
        let err = ForeignTool::lookup().unwrap_err();
        assert!(matches!(err, crate::error::ResolveError::MissingSymbol("perftool_init")));
    }
}
