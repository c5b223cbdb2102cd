//! Process-wide facade with no tool present.

use perfstubs_api::{FacadeConfig, RawCounterData, RawMetadata, RawTimerData, Strategy};

#[test]
fn every_call_is_a_no_op() {
    perfstubs_api::init_with_config(FacadeConfig::new().with_strategy(Strategy::Dynamic));
    assert!(!perfstubs_api::is_initialized());
    assert!(perfstubs_api::get().resolution_error().is_some());

    perfstubs_api::register_thread();
    let timer = perfstubs_api::timer_create("t");
    assert!(timer.is_null());
    perfstubs_api::timer_start(timer);
    perfstubs_api::timer_stop(timer);
    perfstubs_api::set_parameter("p", 1);
    perfstubs_api::dynamic_phase_start("phase", 0);
    perfstubs_api::dynamic_phase_stop("phase", 0);
    let counter = perfstubs_api::create_counter("c");
    assert!(counter.is_null());
    perfstubs_api::sample_counter(counter, 1.0);
    perfstubs_api::set_metadata("k", "v");
    perfstubs_api::dump_data();

    assert!(perfstubs_api::timer_data().is_empty());
    assert!(perfstubs_api::counter_data().is_empty());
    assert!(perfstubs_api::metadata().is_empty());

    let mut timers = RawTimerData::default();
    perfstubs_api::get_timer_data_raw(&mut timers);
    assert_eq!(timers.num_timers, 0);
    assert!(timers.is_released());
    unsafe { perfstubs_api::free_timer_data_raw(&mut timers) };

    let mut counters = RawCounterData::default();
    perfstubs_api::get_counter_data_raw(&mut counters);
    assert_eq!(counters.num_counters, 0);

    let mut metadata = RawMetadata::default();
    perfstubs_api::get_metadata_raw(&mut metadata);
    assert_eq!(metadata.num_values, 0);

    // Binding is decided once; a late registration is not picked up.
    perfstubs_api::registry().register(std::sync::Arc::new(Late));
    assert!(!perfstubs_api::is_initialized());
    perfstubs_api::finalize();
}

struct Late;

impl perfstubs_api::Tool for Late {
    fn name(&self) -> &str {
        "late"
    }
}
