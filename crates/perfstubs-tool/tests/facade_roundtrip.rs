//! The reference tool bound through the process-wide facade.

use std::sync::Barrier;
use std::thread;

use approx::assert_relative_eq;
use perfstubs_api::{Handle, RawTimerData};
use perfstubs_tool::{read_snapshot, ReferenceTool, ToolConfig};

#[test]
fn instrumented_threads_report_through_facade() {
    const THREADS: usize = 4;
    let path = std::env::temp_dir().join(format!("perfstubs-roundtrip-{}.bin", std::process::id()));
    let (tool, _id) = ReferenceTool::register(
        ToolConfig::new()
            .with_name("tool one")
            .with_dump_path(&path),
    );

    perfstubs_api::init();
    assert_eq!(perfstubs_api::get().tool_name(), Some("tool one"));
    perfstubs_api::set_metadata("Name string", "Value string");

    let barrier = Barrier::new(THREADS);
    let handles: Vec<Handle> = thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let timer = perfstubs_api::timer_create("worker");
                    perfstubs_api::timer_start(timer);
                    perfstubs_api::get().sample_named("A Counter", 2.0);
                    perfstubs_api::timer_stop(timer);
                    timer
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(handles.iter().all(|h| *h == handles[0]));

    let timers = perfstubs_api::timer_data();
    assert_eq!(timers.num_threads, tool.num_threads());
    let record = timers.timer("worker").unwrap();
    let calls: f64 = record.values.iter().step_by(timers.num_metrics()).sum();
    assert_relative_eq!(calls, 4.0);

    let counters = perfstubs_api::counter_data();
    let samples: f64 = counters
        .counter("A Counter")
        .unwrap()
        .threads
        .iter()
        .map(|s| s.num_samples)
        .sum();
    assert_relative_eq!(samples, 4.0);

    let mut raw = RawTimerData::default();
    perfstubs_api::get_timer_data_raw(&mut raw);
    assert_eq!(unsafe { raw.read() }, timers);
    unsafe { perfstubs_api::free_timer_data_raw(&mut raw) };

    perfstubs_api::dump_data();
    let snapshot = read_snapshot(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(snapshot.timers, timers);
    assert_eq!(snapshot.metadata.get("Name string"), Some("Value string"));

    perfstubs_api::finalize();
}
