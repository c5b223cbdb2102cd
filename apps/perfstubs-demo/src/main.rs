//! Perfstubs demo: instruments a small workload and prints what the
//! reference tool measured.

use std::thread;

use anyhow::Context;
use perfstubs_api::{dynamic_phase, metadata, sample_counter, scoped_timer, scoped_timer_fn};
use perfstubs_tool::{read_snapshot, ReferenceTool, ToolConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const WORKERS: u32 = 4;
const ITERATIONS: i32 = 5;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (_tool, id) = ReferenceTool::register(ToolConfig::from_env().with_name("demo tool"));
    info!("Registered reference tool {}", id);

    perfstubs_api::init();
    perfstubs_api::register_thread();
    run();
    perfstubs_api::dump_data();
    report();

    let dump_path = ToolConfig::from_env().dump_path;
    perfstubs_api::finalize();

    if let Some(path) = dump_path {
        let snapshot = read_snapshot(&path)
            .with_context(|| format!("reading snapshot from {}", path.display()))?;
        info!(
            "Snapshot at {} holds {} timers over {} threads",
            path.display(),
            snapshot.timers.num_timers(),
            snapshot.timers.num_threads
        );
    }
    Ok(())
}

fn run() {
    scoped_timer_fn!();
    metadata!("meta", "data");
    perfstubs_api::set_parameter("workers", i64::from(WORKERS));

    {
        scoped_timer!("timer");
        for i in 0..ITERATIONS {
            dynamic_phase!("iter", i);
        }
    }

    thread::scope(|s| {
        for worker in 0..WORKERS {
            s.spawn(move || work(worker));
        }
    });

    sample_counter!("counter", 15.0);
}

#[allow(clippy::cast_precision_loss)]
fn work(worker: u32) {
    scoped_timer_fn!();
    let mut acc = 0u64;
    for i in 0..10_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i ^ u64::from(worker));
    }
    sample_counter!("work result", (acc % 1000) as f64);
}

fn report() {
    let timers = perfstubs_api::timer_data();
    for (index, timer) in timers.timers.iter().enumerate() {
        for thread in 0..timers.num_threads {
            let values: Vec<String> = (0..timers.num_metrics())
                .filter_map(|metric| timers.value(index, thread, metric))
                .map(|v| format!("{v:.0}"))
                .collect();
            info!("{} [thread {}]: {}", timer.name, thread, values.join(" / "));
        }
    }

    for counter in perfstubs_api::counter_data().counters {
        for (thread, stats) in counter.threads.iter().enumerate() {
            if stats.num_samples > 0.0 {
                info!(
                    "{} [thread {}]: n={} mean={:.2} min={} max={}",
                    counter.name,
                    thread,
                    stats.num_samples,
                    stats.mean(),
                    stats.min,
                    stats.max
                );
            }
        }
    }

    for entry in perfstubs_api::metadata().entries {
        info!("{} = {}", entry.name, entry.value);
    }
}

fn print_help() {
    eprintln!(
        "Perfstubs demo

USAGE:
    cargo run -p perfstubs-demo

ENVIRONMENT VARIABLES:
    PERFSTUBS_DUMP_PATH     Write a bincode snapshot of the measurements here
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
