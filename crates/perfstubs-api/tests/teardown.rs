//! The process-wide tool is finalized when the process exits, even though
//! nothing calls `finalize` explicitly.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use perfstubs_api::{Capabilities, Tool};

const MARKER_ENV: &str = "PERFSTUBS_TEARDOWN_MARKER";

/// Writes its lifecycle events into a marker file.
struct Marking(PathBuf);

impl Marking {
    fn append(&self, event: &str) {
        let mut text = std::fs::read_to_string(&self.0).unwrap_or_default();
        text.push_str(event);
        text.push('\n');
        std::fs::write(&self.0, text).unwrap();
    }
}

impl Tool for Marking {
    fn name(&self) -> &str {
        "marking"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INIT | Capabilities::FINALIZE
    }

    fn init(&self) {
        self.append("init");
    }

    fn finalize(&self) {
        self.append("finalize");
    }
}

/// Runs for real only inside the child spawned below.
#[test]
fn bind_and_exit_without_finalizing() {
    let Some(marker) = std::env::var_os(MARKER_ENV) else {
        return;
    };
    perfstubs_api::registry().register(Arc::new(Marking(marker.into())));
    perfstubs_api::init();
    assert!(perfstubs_api::is_initialized());
}

#[test]
fn exit_finalizes_the_bound_tool() {
    let marker = std::env::temp_dir().join(format!("perfstubs-teardown-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "bind_and_exit_without_finalizing", "--test-threads=1"])
        .env(MARKER_ENV, &marker)
        .status()
        .unwrap();
    assert!(status.success());

    let events = std::fs::read_to_string(&marker).unwrap();
    std::fs::remove_file(&marker).unwrap();
    assert_eq!(events, "init\nfinalize\n");
}
