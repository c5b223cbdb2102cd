//! Build script exporting test binaries' symbols to the dynamic table.
//!
//! Symbol lookup searches the running process, so test fixtures that define
//! `perftool_*` functions must be visible to `dlsym`.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux") {
        println!("cargo:rustc-link-arg-tests=-rdynamic");
    }
}
