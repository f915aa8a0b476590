//! Puts the workspace `memory.x` where the linker looks for it when building the examples,
//! and rebuilds them whenever the memory map changes.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rustc-link-arg-examples=--nmagic");
    println!("cargo:rustc-link-arg-examples=-Tlink.x");
    println!("cargo:rerun-if-changed=../memory.x");

    let out = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    fs::write(out.join("memory.x"), include_bytes!("../memory.x")).expect("write memory.x");
    println!("cargo:rustc-link-search={}", out.display());
}
