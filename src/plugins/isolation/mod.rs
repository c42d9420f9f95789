// src/plugins/isolation/mod.rs
mod guard;

pub use guard::{catch_panic, install_panic_hook, PanicReport};
