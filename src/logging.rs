//! Log sinks behind the `*_log!` macros.
//!
//! In the browser everything lands in the devtools console. Native builds
//! (unit tests, tooling) print to stderr because calling into `web_sys` off
//! wasm32 aborts.

#[cfg(target_arch = "wasm32")]
mod sink {
    pub fn debug(msg: &str) {
        web_sys::console::debug_1(&msg.into());
    }

    pub fn info(msg: &str) {
        web_sys::console::log_1(&msg.into());
    }

    pub fn warn(msg: &str) {
        web_sys::console::warn_1(&msg.into());
    }

    pub fn error(msg: &str) {
        web_sys::console::error_1(&msg.into());
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod sink {
    pub fn debug(msg: &str) {
        eprintln!("[debug] {}", msg);
    }

    pub fn info(msg: &str) {
        eprintln!("[info] {}", msg);
    }

    pub fn warn(msg: &str) {
        eprintln!("[warn] {}", msg);
    }

    pub fn error(msg: &str) {
        eprintln!("[error] {}", msg);
    }
}

pub use sink::{debug, error, info, warn};
