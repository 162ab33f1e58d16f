#![deny(missing_docs)]
//! Shared logging utilities for the batchpoll workspace.
//!
//! This crate provides the `batch_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Messages logged from
//! a thread that has a poll tick set are prefixed with `[tick N]`.

use std::cell::Cell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Thread-local storage for the poll tick currently being handled.
    static POLL_TICK: Cell<u32> = const { Cell::new(0) };
}

/// Sets the poll tick for the current thread.
/// The coordinator loop calls this whenever a status query is dispatched;
/// pass 0 once the session is over.
pub fn set_poll_tick(tick: u32) {
    POLL_TICK.with(|v| v.set(tick));
}

/// Retrieves the poll tick for the current thread.
/// Returns 0 if no session is being polled.
pub fn poll_tick() -> u32 {
    POLL_TICK.with(|v| v.get())
}

/// Formats the log prefix for the current thread, empty outside a poll session.
#[doc(hidden)]
pub fn tick_prefix() -> String {
    match poll_tick() {
        0 => String::new(),
        tick => format!("[tick {tick}] "),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! batch_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::tick_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! batch_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::tick_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! batch_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::tick_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! batch_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::tick_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! batch_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::tick_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
