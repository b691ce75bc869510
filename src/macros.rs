//! Small crate-wide convenience macros.

/// Verbose diagnostics. Compiled out of release builds.
///
/// ```rust,ignore
/// debug_log!("Resubscribed {} listeners", count);
/// ```
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::logging::debug(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        $crate::logging::info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        $crate::logging::warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        $crate::logging::error(&format!($($arg)*))
    };
}
