/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("git", "Git Pull {}", path.display());
/// log_status!("pipeline", "{} {}", stage, cookbook);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

/// Warning line on stderr, written whether or not stderr is a terminal.
#[macro_export]
macro_rules! log_warn {
    ($prefix:expr, $($arg:tt)*) => {
        eprintln!(concat!("[", $prefix, "] warning: {}"), format_args!($($arg)*));
    };
}

/// Error line on stderr, written whether or not stderr is a terminal.
#[macro_export]
macro_rules! log_error {
    ($prefix:expr, $($arg:tt)*) => {
        eprintln!(concat!("[", $prefix, "] error: {}"), format_args!($($arg)*));
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `spork::git` instead of `spork::core::git`
pub use core::*;
pub use utils::*;
