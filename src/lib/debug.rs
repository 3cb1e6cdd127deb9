//! Debug output for makensis-runner
//!
//! Diagnostic lines are written to stderr only when `MAKENSIS_DEBUG` is set
//! to `1` or `true`, so captured makensis output is never polluted.

use std::env;

/// Environment variable that enables debug output
pub const DEBUG_ENV: &str = "MAKENSIS_DEBUG";

/// Check whether debug output is enabled
pub fn is_debug() -> bool {
    env::var(DEBUG_ENV).is_ok_and(|v| v == "1" || v == "true")
}

/// Get current timestamp in the format used by debug lines
pub fn get_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Format a debug line: `[timestamp] [Scope] message`
pub fn format_debug_line(scope: &str, message: &str) -> String {
    format!("[{}] [{}] {}", get_timestamp(), scope, message)
}

/// Write a debug line to stderr if debug output is enabled
pub fn log_debug(scope: &str, message: &str) {
    if is_debug() {
        eprintln!("{}", format_debug_line(scope, message));
    }
}
