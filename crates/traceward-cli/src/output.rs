//! Formatted output helpers for CLI commands.
//!
//! Provides consistent rendering of timestamps, command lines and
//! network endpoints in human-readable tables.

use chrono::{DateTime, SecondsFormat};

/// Formats a nanosecond Unix timestamp as RFC 3339 UTC with millisecond
/// precision. Zero means the source did not record a time and renders
/// as `-`.
#[must_use]
pub fn format_timestamp(timestamp_ns: i64) -> String {
    if timestamp_ns == 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_nanos(timestamp_ns).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Joins an executable path and its arguments into one command line.
#[must_use]
pub fn format_command(path: &str, args: &[String]) -> String {
    if args.is_empty() {
        return path.to_string();
    }
    format!("{path} {}", args.join(" "))
}

/// Formats an address and port, bracketing IPv6 addresses. Zeroed
/// endpoints render as `-`.
#[must_use]
pub fn format_endpoint(address: &str, port: u16) -> String {
    if address.is_empty() && port == 0 {
        "-".to_string()
    } else if address.contains(':') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}
