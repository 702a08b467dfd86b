//! Human-readable formatting helpers used by the progress display

use std::time::Duration;

const KILOBYTE: u64 = 1024;
const MEGABYTE: u64 = KILOBYTE * 1024;
const GIGABYTE: u64 = MEGABYTE * 1024;

/// Format a byte count using binary units with two decimals
///
/// Values below one kilobyte are printed as a whole number of bytes. Exact
/// ties round up, so 1152 bytes is `1.13 KB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < KILOBYTE {
        format!("{} Bytes", bytes)
    } else if bytes < MEGABYTE {
        format!("{:.2} KB", round_half_up(bytes, KILOBYTE))
    } else if bytes < GIGABYTE {
        format!("{:.2} MB", round_half_up(bytes, MEGABYTE))
    } else {
        format!("{:.2} GB", round_half_up(bytes, GIGABYTE))
    }
}

/// `bytes / unit` rounded to two decimals, ties away from zero
fn round_half_up(bytes: u64, unit: u64) -> f64 {
    (bytes as f64 / unit as f64 * 100.0).round() / 100.0
}

/// Shorten a string to at most `limit` characters for display
///
/// Long strings keep a prefix, an ellipsis and their last three characters,
/// so file extensions stay visible. Limits too small to hold that shape fall
/// back to a plain prefix.
pub fn cap_string_length(value: &str, limit: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= limit {
        return value.to_string();
    }

    if limit < 6 {
        return chars[..limit].iter().collect();
    }

    let prefix: String = chars[..limit - 6].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Format a remaining-time estimate as `42s`, `3m05s` or `1h07m`
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
