//! Formatting utilities for human-readable output

/// Bytes per megabyte constant
pub const MB: u64 = 1024 * 1024;

/// Convert bytes to megabytes as f64 (for calculations and logging)
#[inline]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / MB as f64
}

/// Format bytes into human-readable size string (e.g., "1.5 GB", "256 MB")
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.0} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Integer percentage of `done` over `total`, clamped to 0..=100
///
/// Returns `None` when the total is unknown (zero).
pub fn percent_of(done: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (done as u128 * 100 / total as u128).min(100);
    Some(pct as u8)
}
