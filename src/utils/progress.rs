//! Progress tracking utility
//!
//! Tracks bytes processed for a download, turns them into integer
//! percentages for the event stream, and logs throughput at fixed intervals.

use std::time::Instant;

use super::{bytes_to_mb, percent_of};
use crate::log_debug;

/// Progress tracker for byte-counted operations
pub struct ProgressTracker {
    /// Operation name for logging (e.g., "Download", "Rufus download")
    operation_name: String,
    module_name: String,
    /// Total bytes to process (0 if unknown)
    total_bytes: u64,
    processed_bytes: u64,
    start_time: Instant,
    last_log_time: Instant,
    last_log_bytes: u64,
    log_interval_bytes: u64,
    /// Last percentage handed out by [`ProgressTracker::update`]
    last_percent: Option<u8>,
}

/// Final summary data
pub struct ProgressSummary {
    pub total_mb: f64,
    pub elapsed_secs: f64,
    pub avg_speed_mbps: f64,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `operation` - Name of the operation (e.g., "Download")
    /// * `module` - Module name for logging
    /// * `total_bytes` - Total bytes to process (0 if unknown)
    /// * `log_interval_mb` - Interval in MB between throughput logs
    pub fn new(operation: &str, module: &str, total_bytes: u64, log_interval_mb: u64) -> Self {
        let now = Instant::now();
        Self {
            operation_name: operation.to_string(),
            module_name: module.to_string(),
            total_bytes,
            processed_bytes: 0,
            start_time: now,
            last_log_time: now,
            last_log_bytes: 0,
            log_interval_bytes: log_interval_mb * 1024 * 1024,
            last_percent: None,
        }
    }

    /// Record `bytes_added` more bytes
    ///
    /// Returns the new integer percentage when it changed since the last
    /// call. Always `None` when the total is unknown.
    pub fn update(&mut self, bytes_added: u64) -> Option<u8> {
        self.processed_bytes += bytes_added;
        self.maybe_log();

        let percent = percent_of(self.processed_bytes, self.total_bytes)?;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }

    fn maybe_log(&mut self) {
        if self.log_interval_bytes == 0 {
            return;
        }

        let current_interval = self.processed_bytes / self.log_interval_bytes;
        let last_interval = self.last_log_bytes / self.log_interval_bytes;
        if current_interval <= last_interval {
            return;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_log_time).as_secs_f64();
        let bytes_since_last = self.processed_bytes - self.last_log_bytes;
        let speed_mbps = if elapsed > 0.0 {
            bytes_to_mb(bytes_since_last) / elapsed
        } else {
            0.0
        };

        self.last_log_time = now;
        self.last_log_bytes = self.processed_bytes;

        if self.total_bytes > 0 {
            log_debug!(
                &self.module_name,
                "{} progress: {:.1} MB / {:.1} MB @ {:.1} MB/s",
                self.operation_name,
                bytes_to_mb(self.processed_bytes),
                bytes_to_mb(self.total_bytes),
                speed_mbps
            );
        } else {
            log_debug!(
                &self.module_name,
                "{} progress: {:.1} MB @ {:.1} MB/s",
                self.operation_name,
                bytes_to_mb(self.processed_bytes),
                speed_mbps
            );
        }
    }

    /// Final summary with average speed
    pub fn finish(&self) -> ProgressSummary {
        let total_elapsed = self.start_time.elapsed().as_secs_f64();
        let total_mb = bytes_to_mb(self.processed_bytes);
        let avg_speed = if total_elapsed > 0.0 {
            total_mb / total_elapsed
        } else {
            0.0
        };

        ProgressSummary {
            total_mb,
            elapsed_secs: total_elapsed,
            avg_speed_mbps: avg_speed,
        }
    }
}
