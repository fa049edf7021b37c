// Shared helpers for integration tests
#![allow(dead_code)]

use std::path::Path;

use acreetion_imager::config::paths::SESSION_LOCK_NAME;
use acreetion_imager::{FlasherEvent, Settings};
use tokio::sync::broadcast;

/// Settings that keep everything inside `work_dir` and never escalate
pub fn test_settings(work_dir: &Path) -> Settings {
    Settings {
        work_dir: Some(work_dir.to_path_buf()),
        elevation_command: String::new(),
        open_tool_page_on_failure: false,
        metadata_timeout_secs: 5,
        ..Settings::default()
    }
}

/// Deterministic test payload
pub fn create_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Everything published so far
pub fn drain(rx: &mut broadcast::Receiver<FlasherEvent>) -> Vec<FlasherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn progress_values(events: &[FlasherEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            FlasherEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// Files left in a directory, not counting the session lock
pub fn dir_entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name != SESSION_LOCK_NAME)
            .collect(),
        Err(_) => Vec::new(),
    }
}
