//! Device types

use serde::{Deserialize, Serialize};

/// A candidate target drive, normalized across platforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDevice {
    /// OS-native device path (`/dev/sdb`, `/dev/disk4`, `\\.\PHYSICALDRIVE1`)
    pub path: String,
    /// Human-readable description
    pub label: String,
    /// Human-readable capacity
    pub size: String,
}

/// Placeholder used when the listing command does not report a size
pub const UNKNOWN_SIZE: &str = "Unknown Size";
