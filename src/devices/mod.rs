//! Device enumeration module
//!
//! Lists removable drives that can be flashed. Each host OS has its own
//! listing command and output parser; the parsers are plain functions over
//! text so every one of them is tested on every platform.

mod linux;
mod macos;
mod types;
mod windows;

use std::process::Command;

pub use linux::parse_lsblk;
pub use macos::parse_diskutil;
pub use types::{StorageDevice, UNKNOWN_SIZE};
pub use windows::parse_wmic;

use crate::error::{FlashError, Result};
use crate::utils::host_os;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "devices";

/// Listing strategy for the host OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceProbe {
    Lsblk,
    Diskutil,
    Wmic,
    /// No listing command is known for this OS
    Unsupported(String),
}

impl DeviceProbe {
    pub fn for_host() -> Self {
        Self::for_os(host_os())
    }

    pub fn for_os(os: &str) -> Self {
        match os {
            "linux" => DeviceProbe::Lsblk,
            "macos" => DeviceProbe::Diskutil,
            "windows" => DeviceProbe::Wmic,
            other => DeviceProbe::Unsupported(other.to_string()),
        }
    }

    /// Program and arguments of the listing command
    pub fn command(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            DeviceProbe::Lsblk => Some(("lsblk", linux::LSBLK_ARGS)),
            DeviceProbe::Diskutil => Some(("diskutil", macos::DISKUTIL_ARGS)),
            DeviceProbe::Wmic => Some(("wmic", windows::WMIC_ARGS)),
            DeviceProbe::Unsupported(_) => None,
        }
    }

    pub fn parse(&self, output: &str) -> Vec<StorageDevice> {
        match self {
            DeviceProbe::Lsblk => parse_lsblk(output),
            DeviceProbe::Diskutil => parse_diskutil(output),
            DeviceProbe::Wmic => parse_wmic(output),
            DeviceProbe::Unsupported(_) => Vec::new(),
        }
    }

    /// Run the listing command and parse its output (blocking)
    ///
    /// An unsupported OS yields an empty list. A command that cannot be
    /// started or exits non-zero is an [`FlashError::Enumeration`].
    pub fn scan(&self) -> Result<Vec<StorageDevice>> {
        let Some((program, args)) = self.command() else {
            if let DeviceProbe::Unsupported(os) = self {
                log_warn!(MODULE, "Device listing is not supported on {}", os);
            }
            return Ok(Vec::new());
        };

        log_debug!(MODULE, "Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| FlashError::Enumeration(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlashError::Enumeration(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let devices = self.parse(&stdout);
        log_info!(MODULE, "Found {} removable device(s)", devices.len());
        for device in &devices {
            log_debug!(MODULE, "  {} - {} ({})", device.path, device.label, device.size);
        }
        Ok(devices)
    }
}

/// Enumerate devices on a blocking worker thread
pub async fn list_removable_devices(probe: DeviceProbe) -> Result<Vec<StorageDevice>> {
    tokio::task::spawn_blocking(move || probe.scan())
        .await
        .map_err(|e| FlashError::Enumeration(format!("Device scan task failed: {}", e)))?
}
