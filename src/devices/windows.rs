//! Windows device detection using `wmic diskdrive`

use crate::utils::format_size;

use super::types::StorageDevice;

pub const WMIC_ARGS: &[&str] = &["diskdrive", "get", "Caption,DeviceID,Size", "/format:list"];

#[derive(Default)]
struct Record {
    caption: Option<String>,
    device_id: Option<String>,
    size: Option<u64>,
}

impl Record {
    fn take_device(&mut self) -> Option<StorageDevice> {
        let (caption, device_id, size) = match (&self.caption, &self.device_id, self.size) {
            (Some(c), Some(d), Some(s)) => (c.clone(), d.clone(), s),
            _ => return None,
        };
        *self = Record::default();

        if caption.to_lowercase().contains("virtual disk") {
            return None;
        }

        Some(StorageDevice {
            label: format!("{} ({})", caption, device_id),
            path: device_id,
            size: format_size(size),
        })
    }
}

/// Parse `wmic ... /format:list` output
///
/// Records are blocks of `Key=Value` lines separated by blank lines. A
/// record is emitted as soon as it has a caption, a device ID and a numeric
/// size. Incomplete or unparsable records are dropped.
pub fn parse_wmic(output: &str) -> Vec<StorageDevice> {
    let mut devices = Vec::new();
    let mut record = Record::default();

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            record = Record::default();
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "Caption" if !value.is_empty() => record.caption = Some(value.to_string()),
            "DeviceID" if !value.is_empty() => record.device_id = Some(value.to_string()),
            "Size" => record.size = value.parse::<u64>().ok(),
            _ => continue,
        }

        if let Some(device) = record.take_device() {
            devices.push(device);
        }
    }

    devices
}
