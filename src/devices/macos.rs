//! macOS device detection using `diskutil`

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{StorageDevice, UNKNOWN_SIZE};

pub const DISKUTIL_ARGS: &[&str] = &["list", "external", "physical"];

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/dev/(disk\d+))\s+\(external, physical\):").expect("valid diskutil header regex")
});

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*(\d+(?:\.\d+)?\s[KMGTPEZY]?i?B)").expect("valid diskutil size regex")
});

/// Parse `diskutil list external physical` output
///
/// Each `/dev/diskN (external, physical):` header opens a device. Its size is
/// taken from the starred whole-disk entry of the table that follows.
pub fn parse_diskutil(output: &str) -> Vec<StorageDevice> {
    let mut devices: Vec<(String, StorageDevice)> = Vec::new();
    let mut size_pending = false;

    for line in output.lines() {
        if let Some(caps) = HEADER_RE.captures(line.trim()) {
            devices.push((
                caps[2].to_string(),
                StorageDevice {
                    path: caps[1].to_string(),
                    label: String::new(),
                    size: UNKNOWN_SIZE.to_string(),
                },
            ));
            size_pending = true;
            continue;
        }

        if !size_pending {
            continue;
        }
        if let Some(caps) = SIZE_RE.captures(line) {
            if let Some((_, current)) = devices.last_mut() {
                current.size = caps[1].to_string();
            }
            size_pending = false;
        }
    }

    devices
        .into_iter()
        .map(|(disk, mut device)| {
            device.label = format!("External Disk ({}) - {}", disk, device.size);
            device
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
/dev/disk4 (external, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:     FDisk_partition_scheme                        *31.9 GB    disk4
   1:                 DOS_FAT_32 UNTITLED                31.9 GB    disk4s1

this line is noise
/dev/disk5 (external, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:      GUID_partition_scheme                        *8.0 GB     disk5
";

    #[test]
    fn test_parses_devices_in_order() {
        let devices = parse_diskutil(SAMPLE);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].path, "/dev/disk4");
        assert_eq!(devices[0].size, "31.9 GB");
        assert_eq!(devices[0].label, "External Disk (disk4) - 31.9 GB");
        assert_eq!(devices[1].path, "/dev/disk5");
        assert_eq!(devices[1].size, "8.0 GB");
    }

    #[test]
    fn test_missing_size() {
        let devices = parse_diskutil("/dev/disk6 (external, physical):\n");
        assert_eq!(devices[0].size, UNKNOWN_SIZE);
    }

    #[test]
    fn test_internal_disks_ignored() {
        assert!(parse_diskutil("/dev/disk0 (internal, physical):\n   0: *500.3 GB disk0\n").is_empty());
    }
}
