//! Linux device detection using `lsblk`

use std::collections::HashMap;

use super::types::{StorageDevice, UNKNOWN_SIZE};

/// `lsblk` arguments: whole disks only, no header, key="value" rows
pub const LSBLK_ARGS: &[&str] = &["-d", "-n", "-P", "-o", "NAME,SIZE,MODEL,TYPE,TRAN,RM"];

/// Kernel name prefixes of pseudo-devices that are never flash targets
const VIRTUAL_PREFIXES: &[&str] = &["loop", "ram", "zram"];

/// Parse one `KEY="value" KEY="value"` row
///
/// Returns `None` for anything that is not a complete sequence of pairs.
fn parse_pairs(line: &str) -> Option<HashMap<&str, &str>> {
    let mut pairs = HashMap::new();
    let mut rest = line.trim();

    while !rest.is_empty() {
        let (key, after) = rest.split_once("=\"")?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        let (value, tail) = after.split_once('"')?;
        pairs.insert(key, value);
        rest = tail.trim_start();
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

fn is_removable(name: &str, pairs: &HashMap<&str, &str>) -> bool {
    let removable_flag = pairs.get("RM").map(|v| v.trim() == "1").unwrap_or(false);
    let transport = pairs.get("TRAN").map(|v| v.trim()).unwrap_or("");
    removable_flag || transport == "usb" || transport == "mmc" || name.starts_with("mmcblk")
}

fn parse_line(line: &str) -> Option<StorageDevice> {
    let pairs = parse_pairs(line)?;
    let name = pairs.get("NAME").map(|v| v.trim()).filter(|v| !v.is_empty())?;

    if pairs.get("TYPE").map(|v| v.trim()) != Some("disk") {
        return None;
    }
    if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return None;
    }
    if !is_removable(name, &pairs) {
        return None;
    }

    let model = pairs
        .get("MODEL")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or("Unknown Device");
    let size = pairs
        .get("SIZE")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_SIZE);

    Some(StorageDevice {
        path: format!("/dev/{}", name),
        label: format!("{} ({})", model, name),
        size: size.to_string(),
    })
}

/// Parse `lsblk -P` output into removable devices, in output order
pub fn parse_lsblk(output: &str) -> Vec<StorageDevice> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}
