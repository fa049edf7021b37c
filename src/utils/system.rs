//! System helpers: privilege detection and opening URLs

use std::process::Command;

use crate::log_info;

const MODULE: &str = "utils::system";

/// Whether the process already runs with root privileges
#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Host operating system identifier ("linux", "macos", "windows", ...)
pub fn host_os() -> &'static str {
    std::env::consts::OS
}

/// Open a URL in the default browser
pub fn open_url(url: &str) -> Result<(), String> {
    log_info!(MODULE, "Opening URL: {}", url);

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/c", "start", "", url]);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(url);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    cmd.spawn()
        .map(|_| ())
        .map_err(|e| format!("Failed to open URL: {}", e))
}
