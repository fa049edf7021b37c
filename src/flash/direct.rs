//! Direct block copy writer (Linux, macOS)
//!
//! Runs `dd` with progress output through a privilege escalation wrapper
//! (pkexec by default). The wrapper shows a graphical authentication dialog
//! for the user to enter their password.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::process::run_writer;
use crate::config;
use crate::error::{FlashError, Result};
use crate::events::{EventBus, StatusKind};
use crate::settings::Settings;
use crate::utils::{bytes_to_mb, is_root, percent_of};
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "flash::direct";

/// `<throughput> <unit>B/s ... <n>%` or `<bytes> bytes transferred ... <n>%`
static DD_PERCENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s(B|K|M|G|T)B/s.*?(\d+)%|\d+\sbytes\stransferred.*?(\d+)%")
        .expect("valid dd progress regex")
});

/// `<bytes> bytes (...) copied` (GNU) or `<bytes> bytes (...) transferred` (BSD)
static DD_BYTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s+bytes\b.*\b(?:copied|transferred)").expect("valid dd byte count regex")
});

/// Extract a percentage from one line of dd output
///
/// Lines with an explicit percentage win. Otherwise a byte count is turned
/// into a percentage of `image_size` when the size is known.
pub fn parse_dd_progress(line: &str, image_size: u64) -> Option<u8> {
    if let Some(caps) = DD_PERCENT_RE.captures(line) {
        let percent = caps.get(3).or_else(|| caps.get(4))?;
        return percent.as_str().parse::<u64>().ok().map(|p| p.min(100) as u8);
    }

    let caps = DD_BYTES_RE.captures(line.trim())?;
    let written = caps[1].parse::<u64>().ok()?;
    percent_of(written, image_size)
}

/// dd-based writer
#[derive(Debug, Clone)]
pub struct DirectCopy {
    program: String,
    /// `None` when already root or elevation is disabled
    elevation: Option<String>,
}

impl DirectCopy {
    pub fn new(settings: &Settings) -> Self {
        let wrapper = settings.elevation_command.trim();
        let elevation = if is_root() || wrapper.is_empty() {
            None
        } else {
            Some(wrapper.to_string())
        };

        Self {
            program: settings.copy_program.clone(),
            elevation,
        }
    }

    /// Program and arguments that copy `image` onto `device`
    pub fn command_line(&self, image: &Path, device: &str) -> (String, Vec<String>) {
        let mut args = vec![
            format!("if={}", image.display()),
            format!("of={}", device),
            format!("bs={}", config::dd::BLOCK_SIZE),
            "status=progress".to_string(),
            "oflag=sync".to_string(),
        ];

        match &self.elevation {
            Some(wrapper) => {
                args.insert(0, self.program.clone());
                (wrapper.clone(), args)
            }
            None => (self.program.clone(), args),
        }
    }

    /// Flash `image` to the block device at `device`
    pub async fn write(
        &self,
        image: &Path,
        device: &str,
        events: &EventBus,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<()> {
        let image_size = tokio::fs::metadata(image)
            .await
            .map_err(|e| FlashError::io_at("read size of", image, e))?
            .len();

        log_info!(
            MODULE,
            "Starting flash: {} -> {} ({:.2} MB)",
            image.display(),
            device,
            bytes_to_mb(image_size)
        );
        if self.elevation.is_some() {
            events.log_line("Administrator privileges are required to write to the drive.");
        }

        let (program, args) = self.command_line(image, device);
        let mut last_percent: Option<u8> = None;

        let result = run_writer(&program, &args, events, |line| {
            match parse_dd_progress(line, image_size) {
                Some(percent) if last_percent != Some(percent) => {
                    last_percent = Some(percent);
                    on_progress(percent);
                    events.progress(percent);
                    events.status(format!("Flashing... {}%", percent), StatusKind::Loading);
                }
                Some(_) => {}
                None if line.contains("bytes transferred") => {
                    events.status("Flashing... (transferring data)", StatusKind::Loading);
                }
                None => log_debug!(MODULE, "No progress in: {}", line),
            }
        })
        .await;

        match &result {
            Ok(()) => log_info!(MODULE, "Write complete: {}", device),
            Err(e) => log_error!(MODULE, "Write to {} failed: {}", device, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_after_throughput() {
        assert_eq!(parse_dd_progress("512 MB copied, 10 s, 51.2 MB/s (25%)", 0), Some(25));
        assert_eq!(parse_dd_progress("1.5 GB/s done 100%", 0), Some(100));
    }

    #[test]
    fn test_percent_after_bytes_transferred() {
        assert_eq!(
            parse_dd_progress("4194304 bytes transferred in 1.0 secs 40%", 0),
            Some(40)
        );
    }

    #[test]
    fn test_bytes_copied_fallback() {
        let line = "1048576000 bytes (1.0 GB, 1000 MiB) copied, 5 s, 210 MB/s";
        assert_eq!(parse_dd_progress(line, 2_097_152_000), Some(50));
        // Unknown image size gives no update
        assert_eq!(parse_dd_progress(line, 0), None);
    }

    #[test]
    fn test_noise_is_ignored() {
        assert_eq!(parse_dd_progress("dd: warning: partial read", 1000), None);
        assert_eq!(parse_dd_progress("", 1000), None);
        assert_eq!(parse_dd_progress("==== AUTHENTICATING FOR org.freedesktop.policykit.exec ====", 1000), None);
    }

    #[test]
    fn test_command_line_with_elevation() {
        let writer = DirectCopy {
            program: "dd".to_string(),
            elevation: Some("pkexec".to_string()),
        };
        let (program, args) = writer.command_line(Path::new("/tmp/a.iso"), "/dev/sdb");
        assert_eq!(program, "pkexec");
        assert_eq!(
            args,
            vec!["dd", "if=/tmp/a.iso", "of=/dev/sdb", "bs=4M", "status=progress", "oflag=sync"]
        );
    }

    #[test]
    fn test_empty_elevation_runs_directly() {
        let settings = Settings {
            elevation_command: String::new(),
            copy_program: "true".to_string(),
            ..Settings::default()
        };
        let writer = DirectCopy::new(&settings);
        let (program, args) = writer.command_line(Path::new("a.iso"), "/dev/sdc");
        assert_eq!(program, "true");
        assert_eq!(args[0], "if=a.iso");
    }
}
