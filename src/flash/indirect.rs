//! Indirect tool writer (Windows)
//!
//! Flashing is delegated to a pinned portable Rufus build, downloaded into
//! the working directory on first use. Rufus asks for Administrator rights
//! itself.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::process::run_writer;
use crate::config;
use crate::download::{remove_file_if_present, verify_sha256, Transfer};
use crate::error::{FlashError, Result};
use crate::events::{EventBus, StatusKind};
use crate::settings::{Settings, ToolRetention};
use crate::utils::open_url;
use crate::{log_error, log_info, log_warn};

const MODULE: &str = "flash::indirect";

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)%").expect("valid percentage regex"));

/// What one line of Rufus output tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolUpdate {
    Percent(u8),
    Status(&'static str),
}

/// Interpret one line of Rufus output
pub fn parse_tool_line(line: &str) -> Option<ToolUpdate> {
    if let Some(caps) = PERCENT_RE.captures(line) {
        let percent = caps[1].parse::<u64>().ok()?.min(100) as u8;
        return Some(ToolUpdate::Percent(percent));
    }
    if line.contains("bytes written") {
        Some(ToolUpdate::Status("Flashing... (writing data)"))
    } else if line.contains("Creating file system") {
        Some(ToolUpdate::Status("Flashing... (creating file system)"))
    } else if line.contains("Done") {
        // "Done" can arrive before the last percentage line
        Some(ToolUpdate::Percent(100))
    } else {
        None
    }
}

/// Rufus-based writer
#[derive(Clone)]
pub struct IndirectTool {
    transfer: Transfer,
    tool_path: PathBuf,
    tool_url: String,
    tool_sha256: Option<String>,
    retention: ToolRetention,
    open_page_on_failure: bool,
}

impl IndirectTool {
    pub fn new(settings: &Settings, transfer: Transfer) -> Self {
        Self {
            transfer,
            tool_path: settings.work_dir().join(config::tool::RUFUS_EXE),
            tool_url: settings.tool_url.clone(),
            tool_sha256: settings.tool_sha256.clone(),
            retention: settings.tool_retention,
            open_page_on_failure: settings.open_tool_page_on_failure,
        }
    }

    /// Where the cached tool lives
    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    /// Make sure the tool is present, downloading it if needed
    pub async fn ensure_tool(&self, events: &EventBus) -> Result<PathBuf> {
        if self.tool_path.exists() {
            log_info!(MODULE, "Rufus already present at {}", self.tool_path.display());
            events.log_line(format!(
                "Rufus already found at {}. Skipping download.",
                self.tool_path.display()
            ));
            return Ok(self.tool_path.clone());
        }

        events.status("Downloading Rufus...", StatusKind::Loading);
        events.log_line(format!(
            "Rufus not found locally. Downloading Rufus to {}...",
            self.tool_path.display()
        ));

        let download = self
            .transfer
            .fetch_to_file(&self.tool_url, &self.tool_path, |percent| {
                events.status(format!("Downloading Rufus... {}%", percent), StatusKind::Loading);
            })
            .await;

        if let Err(e) = download {
            log_error!(MODULE, "Rufus download failed: {}", e);
            if self.open_page_on_failure {
                if let Err(open_err) = open_url(&self.tool_url) {
                    log_warn!(MODULE, "{}", open_err);
                }
            }
            return Err(FlashError::transfer(format!(
                "Failed to download Rufus: {}. Please ensure you have an internet connection.",
                e
            )));
        }

        if let Some(expected) = &self.tool_sha256 {
            let path = self.tool_path.clone();
            let expected = expected.clone();
            let verified = tokio::task::spawn_blocking(move || verify_sha256(&path, &expected))
                .await
                .map_err(|e| FlashError::transfer(format!("Checksum task failed: {}", e)))?;
            if let Err(e) = verified {
                if let Err(remove_err) = remove_file_if_present(&self.tool_path).await {
                    log_warn!(
                        MODULE,
                        "Failed to remove rejected tool {}: {}",
                        self.tool_path.display(),
                        remove_err
                    );
                }
                return Err(e);
            }
        }

        events.log_line("Rufus download complete.");
        Ok(self.tool_path.clone())
    }

    pub fn command_line(&self, image: &Path, device: &str) -> Vec<String> {
        vec![
            "--iso".to_string(),
            image.display().to_string(),
            "--target".to_string(),
            device.to_string(),
            "--force".to_string(),
            "--wait".to_string(),
            "--log".to_string(),
        ]
    }

    /// Flash `image` to `device` through Rufus
    pub async fn write(
        &self,
        image: &Path,
        device: &str,
        events: &EventBus,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<()> {
        let tool = self.ensure_tool(events).await?;
        events.log_line(
            "Rufus will likely prompt for Administrator privileges. Please grant them for the flashing to proceed.",
        );
        events.status("Flashing to USB drive (via Rufus)...", StatusKind::Loading);

        let args = self.command_line(image, device);
        let program = tool.display().to_string();
        let mut last_percent: Option<u8> = None;

        run_writer(&program, &args, events, |line| match parse_tool_line(line) {
            Some(ToolUpdate::Percent(percent)) if last_percent != Some(percent) => {
                last_percent = Some(percent);
                on_progress(percent);
                events.progress(percent);
                events.status(format!("Flashing... {}%", percent), StatusKind::Loading);
            }
            Some(ToolUpdate::Status(message)) => events.status(message, StatusKind::Loading),
            _ => {}
        })
        .await
    }

    /// Remove the cached tool unless the retention policy keeps it
    pub async fn cleanup(&self, events: &EventBus) {
        if self.retention == ToolRetention::Keep {
            log_info!(MODULE, "Keeping Rufus at {}", self.tool_path.display());
            return;
        }

        match remove_file_if_present(&self.tool_path).await {
            Ok(true) => {
                log_info!(MODULE, "Rufus executable deleted: {}", self.tool_path.display());
                events.log_line(format!("Rufus executable deleted: {}", self.tool_path.display()));
            }
            Ok(false) => {}
            Err(e) => {
                log_warn!(MODULE, "Failed to delete {}: {}", self.tool_path.display(), e);
                events.log_line(format!(
                    "WARNING: Failed to delete Rufus executable at {}: {}",
                    self.tool_path.display(),
                    e
                ));
            }
        }
    }
}
