//! Core operations module
//!
//! Runs one flash session: download the image, hand it to the platform
//! writer, and clean up whatever the outcome.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::download::remove_file_if_present;
use crate::error::{FlashError, Result};
use crate::events::StatusKind;
use crate::session::{Phase, SessionGuard, WorkDirLock};
use crate::utils::download_filename;
use crate::{log_debug, log_error, log_info, log_warn};

use super::state::Flasher;

const MODULE: &str = "operations";

/// Outcome of a flash request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashResult {
    pub success: bool,
    pub message: String,
}

impl FlashResult {
    fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl Flasher {
    /// Download `image_url` and write it to `device_path`
    ///
    /// Never fails: every error is turned into an unsuccessful
    /// [`FlashResult`] and an error status event.
    pub async fn flash(&self, image_url: &str, device_path: &str) -> FlashResult {
        log_info!(MODULE, "Flash requested: {} -> {}", image_url, device_path);

        match self.run_flash(image_url.trim(), device_path.trim()).await {
            Ok(message) => {
                log_info!(MODULE, "{}", message);
                self.events.status(message.as_str(), StatusKind::Success);
                FlashResult::succeeded(message)
            }
            Err(e) => {
                let message = e.to_string();
                log_error!(MODULE, "Flash failed: {}", message);
                self.events.status(message.as_str(), StatusKind::Error);
                self.events.log_line(format!("ERROR: {}", message));
                if e.is_write_error() {
                    self.events
                        .log_line("Check the writer output above for details.");
                }
                FlashResult::failed(message)
            }
        }
    }

    async fn run_flash(&self, image_url: &str, device_path: &str) -> Result<String> {
        if image_url.is_empty() {
            return Err(FlashError::invalid_request("Please select an ISO image"));
        }
        if device_path.is_empty() {
            return Err(FlashError::invalid_request("Please select a USB drive"));
        }

        let mut guard = self.session.try_begin(image_url, device_path)?;
        if let Err(e) = self.lock_work_dir(&mut guard).await {
            guard.set_phase(Phase::Failed);
            return Err(e);
        }
        let image_path = self.settings.work_dir().join(download_filename(image_url));

        let outcome = self
            .download_and_write(&guard, image_url, &image_path, device_path)
            .await;

        guard.set_phase(if outcome.is_ok() {
            Phase::Succeeded
        } else {
            Phase::Failed
        });
        self.cleanup_session(&image_path).await;

        outcome
    }

    /// Create the working directory and lock it for this session
    ///
    /// Another process flashing from the same directory makes this fail
    /// with [`FlashError::SessionBusy`] before anything in it is touched.
    async fn lock_work_dir(&self, guard: &mut SessionGuard) -> Result<()> {
        let work_dir = self.settings.work_dir();
        if work_dir.exists() {
            self.events
                .log_line(format!("Using temporary directory: {}", work_dir.display()));
        } else {
            tokio::fs::create_dir_all(&work_dir)
                .await
                .map_err(|e| FlashError::io_at("create", &work_dir, e))?;
            self.events
                .log_line(format!("Created temporary directory: {}", work_dir.display()));
        }

        match WorkDirLock::try_acquire(&work_dir)? {
            Some(lock) => {
                guard.hold_lock(lock);
                Ok(())
            }
            None => {
                log_info!(
                    MODULE,
                    "{} is in use by another process",
                    work_dir.display()
                );
                Err(FlashError::SessionBusy)
            }
        }
    }

    async fn download_and_write(
        &self,
        guard: &SessionGuard,
        image_url: &str,
        image_path: &Path,
        device_path: &str,
    ) -> Result<String> {
        self.events.status("Downloading ISO...", StatusKind::Loading);
        self.events.log_line(format!(
            "Downloading ISO from {} to {}...",
            image_url,
            image_path.display()
        ));

        self.transfer
            .fetch_to_file(image_url, image_path, |percent| {
                guard.set_progress(percent);
                self.events.progress(percent);
                self.events
                    .status(format!("Downloading ISO... {}%", percent), StatusKind::Loading);
            })
            .await?;

        guard.set_phase(Phase::Writing);
        self.events.status("Starting flash process...", StatusKind::Loading);
        self.events.log_line(format!(
            "ISO download complete. Starting flash process to {}.",
            device_path
        ));
        self.events.progress(0);

        let on_progress = |percent: u8| guard.set_progress(percent);
        self.writer
            .write(image_path, device_path, &self.events, &on_progress)
            .await?;

        guard.set_progress(100);
        self.events.progress(100);
        Ok(format!("Flash completed successfully ({})!", self.writer.name()))
    }

    /// Remove the session's image and any writer artifacts
    ///
    /// Failures are reported as warnings only.
    async fn cleanup_session(&self, image_path: &Path) {
        match remove_file_if_present(image_path).await {
            Ok(true) => {
                log_info!(MODULE, "Temporary ISO file deleted: {}", image_path.display());
                self.events
                    .log_line(format!("Temporary ISO file deleted: {}", image_path.display()));
            }
            Ok(false) => log_debug!(MODULE, "No image to delete at {}", image_path.display()),
            Err(e) => {
                log_warn!(MODULE, "Failed to delete {}: {}", image_path.display(), e);
                self.events.log_line(format!(
                    "WARNING: Failed to delete temporary ISO file at {}: {}",
                    image_path.display(),
                    e
                ));
            }
        }

        self.writer.cleanup(&self.events).await;
    }
}
