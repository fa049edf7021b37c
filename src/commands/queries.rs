//! Image and device listing commands

use crate::devices::{list_removable_devices, StorageDevice};
use crate::events::StatusKind;
use crate::images::{fetch_image_list, ImageSource, LOAD_ERROR_LABEL};
use crate::{log_error, log_info};

use super::state::Flasher;

const MODULE: &str = "commands::queries";

impl Flasher {
    /// Images offered on the download page
    ///
    /// Never fails. When the page cannot be loaded the list holds a single
    /// placeholder entry with an empty URL.
    pub async fn list_images(&self) -> Vec<ImageSource> {
        self.events.status("Loading ISO list...", StatusKind::Loading);

        let result = fetch_image_list(
            &self.transfer,
            &self.settings.image_page_url,
            self.settings.metadata_timeout(),
        )
        .await;

        match result {
            Ok(images) => {
                let count = images.iter().filter(|image| image.is_flashable()).count();
                if count == 0 {
                    self.events.status("Failed to load ISO list", StatusKind::Error);
                } else {
                    self.events
                        .status(format!("Found {} ISO images", count), StatusKind::Success);
                }
                images
            }
            Err(e) => {
                log_error!(MODULE, "Failed to load ISO list: {}", e);
                self.events.status(format!("Failed to load ISOs: {}", e), StatusKind::Error);
                self.events.log_line(format!("ERROR: Failed to load ISO list: {}", e));
                vec![ImageSource::sentinel(LOAD_ERROR_LABEL)]
            }
        }
    }

    /// Removable drives that can be flashed
    ///
    /// Never fails. Enumeration problems yield an empty list and a log event.
    pub async fn list_devices(&self) -> Vec<StorageDevice> {
        self.events
            .status("Searching for USB devices...", StatusKind::Loading);
        self.events.log_line("Searching for USB devices...");

        match list_removable_devices(self.probe.clone()).await {
            Ok(devices) => {
                log_info!(MODULE, "Found {} USB devices", devices.len());
                self.events
                    .log_line(format!("Found {} USB devices.", devices.len()));
                if devices.is_empty() {
                    self.events.status("No USB devices found", StatusKind::Default);
                } else {
                    self.events
                        .status(format!("Found {} USB devices", devices.len()), StatusKind::Success);
                }
                devices
            }
            Err(e) => {
                log_error!(MODULE, "{}", e);
                self.events.log_line(format!("ERROR: {}", e));
                self.events.status("Failed to detect USB devices", StatusKind::Error);
                Vec::new()
            }
        }
    }
}
