//! Flash module
//!
//! Platform writer adapters. Linux and macOS copy the image straight to the
//! block device with dd; Windows hands the job to Rufus.

mod direct;
mod indirect;
mod process;

use std::path::Path;

pub use direct::{parse_dd_progress, DirectCopy};
pub use indirect::{parse_tool_line, IndirectTool, ToolUpdate};
pub use process::{exit_code_to_result, run_writer, split_output_lines};

use crate::download::Transfer;
use crate::error::{FlashError, Result};
use crate::events::EventBus;
use crate::settings::Settings;
use crate::utils::host_os;

/// Writer strategy for the host OS
#[derive(Clone)]
pub enum FlashWriter {
    DirectCopy(DirectCopy),
    IndirectTool(IndirectTool),
    /// Flashing is not available on this OS
    Unsupported(String),
}

impl FlashWriter {
    pub fn for_host(settings: &Settings, transfer: &Transfer) -> Self {
        Self::for_os(host_os(), settings, transfer)
    }

    pub fn for_os(os: &str, settings: &Settings, transfer: &Transfer) -> Self {
        match os {
            "linux" | "macos" => FlashWriter::DirectCopy(DirectCopy::new(settings)),
            "windows" => FlashWriter::IndirectTool(IndirectTool::new(settings, transfer.clone())),
            other => FlashWriter::Unsupported(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FlashWriter::DirectCopy(_) => "dd",
            FlashWriter::IndirectTool(_) => "rufus",
            FlashWriter::Unsupported(_) => "unsupported",
        }
    }

    /// Write `image` to `device`, publishing progress and output lines
    ///
    /// `on_progress` sees every new write percentage as it is published.
    pub async fn write(
        &self,
        image: &Path,
        device: &str,
        events: &EventBus,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<()> {
        match self {
            FlashWriter::DirectCopy(writer) => writer.write(image, device, events, on_progress).await,
            FlashWriter::IndirectTool(writer) => writer.write(image, device, events, on_progress).await,
            FlashWriter::Unsupported(os) => Err(FlashError::UnsupportedPlatform(os.clone())),
        }
    }

    /// Release writer-owned artifacts after a session
    pub async fn cleanup(&self, events: &EventBus) {
        if let FlashWriter::IndirectTool(writer) = self {
            writer.cleanup(events).await;
        }
    }
}
