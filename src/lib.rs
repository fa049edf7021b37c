//! AcreetionOS Imager - download AcreetionOS ISOs and flash them to USB drives
//!
//! The library is driven through [`commands::Flasher`]: list the images on
//! the download page, list removable drives, and flash one onto the other
//! while progress is published on the event stream.

pub mod commands;
pub mod config;
pub mod devices;
pub mod download;
pub mod error;
pub mod events;
pub mod flash;
pub mod images;
pub mod logging;
pub mod session;
pub mod settings;
pub mod utils;

pub use commands::{FlashResult, Flasher};
pub use devices::StorageDevice;
pub use error::{FlashError, Result};
pub use events::{EventBus, FlasherEvent, StatusKind};
pub use images::ImageSource;
pub use settings::{Settings, ToolRetention};
