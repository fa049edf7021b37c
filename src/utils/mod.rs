//! Utility functions shared across the application
//!
//! This module contains common helpers for formatting, system info,
//! path management, and progress tracking.

mod format;
mod path;
mod progress;
mod system;

pub use format::*;
pub use path::*;
pub use progress::*;
pub use system::*;
