//! Command surface
//!
//! [`Flasher`] is the handle a front end talks to: it lists images and
//! devices, runs flash sessions, and publishes progress events.

mod operations;
mod queries;
mod state;

pub use operations::FlashResult;
pub use state::Flasher;
