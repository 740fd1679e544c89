//! NVDA-Linux - a screen reader for Linux desktops
//!
//! Follows the focus through AT-SPI and reports it with speech, braille,
//! haptic feedback and spatial audio cues. Keyboard commands are read
//! from the evdev keyboards.

pub mod accessibility;
pub mod apps;
pub mod braille;
pub mod contrast;
pub mod error;
pub mod haptics;
pub mod input;
pub mod platform;
pub mod spatial;
pub mod speech;
pub mod state;

pub use error::{NvdaError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "nvda-linux";
