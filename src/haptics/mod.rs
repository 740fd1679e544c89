//! Haptic (vibration) feedback

pub mod controller;
pub mod patterns;
pub mod sysfs;

pub use controller::{HapticController, HapticSettings};
pub use patterns::{HapticPattern, PatternLibrary};
pub use sysfs::SysfsVibrator;

use crate::state::config::Config;
use crate::{NvdaError, Result};
use std::path::Path;

/// A vibration motor
pub trait HapticDevice: Send {
    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    /// Start vibrating for `ms`; returns without waiting
    fn pulse(&mut self, ms: u32, intensity: f32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Create the device named by `haptics.device`
pub fn create_device(config: &Config) -> Result<Box<dyn HapticDevice>> {
    let device = config.haptics_device();
    let root = match device.as_str() {
        "auto" | "sysfs" => Path::new(sysfs::SYSFS_CLASS_ROOT).to_path_buf(),
        other => Path::new(other).to_path_buf(),
    };
    SysfsVibrator::detect(&root)
        .map(|v| Box::new(v) as Box<dyn HapticDevice>)
        .ok_or_else(|| NvdaError::Haptics(format!("No vibrator found for device '{}'", device)))
}

/// Controller for the configured device, not yet connected
pub fn create_controller(config: &Config) -> Result<HapticController> {
    let device = create_device(config)?;
    Ok(HapticController::new(
        device,
        config.haptics_intensity(),
        u32::try_from(config.haptics_duration()).unwrap_or(u32::MAX),
    ))
}
