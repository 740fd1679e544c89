//! Kernel vibrator control through sysfs
//!
//! Two interfaces exist: the legacy `timed_output` class (write a duration
//! in ms to `enable`) and the LED class with the `transient` trigger
//! (`duration` then `activate`).

use super::HapticDevice;
use crate::{NvdaError, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub const SYSFS_CLASS_ROOT: &str = "/sys/class";

#[derive(Debug, Clone, PartialEq)]
enum Interface {
    TimedOutput(PathBuf),
    Led(PathBuf),
}

/// A phone-style vibration motor
pub struct SysfsVibrator {
    interface: Interface,
    connected: bool,
}

impl SysfsVibrator {
    /// Look for a vibrator under a sysfs class root (normally `/sys/class`)
    pub fn detect(root: &Path) -> Option<Self> {
        let timed = root.join("timed_output/vibrator");
        let led = root.join("leds/vibrator");
        let interface = if timed.join("enable").exists() {
            Interface::TimedOutput(timed)
        } else if led.join("activate").exists() {
            Interface::Led(led)
        } else {
            return None;
        };
        debug!("Found vibrator: {:?}", interface);
        Some(Self {
            interface,
            connected: false,
        })
    }

    fn write(path: &Path, value: &str) -> Result<()> {
        fs::write(path, value)
            .map_err(|e| NvdaError::Haptics(format!("Cannot write {:?}: {}", path, e)))
    }
}

impl HapticDevice for SysfsVibrator {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        info!("Vibrator ready ({:?})", self.interface);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.stop()?;
            self.connected = false;
        }
        Ok(())
    }

    /// The motor has no amplitude control; zero intensity skips the pulse
    fn pulse(&mut self, ms: u32, intensity: f32) -> Result<()> {
        if intensity <= 0.0 || ms == 0 {
            return Ok(());
        }
        match &self.interface {
            Interface::TimedOutput(dir) => Self::write(&dir.join("enable"), &ms.to_string()),
            Interface::Led(dir) => {
                Self::write(&dir.join("duration"), &ms.to_string())?;
                Self::write(&dir.join("activate"), "1")
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        match &self.interface {
            Interface::TimedOutput(dir) => Self::write(&dir.join("enable"), "0"),
            Interface::Led(dir) => Self::write(&dir.join("activate"), "0"),
        }
    }

    fn name(&self) -> &'static str {
        match self.interface {
            Interface::TimedOutput(_) => "timed_output",
            Interface::Led(_) => "leds",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_none() {
        let dir = TempDir::new().unwrap();
        assert!(SysfsVibrator::detect(dir.path()).is_none());
    }

    #[test]
    fn test_timed_output() {
        let dir = TempDir::new().unwrap();
        let vib = dir.path().join("timed_output/vibrator");
        fs::create_dir_all(&vib).unwrap();
        fs::write(vib.join("enable"), "0").unwrap();

        let mut dev = SysfsVibrator::detect(dir.path()).unwrap();
        assert_eq!(dev.name(), "timed_output");
        dev.connect().unwrap();
        dev.pulse(120, 0.5).unwrap();
        assert_eq!(fs::read_to_string(vib.join("enable")).unwrap(), "120");
        dev.stop().unwrap();
        assert_eq!(fs::read_to_string(vib.join("enable")).unwrap(), "0");
    }

    #[test]
    fn test_led_class() {
        let dir = TempDir::new().unwrap();
        let vib = dir.path().join("leds/vibrator");
        fs::create_dir_all(&vib).unwrap();
        fs::write(vib.join("activate"), "0").unwrap();

        let mut dev = SysfsVibrator::detect(dir.path()).unwrap();
        dev.pulse(80, 1.0).unwrap();
        assert_eq!(fs::read_to_string(vib.join("duration")).unwrap(), "80");
        assert_eq!(fs::read_to_string(vib.join("activate")).unwrap(), "1");
    }
}
