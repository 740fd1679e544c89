//! Keyboard discovery and reading through evdev
//!
//! A device counts as a keyboard when it supports KEY_A, KEY_SPACE and
//! KEY_ENTER. Devices are only read, never grabbed, so keys still reach
//! the desktop.

use super::event::KeyEvent;
use crate::{NvdaError, Result};
use evdev::{AttributeSetRef, Device};
use log::{debug, warn};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

const REQUIRED_KEYS: [evdev::KeyCode; 3] = [
    evdev::KeyCode::KEY_A,
    evdev::KeyCode::KEY_SPACE,
    evdev::KeyCode::KEY_ENTER,
];

/// Does a supported-key set look like a keyboard's?
pub fn is_keyboard_keys(keys: &AttributeSetRef<evdev::KeyCode>) -> bool {
    REQUIRED_KEYS.iter().all(|key| keys.contains(*key))
}

pub fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().is_some_and(is_keyboard_keys)
}

/// Event nodes of every keyboard on this machine, sorted
pub fn discover_keyboards() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = evdev::enumerate()
        .filter(|(_, device)| is_keyboard(device))
        .map(|(path, device)| {
            debug!(
                "Keyboard found: {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed")
            );
            path
        })
        .collect();
    found.sort();
    found
}

/// Something the listener can poll for key events
pub trait KeySource: AsRawFd + Send {
    fn name(&self) -> &str;

    /// Drain every key event available now
    ///
    /// An error means the source is gone.
    fn read_keys(&mut self) -> Result<Vec<KeyEvent>>;
}

/// An open, non-blocking evdev keyboard
pub struct InputDevice {
    name: String,
    device: Device,
}

impl InputDevice {
    pub fn open(path: &Path) -> Result<Self> {
        let device = Device::open(path).map_err(|e| {
            NvdaError::Input(format!(
                "Cannot open {} (is the user in the 'input' group?): {}",
                path.display(),
                e
            ))
        })?;
        set_nonblocking(device.as_raw_fd())?;
        let name = match device.name() {
            Some(name) => format!("{} ({})", path.display(), name),
            None => path.display().to_string(),
        };
        Ok(Self { name, device })
    }
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

impl KeySource for InputDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_keys(&mut self) -> Result<Vec<KeyEvent>> {
        let mut keys = Vec::new();
        loop {
            match self.device.fetch_events() {
                Ok(events) => keys.extend(events.filter_map(|e| KeyEvent::from_input(&e))),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Read error on {}: {}", self.name, e);
                    return Err(e.into());
                }
            }
        }
        Ok(keys)
    }
}

impl AsRawFd for InputDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}
