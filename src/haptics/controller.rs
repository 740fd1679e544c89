//! Haptic playback
//!
//! Patterns play on a worker thread. Starting a new pattern, or `stop`,
//! cancels the running one through a shared flag.

use super::patterns::{HapticPattern, PatternLibrary};
use super::HapticDevice;
use crate::{NvdaError, Result};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sleep granularity while waiting out a segment
const TICK: Duration = Duration::from_millis(5);

/// Intensities stepped through by `calibrate`
const CALIBRATION_STEPS: [f32; 4] = [0.25, 0.5, 0.75, 1.0];

/// Runtime settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HapticSettings {
    pub intensity: Option<f32>,
    /// Pulse length for `test` and calibration, in ms
    pub duration: Option<u32>,
    pub patterns: Vec<(String, Vec<u32>)>,
}

/// One step of playback: vibrate (with intensity) or pause
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Vibrate(u32, f32),
    Pause(u32),
}

fn steps_for(pattern: &HapticPattern, intensity: f32) -> Vec<Step> {
    pattern
        .segments()
        .iter()
        .enumerate()
        .map(|(i, &ms)| match i % 2 {
            0 => Step::Vibrate(ms, intensity),
            _ => Step::Pause(ms),
        })
        .collect()
}

type SharedDevice = Arc<Mutex<Box<dyn HapticDevice>>>;

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    pattern: Vec<u32>,
    intensity: f32,
}

/// Waits `ms`, returning false when cancelled first
fn wait(ms: u32, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(ms as u64);
    while Instant::now() < deadline {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(TICK.min(deadline.saturating_duration_since(Instant::now())));
    }
    !cancel.load(Ordering::Relaxed)
}

fn play_steps(device: SharedDevice, steps: Vec<Step>, cancel: Arc<AtomicBool>) {
    for step in steps {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let ms = match step {
            Step::Vibrate(ms, intensity) => {
                let result = match device.lock() {
                    Ok(mut dev) => dev.pulse(ms, intensity),
                    Err(_) => Err(NvdaError::Haptics("device lock poisoned".to_string())),
                };
                if let Err(e) = result {
                    error!("Haptic pulse failed: {}", e);
                    return;
                }
                ms
            }
            Step::Pause(ms) => ms,
        };
        if !wait(ms, &cancel) {
            return;
        }
    }
}

/// Plays patterns on a haptic device
pub struct HapticController {
    device: SharedDevice,
    library: PatternLibrary,
    connected: bool,
    intensity: f32,
    duration: u32,
    defaults: (f32, u32),
    worker: Option<Worker>,
}

impl HapticController {
    pub fn new(device: Box<dyn HapticDevice>, intensity: f32, duration: u32) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            device: Arc::new(Mutex::new(device)),
            library: PatternLibrary::new(),
            connected: false,
            intensity,
            duration,
            defaults: (intensity, duration),
            worker: None,
        }
    }

    fn with_device<T>(&self, f: impl FnOnce(&mut dyn HapticDevice) -> Result<T>) -> Result<T> {
        let mut dev = self
            .device
            .lock()
            .map_err(|_| NvdaError::Haptics("device lock poisoned".to_string()))?;
        f(&mut **dev)
    }

    pub fn connect(&mut self) -> Result<()> {
        self.with_device(|d| d.connect())?;
        self.connected = true;
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.cancel_worker();
        self.connected = false;
        self.with_device(|d| d.disconnect())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Is a pattern still playing?
    pub fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Pattern and intensity of the playback started last, while it runs
    pub fn current(&self) -> Option<(&[u32], f32)> {
        self.worker
            .as_ref()
            .filter(|w| !w.handle.is_finished())
            .map(|w| (w.pattern.as_slice(), w.intensity))
    }

    /// Play raw on/off durations
    ///
    /// Returns false when disconnected, for an empty pattern or an
    /// intensity outside 0.0-1.0.
    pub fn vibrate(&mut self, pattern: &[u32], intensity: f32) -> Result<bool> {
        if !self.connected || !(0.0..=1.0).contains(&intensity) {
            return Ok(false);
        }
        let Ok(pattern) = HapticPattern::new(pattern.to_vec()) else {
            return Ok(false);
        };
        let steps = steps_for(&pattern, intensity);
        self.start(steps, pattern.segments().to_vec(), intensity)?;
        Ok(true)
    }

    /// Play a named pattern at the configured intensity
    pub fn play(&mut self, name: &str) -> Result<bool> {
        let pattern = self.library.get(name);
        self.vibrate(pattern.segments(), self.intensity)
    }

    /// Cancel playback and silence the motor
    pub fn stop(&mut self) -> Result<bool> {
        if !self.connected {
            return Ok(false);
        }
        self.cancel_worker();
        self.with_device(|d| d.stop())?;
        Ok(true)
    }

    /// Block until the current pattern has played
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.handle.join();
        }
    }

    /// `calibrate`, `reset`, `test` or `status`; anything else gives false
    pub fn execute_command(&mut self, command: &str) -> Result<bool> {
        if !self.connected {
            return Ok(false);
        }
        match command {
            "calibrate" => {
                let mut steps = Vec::new();
                for level in CALIBRATION_STEPS {
                    steps.push(Step::Vibrate(self.duration, level));
                    steps.push(Step::Pause(self.duration));
                }
                let pattern = vec![self.duration; steps.len()];
                self.start(steps, pattern, 1.0)?;
                Ok(true)
            }
            "reset" => {
                self.stop()?;
                (self.intensity, self.duration) = self.defaults;
                self.library = PatternLibrary::new();
                debug!("Haptic settings reset");
                Ok(true)
            }
            "test" => self.vibrate(&[self.duration], self.intensity),
            "status" => {
                let name = self.with_device(|d| Ok(d.name()))?;
                info!(
                    "Haptics: {} connected, intensity {:.2}, {} patterns, {}",
                    name,
                    self.intensity,
                    self.library.names().len(),
                    if self.is_active() { "playing" } else { "idle" }
                );
                Ok(true)
            }
            other => {
                warn!("Unknown haptic command: {}", other);
                Ok(false)
            }
        }
    }

    /// Apply settings; an out-of-range intensity or invalid pattern is an error
    pub fn configure(&mut self, settings: &HapticSettings) -> Result<bool> {
        if let Some(intensity) = settings.intensity {
            if !(0.0..=1.0).contains(&intensity) {
                return Err(NvdaError::Haptics(format!(
                    "Intensity {} outside 0.0-1.0",
                    intensity
                )));
            }
            self.intensity = intensity;
        }
        if let Some(duration) = settings.duration {
            self.duration = duration;
        }
        for (name, segments) in &settings.patterns {
            self.library.register(name, segments.clone())?;
        }
        Ok(true)
    }

    fn start(&mut self, steps: Vec<Step>, pattern: Vec<u32>, intensity: f32) -> Result<()> {
        self.cancel_worker();
        let cancel = Arc::new(AtomicBool::new(false));
        let device = self.device.clone();
        let flag = cancel.clone();
        let handle = thread::Builder::new()
            .name("haptics".to_string())
            .spawn(move || play_steps(device, steps, flag))?;
        self.worker = Some(Worker {
            cancel,
            handle,
            pattern,
            intensity,
        });
        Ok(())
    }

    fn cancel_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::Relaxed);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for HapticController {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
