//! Speech Dispatcher backend via the `spd-say` client
//!
//! Speech Dispatcher owns the audio; `spd-say` clients exit right after
//! handing over the text and are reaped on the next call.

use super::espeak::listing_contains_voice;
use crate::speech::synth::check_percent;
use crate::speech::Synth;
use crate::{NvdaError, Result};
use log::{debug, warn};
use std::process::{Child, Command, Stdio};

/// Speech Dispatcher backend
pub struct SpeechDispatcherSynth {
    rate: u8,
    pitch: u8,
    volume: u8,
    /// Language passed with `-l`
    voice: String,
    /// spd-say clients not yet reaped
    clients: Vec<Child>,
}

impl SpeechDispatcherSynth {
    /// Create the backend, checking that `spd-say` is installed
    pub fn new() -> Result<Self> {
        let available = Command::new("spd-say")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if !available {
            return Err(NvdaError::Speech(
                "spd-say not found. Install with: sudo apt install speech-dispatcher".to_string(),
            ));
        }

        debug!("Speech Dispatcher backend created");
        Ok(Self {
            rate: 50,
            pitch: 50,
            volume: 100,
            voice: "en".to_string(),
            clients: Vec::new(),
        })
    }

    fn build_args(&self, text: &str) -> Vec<String> {
        vec![
            "-l".to_string(),
            self.voice.clone(),
            "-r".to_string(),
            self.rate.to_string(),
            "-p".to_string(),
            self.pitch.to_string(),
            "-i".to_string(),
            self.volume.to_string(),
            // Text starting with '-' must not be read as an option
            "--".to_string(),
            text.to_string(),
        ]
    }

    fn run(&mut self, args: &[String]) -> Result<()> {
        self.clients
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));

        let child = Command::new("spd-say")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NvdaError::Speech(format!("Failed to run spd-say: {}", e)))?;
        self.clients.push(child);
        Ok(())
    }
}

impl Synth for SpeechDispatcherSynth {
    fn set_rate(&mut self, rate: u8) -> Result<()> {
        self.rate = check_percent("rate", rate)?;
        Ok(())
    }

    fn set_pitch(&mut self, pitch: u8) -> Result<()> {
        self.pitch = check_percent("pitch", pitch)?;
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.volume = check_percent("volume", volume)?;
        Ok(())
    }

    fn set_voice(&mut self, voice: &str) -> Result<()> {
        let output = Command::new("spd-say")
            .arg("--list-synthesis-voices")
            .stderr(Stdio::null())
            .output()?;
        let listing = String::from_utf8_lossy(&output.stdout);
        if listing_contains_voice(&listing, voice) {
            self.voice = voice.to_string();
            Ok(())
        } else {
            warn!("Voice '{}' not found", voice);
            Err(NvdaError::Speech(format!("Voice '{}' not found", voice)))
        }
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        debug!("Speaking: {}", text);
        // A new utterance replaces the current one
        self.cancel()?;
        let args = self.build_args(text);
        self.run(&args)
    }

    fn letter(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.cancel()?;
        let mut args = vec!["-m".to_string(), "all".to_string()];
        args.extend(self.build_args(text));
        self.run(&args)
    }

    fn cancel(&mut self) -> Result<()> {
        self.run(&["--cancel".to_string()])
    }

    fn name(&self) -> &'static str {
        "speech-dispatcher"
    }
}
