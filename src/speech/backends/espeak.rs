//! espeak-ng subprocess backend
//!
//! Each utterance runs as its own `espeak-ng` process; starting a new one
//! terminates the previous one so speech never piles up.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::speech::synth::check_percent;
use crate::speech::Synth;
use crate::{NvdaError, Result};
use log::{debug, error, warn};
use std::process::{Child, Command, Stdio};

/// espeak-ng backend
pub struct EspeakSynth {
    /// Currently running espeak-ng process
    current_process: Option<Child>,

    /// Rate setting (0-100)
    rate: u8,

    /// Pitch setting (0-100)
    pitch: u8,

    /// Volume setting (0-100)
    volume: u8,

    /// Voice name for espeak-ng
    voice: String,

    /// Path to espeak-ng
    espeak_path: String,
}

impl EspeakSynth {
    /// Create a new espeak-ng synthesizer
    ///
    /// Fails when espeak-ng is not installed
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            current_process: None,
            rate: 50,
            pitch: 50,
            volume: 100,
            voice: "en".to_string(),
            espeak_path,
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        for path in ["espeak-ng", "/usr/bin/espeak-ng"] {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(NvdaError::Speech(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Rate (0-100) to espeak words per minute
    fn rate_to_wpm(rate: u8) -> u16 {
        rate as u16 * 2
    }

    /// Arguments for one utterance
    fn build_args(&self, text: &str) -> Vec<String> {
        vec![
            "-v".to_string(),
            self.voice.clone(),
            "-s".to_string(),
            Self::rate_to_wpm(self.rate).to_string(),
            "-p".to_string(),
            self.pitch.to_string(),
            "-a".to_string(),
            self.volume.to_string(),
            // Text starting with '-' must not be read as an option
            "--".to_string(),
            text.to_string(),
        ]
    }

    /// Does espeak-ng list a voice with this name?
    fn voice_exists(&self, voice: &str) -> Result<bool> {
        let output = Command::new(&self.espeak_path)
            .arg(format!("--voices={}", voice))
            .stderr(Stdio::null())
            .output()?;
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(listing_contains_voice(&listing, voice))
    }

    /// Cancel any currently running speech process
    fn cancel_process(&mut self) {
        if let Some(mut child) = self.current_process.take() {
            debug!("Killing espeak-ng process");
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait();
                }
                Err(e) => {
                    debug!("Failed to kill espeak-ng process: {}", e);
                }
            }
        }
    }

    fn speak_internal(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        self.cancel_process();

        let mut cmd = Command::new(&self.espeak_path);
        cmd.args(self.build_args(text));
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                self.current_process = Some(child);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn espeak-ng: {}", e);
                Err(NvdaError::Speech(format!("Failed to start espeak-ng: {}", e)))
            }
        }
    }
}

/// Voice listings are tables; match the voice as a whole column value
pub(crate) fn listing_contains_voice(listing: &str, voice: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().any(|col| col == voice))
}

impl Synth for EspeakSynth {
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
        if self.voice_exists(voice)? {
            debug!("Setting voice to {}", voice);
            self.voice = voice.to_string();
            Ok(())
        } else {
            warn!("Voice '{}' not found", voice);
            Err(NvdaError::Speech(format!("Voice '{}' not found", voice)))
        }
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Speaking: {}", text);
        self.speak_internal(text)
    }

    fn letter(&mut self, text: &str) -> Result<()> {
        debug!("Speaking letter: {}", text);
        self.speak_internal(&format!(" {} ", text))
    }

    fn cancel(&mut self) -> Result<()> {
        self.cancel_process();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "espeak-ng"
    }
}

impl Drop for EspeakSynth {
    fn drop(&mut self) {
        self.cancel_process();
    }
}
