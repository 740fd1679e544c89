//! Native TTS backend using the tts crate
//!
//! The `tts` crate wraps Speech Dispatcher on Linux, AVFoundation on macOS
//! and SAPI/WinRT on Windows behind one interface.

use crate::speech::synth::check_percent;
use crate::speech::Synth;
use crate::{NvdaError, Result};
use log::{debug, error, warn};
use tts::Tts as TtsCrate;

/// Native TTS backend using the tts crate
pub struct NativeSynth {
    tts: TtsCrate,
}

impl NativeSynth {
    /// Create a new native TTS synthesizer
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| NvdaError::Speech(format!("Failed to initialize TTS: {}", e)))?;

        Ok(Self { tts })
    }

    /// Map 0-100 onto an engine range, 50 landing on the engine's normal value
    fn scale(value: u8, min: f32, normal: f32, max: f32) -> f32 {
        let v = value as f32;
        if v <= 50.0 {
            min + (normal - min) * v / 50.0
        } else {
            normal + (max - normal) * (v - 50.0) / 50.0
        }
    }
}

impl Synth for NativeSynth {
    fn set_rate(&mut self, rate: u8) -> Result<()> {
        check_percent("rate", rate)?;
        if !self.tts.supported_features().rate {
            warn!("Rate control not supported on this platform");
            return Ok(());
        }
        let converted = Self::scale(
            rate,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        self.tts
            .set_rate(converted)
            .map_err(|e| NvdaError::Speech(format!("Failed to set rate: {}", e)))?;
        Ok(())
    }

    fn set_pitch(&mut self, pitch: u8) -> Result<()> {
        check_percent("pitch", pitch)?;
        if !self.tts.supported_features().pitch {
            warn!("Pitch control not supported on this platform");
            return Ok(());
        }
        let converted = Self::scale(
            pitch,
            self.tts.min_pitch(),
            self.tts.normal_pitch(),
            self.tts.max_pitch(),
        );
        self.tts
            .set_pitch(converted)
            .map_err(|e| NvdaError::Speech(format!("Failed to set pitch: {}", e)))?;
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        check_percent("volume", volume)?;
        if !self.tts.supported_features().volume {
            warn!("Volume control not supported on this platform");
            return Ok(());
        }
        let min = self.tts.min_volume();
        let max = self.tts.max_volume();
        self.tts
            .set_volume(min + (max - min) * volume as f32 / 100.0)
            .map_err(|e| NvdaError::Speech(format!("Failed to set volume: {}", e)))?;
        Ok(())
    }

    fn set_voice(&mut self, voice: &str) -> Result<()> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| NvdaError::Speech(format!("Failed to get voices: {}", e)))?;

        let wanted = voice.to_lowercase();
        let found = voices.iter().find(|v| {
            v.name().to_lowercase() == wanted
                || v.language().as_str().to_lowercase().starts_with(&wanted)
        });

        match found {
            Some(v) => {
                debug!("Selecting voice: {}", v.name());
                self.tts
                    .set_voice(v)
                    .map(|_| ())
                    .map_err(|e| NvdaError::Speech(format!("Failed to set voice: {}", e)))
            }
            None => {
                warn!("Voice '{}' not found among {} voices", voice, voices.len());
                Err(NvdaError::Speech(format!("Voice '{}' not found", voice)))
            }
        }
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        debug!("Speaking: {}", text);
        self.tts.speak(text, true).map_err(|e| {
            error!("Failed to speak: {}", e);
            NvdaError::Speech(format!("Speak failed: {}", e))
        })?;
        Ok(())
    }

    fn letter(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.speak(text)
    }

    fn cancel(&mut self) -> Result<()> {
        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            NvdaError::Speech(format!("Cancel failed: {}", e))
        })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(NativeSynth::scale(0, 0.5, 1.0, 2.0), 0.5);
        assert_eq!(NativeSynth::scale(50, 0.5, 1.0, 2.0), 1.0);
        assert_eq!(NativeSynth::scale(75, 0.5, 1.0, 2.0), 1.5);
        assert_eq!(NativeSynth::scale(100, 0.5, 1.0, 2.0), 2.0);
    }
}
