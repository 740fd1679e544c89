//! Speech synthesizer abstraction
//!
//! Provides a unified interface for text-to-speech across engines.
//! The screen reader uses this to speak focus changes, command results and
//! anything else the user asks for.

use crate::{NvdaError, Result};
use log::info;

/// Commands sent to a speech backend
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechCommand {
    /// Speak a string of text
    Speak(String),
    /// Speak a single character (letter)
    Letter(char),
    /// Cancel/silence current speech
    Cancel,
    /// Set speech rate (0-100)
    SetRate(u8),
    /// Set speech pitch (0-100)
    SetPitch(u8),
    /// Set speech volume (0-100)
    SetVolume(u8),
    /// Select a voice by engine-specific name (e.g. "fr", "en-gb")
    SetVoice(String),
}

/// Speech synthesizer trait
///
/// All backends implement this to provide text-to-speech.
pub trait Synth: Send {
    /// Send a raw command to the backend
    fn send(&mut self, cmd: SpeechCommand) -> Result<()> {
        match cmd {
            SpeechCommand::Speak(text) => self.speak(&text),
            SpeechCommand::Letter(ch) => self.letter(&ch.to_string()),
            SpeechCommand::Cancel => self.cancel(),
            SpeechCommand::SetRate(rate) => self.set_rate(rate),
            SpeechCommand::SetPitch(pitch) => self.set_pitch(pitch),
            SpeechCommand::SetVolume(vol) => self.set_volume(vol),
            SpeechCommand::SetVoice(voice) => self.set_voice(&voice),
        }
    }

    /// Set speech rate (0-100, where 50 is normal)
    fn set_rate(&mut self, rate: u8) -> Result<()>;

    /// Set speech pitch (0-100, where 50 is normal)
    fn set_pitch(&mut self, pitch: u8) -> Result<()>;

    /// Set speech volume (0-100)
    fn set_volume(&mut self, volume: u8) -> Result<()>;

    /// Select a voice by name
    fn set_voice(&mut self, voice: &str) -> Result<()>;

    /// Speak text to the user
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Speak a single letter/character
    fn letter(&mut self, text: &str) -> Result<()>;

    /// Cancel/silence current speech
    fn cancel(&mut self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Reject values outside the 0-100 scale every backend shares
pub fn check_percent(what: &str, value: u8) -> Result<u8> {
    if value > 100 {
        return Err(NvdaError::Speech(format!(
            "{} {} is outside 0-100",
            what, value
        )));
    }
    Ok(value)
}

/// Create a speech synthesizer for the configured engine
///
/// `engine` is one of `espeak`, `speech-dispatcher`, `native` or `auto`.
///
/// **auto** tries, in order:
/// 1. Speech Dispatcher (standard Linux TTS, respects system preferences)
/// 2. espeak-ng (direct subprocess)
/// 3. The `tts` crate native bindings (macOS, Windows, other platforms)
pub fn create_synth(engine: &str) -> Result<Box<dyn Synth>> {
    use super::backends::espeak::EspeakSynth;
    use super::backends::native::NativeSynth;
    use super::backends::speech_dispatcher::SpeechDispatcherSynth;

    match engine {
        "espeak" | "espeak-ng" => Ok(Box::new(EspeakSynth::new()?)),
        "speech-dispatcher" | "speechd" => Ok(Box::new(SpeechDispatcherSynth::new()?)),
        "native" => Ok(Box::new(NativeSynth::new()?)),
        "auto" => {
            info!("Trying Speech Dispatcher backend...");
            match SpeechDispatcherSynth::new() {
                Ok(synth) => {
                    info!("Initialized Speech Dispatcher backend");
                    return Ok(Box::new(synth));
                }
                Err(e) => info!("Speech Dispatcher unavailable: {}", e),
            }

            info!("Trying espeak-ng backend...");
            match EspeakSynth::new() {
                Ok(synth) => {
                    info!("Initialized espeak-ng backend");
                    return Ok(Box::new(synth));
                }
                Err(e) => info!("espeak-ng unavailable: {}", e),
            }

            info!("Trying native TTS backend...");
            match NativeSynth::new() {
                Ok(synth) => {
                    info!("Initialized native TTS backend");
                    Ok(Box::new(synth))
                }
                Err(e) => Err(NvdaError::Speech(format!(
                    "No speech backend available. Tried:\n\
                     1. Speech Dispatcher (install: sudo apt install speech-dispatcher)\n\
                     2. espeak-ng (install: sudo apt install espeak-ng)\n\
                     3. Native TTS\n\
                     Error: {}",
                    e
                ))),
            }
        }
        other => Err(NvdaError::Speech(format!(
            "Unknown speech engine: {}",
            other
        ))),
    }
}
