//! PCM playback for cues
//!
//! Raw samples are piped to `aplay` (ALSA) or `paplay` (PulseAudio /
//! PipeWire). A new cue cuts off the previous one.

use crate::{NvdaError, Result};
use log::{debug, error};
use std::io::Write;
use std::process::{Child, Command, Stdio};

/// Plays interleaved stereo i16 PCM
pub trait CuePlayer: Send {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tool {
    Aplay,
    Paplay,
}

/// Subprocess-based player
pub struct AplayPlayer {
    tool: Tool,
    current: Option<Child>,
}

fn available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

impl AplayPlayer {
    /// Use `aplay`, or `paplay` when ALSA utilities are missing
    pub fn new() -> Result<Self> {
        let tool = if available("aplay") {
            Tool::Aplay
        } else if available("paplay") {
            Tool::Paplay
        } else {
            return Err(NvdaError::Audio(
                "Neither aplay nor paplay found. Install with: sudo apt install alsa-utils"
                    .to_string(),
            ));
        };
        debug!("Cue player using {:?}", tool);
        Ok(Self {
            tool,
            current: None,
        })
    }

    fn command_line(tool: Tool, sample_rate: u32) -> (&'static str, Vec<String>) {
        match tool {
            Tool::Aplay => (
                "aplay",
                vec![
                    "-q".to_string(),
                    "-t".to_string(),
                    "raw".to_string(),
                    "-f".to_string(),
                    "S16_LE".to_string(),
                    "-c".to_string(),
                    "2".to_string(),
                    "-r".to_string(),
                    sample_rate.to_string(),
                ],
            ),
            Tool::Paplay => (
                "paplay",
                vec![
                    "--raw".to_string(),
                    "--format=s16le".to_string(),
                    "--channels=2".to_string(),
                    format!("--rate={}", sample_rate),
                ],
            ),
        }
    }

    fn kill_current(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Samples as little-endian bytes
pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

impl CuePlayer for AplayPlayer {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        self.kill_current();
        let (program, args) = Self::command_line(self.tool, sample_rate);
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NvdaError::Audio(format!("Failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&pcm_bytes(samples)) {
                error!("Failed to feed {}: {}", program, e);
            }
        }
        self.current = Some(child);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.kill_current();
        Ok(())
    }

    fn name(&self) -> &'static str {
        match self.tool {
            Tool::Aplay => "aplay",
            Tool::Paplay => "paplay",
        }
    }
}

impl Drop for AplayPlayer {
    fn drop(&mut self) {
        self.kill_current();
    }
}

pub fn create_player() -> Result<Box<dyn CuePlayer>> {
    Ok(Box::new(AplayPlayer::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        let (program, args) = AplayPlayer::command_line(Tool::Aplay, 44_100);
        assert_eq!(program, "aplay");
        assert_eq!(args, vec!["-q", "-t", "raw", "-f", "S16_LE", "-c", "2", "-r", "44100"]);
        let (program, args) = AplayPlayer::command_line(Tool::Paplay, 22_050);
        assert_eq!(program, "paplay");
        assert!(args.contains(&"--rate=22050".to_string()));
    }

    #[test]
    fn test_pcm_bytes() {
        assert_eq!(pcm_bytes(&[1, -2]), vec![0x01, 0x00, 0xFE, 0xFF]);
    }
}
