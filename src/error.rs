//! Error types for NVDA-Linux

use std::io;
use thiserror::Error;

/// Main error type for NVDA-Linux
#[derive(Error, Debug)]
pub enum NvdaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Braille error: {0}")]
    Braille(String),

    #[error("Haptic error: {0}")]
    Haptics(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Accessibility error: {0}")]
    Accessibility(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for NVDA-Linux operations
pub type Result<T> = std::result::Result<T, NvdaError>;

impl From<String> for NvdaError {
    fn from(s: String) -> Self {
        NvdaError::Other(s)
    }
}

impl From<&str> for NvdaError {
    fn from(s: &str) -> Self {
        NvdaError::Other(s.to_string())
    }
}
