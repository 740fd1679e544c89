//! Speech synthesis system

pub mod synth;
pub mod backends;
pub mod punctuation;
pub mod spelling;

pub use punctuation::{process_symbols, PunctuationLevel};
pub use synth::{create_synth, SpeechCommand, Synth};
