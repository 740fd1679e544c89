//! Speech engine backends

// espeak-ng subprocess
pub mod espeak;

// Speech Dispatcher through spd-say
pub mod speech_dispatcher;

// tts crate native bindings
pub mod native;
