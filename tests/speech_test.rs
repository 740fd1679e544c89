//! Speech tests
//!
//! Engine creation depends on what is installed, so those tests only check
//! that failures are reported as errors. Text processing is tested fully.

use nvda_linux::speech::spelling::{phonetic, spell};
use nvda_linux::speech::{create_synth, process_symbols, PunctuationLevel, SpeechCommand, Synth};
use nvda_linux::state::config::Config;
use nvda_linux::Result;
use std::sync::{Arc, Mutex};

#[test]
fn test_create_synth_reports_failure() {
    match create_synth("auto") {
        Ok(synth) => println!("Speech backend available: {}", synth.name()),
        Err(e) => println!("No speech backend (expected without TTS): {}", e),
    }
    assert!(create_synth("festival-9000").is_err());
}

#[derive(Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Synth for Recorder {
    fn set_rate(&mut self, rate: u8) -> Result<()> {
        self.log.lock().unwrap().push(format!("rate {}", rate));
        Ok(())
    }
    fn set_pitch(&mut self, pitch: u8) -> Result<()> {
        self.log.lock().unwrap().push(format!("pitch {}", pitch));
        Ok(())
    }
    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.log.lock().unwrap().push(format!("volume {}", volume));
        Ok(())
    }
    fn set_voice(&mut self, voice: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("voice {}", voice));
        Ok(())
    }
    fn speak(&mut self, text: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("speak {}", text));
        Ok(())
    }
    fn letter(&mut self, text: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("letter {}", text));
        Ok(())
    }
    fn cancel(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("cancel".to_string());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[test]
fn test_send_dispatches_commands() {
    let mut synth = Recorder::default();
    let log = synth.log.clone();
    for cmd in [
        SpeechCommand::SetRate(70),
        SpeechCommand::SetVoice("en-gb".to_string()),
        SpeechCommand::Speak("hello".to_string()),
        SpeechCommand::Letter('x'),
        SpeechCommand::Cancel,
    ] {
        synth.send(cmd).unwrap();
    }
    assert_eq!(
        *log.lock().unwrap(),
        vec!["rate 70", "voice en-gb", "speak hello", "letter x", "cancel"]
    );
}

#[test]
fn test_punctuation_with_default_symbols() {
    let config = Config::defaults();
    let symbols = &config.symbols;

    assert_eq!(
        process_symbols("a@b", PunctuationLevel::Some, symbols),
        "a at b"
    );
    assert_eq!(
        process_symbols("wait...", PunctuationLevel::All, symbols),
        "wait 3 dot"
    );
    assert_eq!(
        process_symbols("a@b", PunctuationLevel::None, symbols),
        "a@b"
    );
}

#[test]
fn test_punctuation_level_parsing() {
    assert_eq!("most".parse::<PunctuationLevel>().unwrap(), PunctuationLevel::Most);
    assert!("loud".parse::<PunctuationLevel>().is_err());
    assert!(PunctuationLevel::All > PunctuationLevel::Some);
    assert_eq!(PunctuationLevel::default().to_string(), "some");
}

#[test]
fn test_spelling() {
    assert_eq!(spell("Hi y"), vec!["cap h", "i", "space", "y"]);
    assert_eq!(phonetic('Q'), Some("quebec"));
    assert_eq!(phonetic('7'), None);
}
