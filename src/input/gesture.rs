//! Gestures and keyboard state tracking
//!
//! A gesture is a set of held modifiers plus one key, written the NVDA way:
//! `nvda+shift+t`. The `nvda` modifier is whichever of Insert and CapsLock
//! the keyboard section allows.

use super::event::{KeyEvent, KeyEventKind};
use super::keys::KeyCode;
use crate::state::config::Config;
use crate::{NvdaError, Result};
use bitflags::bitflags;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

bitflags! {
    /// Logical modifiers, left and right keys folded together
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NVDA = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SHIFT = 1 << 3;
        const META = 1 << 4;
    }
}

impl Modifiers {
    fn parse_name(name: &str) -> Option<Modifiers> {
        match name {
            "nvda" => Some(Modifiers::NVDA),
            "control" | "ctrl" => Some(Modifiers::CONTROL),
            "alt" => Some(Modifiers::ALT),
            "shift" => Some(Modifiers::SHIFT),
            "meta" | "super" | "windows" => Some(Modifiers::META),
            _ => None,
        }
    }

    /// Canonical names in gesture order
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for (flag, name) in [
            (Modifiers::NVDA, "nvda"),
            (Modifiers::CONTROL, "control"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
            (Modifiers::META, "meta"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        names
    }
}

/// Modifiers plus one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gesture {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl Gesture {
    pub fn new(modifiers: Modifiers, key: KeyCode) -> Self {
        Self { modifiers, key }
    }
}

impl FromStr for Gesture {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let parts: Vec<&str> = lower.split('+').map(str::trim).collect();
        let Some((key, mods)) = parts.split_last() else {
            return Err(NvdaError::Input(format!("Empty gesture: {:?}", s)));
        };

        let mut modifiers = Modifiers::empty();
        for name in mods {
            let flag = Modifiers::parse_name(name)
                .ok_or_else(|| NvdaError::Input(format!("Unknown modifier '{}' in {}", name, s)))?;
            modifiers |= flag;
        }

        let key = KeyCode::from_name(key)
            .ok_or_else(|| NvdaError::Input(format!("Unknown key '{}' in {}", key, s)))?;

        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.modifiers.names() {
            write!(f, "{}+", name)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Which keys are currently down, and recent timing
pub struct KeyState {
    pressed: HashSet<KeyCode>,
    modifiers: Modifiers,
    nvda_keys: Vec<KeyCode>,
    last_key: Option<KeyCode>,
    last_key_time: Option<Instant>,
    repeat_delay: Duration,
    repeat_rate: u64,
}

impl KeyState {
    pub fn new(nvda_keys: Vec<KeyCode>, repeat_delay: Duration, repeat_rate: u64) -> Self {
        Self {
            pressed: HashSet::new(),
            modifiers: Modifiers::empty(),
            nvda_keys,
            last_key: None,
            last_key_time: None,
            repeat_delay,
            repeat_rate,
        }
    }

    /// Keyboard settings: NVDA keys, repeat delay (ms) and rate (per second)
    pub fn from_config(config: &Config) -> Self {
        let mut nvda_keys = Vec::new();
        if config.insert_as_modifier() {
            nvda_keys.push(KeyCode::INSERT);
        }
        if config.caps_lock_as_modifier() {
            nvda_keys.push(KeyCode::CAPS_LOCK);
        }
        Self::new(
            nvda_keys,
            Duration::from_millis(config.key_repeat_delay()),
            config.key_repeat_rate(),
        )
    }

    /// The logical modifier a key acts as, if any
    pub fn modifier_of(&self, code: KeyCode) -> Option<Modifiers> {
        if self.nvda_keys.contains(&code) {
            return Some(Modifiers::NVDA);
        }
        match code {
            KeyCode::LEFT_SHIFT | KeyCode::RIGHT_SHIFT => Some(Modifiers::SHIFT),
            KeyCode::LEFT_CTRL | KeyCode::RIGHT_CTRL => Some(Modifiers::CONTROL),
            KeyCode::LEFT_ALT | KeyCode::RIGHT_ALT => Some(Modifiers::ALT),
            KeyCode::LEFT_META | KeyCode::RIGHT_META => Some(Modifiers::META),
            _ => None,
        }
    }

    /// Record an event
    pub fn update(&mut self, event: &KeyEvent) {
        match event.state {
            KeyEventKind::Pressed => {
                self.pressed.insert(event.code);
                if self.modifier_of(event.code).is_none() {
                    self.last_key = Some(event.code);
                    self.last_key_time = Some(Instant::now());
                }
            }
            KeyEventKind::Released => {
                self.pressed.remove(&event.code);
            }
            KeyEventKind::Repeat => {}
        }
        self.modifiers = self.held_modifiers();
    }

    // Recomputed from the pressed set so a left/right pair released one
    // at a time keeps the modifier held
    fn held_modifiers(&self) -> Modifiers {
        self.pressed
            .iter()
            .filter_map(|code| self.modifier_of(*code))
            .fold(Modifiers::empty(), |acc, m| acc | m)
    }

    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }

    pub fn last_key(&self) -> Option<KeyCode> {
        self.last_key
    }

    /// Time since the last non-modifier press
    pub fn since_last_key(&self) -> Option<Duration> {
        self.last_key_time.map(|t| t.elapsed())
    }

    pub fn repeat_delay(&self) -> Duration {
        self.repeat_delay
    }

    pub fn repeat_rate(&self) -> u64 {
        self.repeat_rate
    }

    /// The gesture a key press forms with the modifiers held now
    pub fn gesture_for(&self, code: KeyCode) -> Gesture {
        Gesture::new(self.modifiers, code)
    }

    /// Forget every held key, e.g. after the listener restarts
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.modifiers = Modifiers::empty();
    }
}
