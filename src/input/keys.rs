//! Linux key codes
//!
//! Codes and names come from the `evdev` crate. Gesture strings use the
//! kernel name without its `KEY_` prefix, lower-cased: `KEY_LEFTCTRL` is
//! "leftctrl".

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Highest key code the kernel defines
const KEY_CODE_MAX: u16 = 0x2ff;

/// A Linux input key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const ESC: KeyCode = KeyCode(evdev::KeyCode::KEY_ESC.0);
    pub const BACKSPACE: KeyCode = KeyCode(evdev::KeyCode::KEY_BACKSPACE.0);
    pub const TAB: KeyCode = KeyCode(evdev::KeyCode::KEY_TAB.0);
    pub const Q: KeyCode = KeyCode(evdev::KeyCode::KEY_Q.0);
    pub const T: KeyCode = KeyCode(evdev::KeyCode::KEY_T.0);
    pub const ENTER: KeyCode = KeyCode(evdev::KeyCode::KEY_ENTER.0);
    pub const LEFT_CTRL: KeyCode = KeyCode(evdev::KeyCode::KEY_LEFTCTRL.0);
    pub const A: KeyCode = KeyCode(evdev::KeyCode::KEY_A.0);
    pub const S: KeyCode = KeyCode(evdev::KeyCode::KEY_S.0);
    pub const LEFT_SHIFT: KeyCode = KeyCode(evdev::KeyCode::KEY_LEFTSHIFT.0);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(evdev::KeyCode::KEY_RIGHTSHIFT.0);
    pub const LEFT_ALT: KeyCode = KeyCode(evdev::KeyCode::KEY_LEFTALT.0);
    pub const SPACE: KeyCode = KeyCode(evdev::KeyCode::KEY_SPACE.0);
    pub const CAPS_LOCK: KeyCode = KeyCode(evdev::KeyCode::KEY_CAPSLOCK.0);
    pub const RIGHT_CTRL: KeyCode = KeyCode(evdev::KeyCode::KEY_RIGHTCTRL.0);
    pub const RIGHT_ALT: KeyCode = KeyCode(evdev::KeyCode::KEY_RIGHTALT.0);
    pub const HOME: KeyCode = KeyCode(evdev::KeyCode::KEY_HOME.0);
    pub const LEFT: KeyCode = KeyCode(evdev::KeyCode::KEY_LEFT.0);
    pub const RIGHT: KeyCode = KeyCode(evdev::KeyCode::KEY_RIGHT.0);
    pub const END: KeyCode = KeyCode(evdev::KeyCode::KEY_END.0);
    pub const INSERT: KeyCode = KeyCode(evdev::KeyCode::KEY_INSERT.0);
    pub const LEFT_META: KeyCode = KeyCode(evdev::KeyCode::KEY_LEFTMETA.0);
    pub const RIGHT_META: KeyCode = KeyCode(evdev::KeyCode::KEY_RIGHTMETA.0);

    /// Gesture name of this key, if the kernel names it
    pub fn name(self) -> Option<&'static str> {
        KEY_NAMES.by_code.get(&self.0).map(String::as_str)
    }

    /// Look a key up by gesture name (case-insensitive, a few aliases)
    pub fn from_name(name: &str) -> Option<KeyCode> {
        let lower = name.trim().to_lowercase();
        let canonical = match lower.as_str() {
            "return" => "enter",
            "escape" => "esc",
            "del" => "delete",
            "ins" => "insert",
            "pgup" => "pageup",
            "pgdn" => "pagedown",
            "." | "period" => "dot",
            "," => "comma",
            "/" => "slash",
            ";" => "semicolon",
            other => other,
        };
        KEY_NAMES.by_name.get(canonical).map(|code| KeyCode(*code))
    }

    /// Shift, Control, Alt and Meta keys on either side
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::LEFT_SHIFT
                | KeyCode::RIGHT_SHIFT
                | KeyCode::LEFT_CTRL
                | KeyCode::RIGHT_CTRL
                | KeyCode::LEFT_ALT
                | KeyCode::RIGHT_ALT
                | KeyCode::LEFT_META
                | KeyCode::RIGHT_META
        )
    }
}

impl From<evdev::KeyCode> for KeyCode {
    fn from(code: evdev::KeyCode) -> Self {
        KeyCode(code.0)
    }
}

impl From<KeyCode> for evdev::KeyCode {
    fn from(code: KeyCode) -> Self {
        evdev::KeyCode(code.0)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "key{}", self.0),
        }
    }
}

struct KeyNames {
    by_code: HashMap<u16, String>,
    by_name: HashMap<String, u16>,
}

// evdev's Debug output is the kernel constant name; buttons and unnamed
// codes are left out
static KEY_NAMES: Lazy<KeyNames> = Lazy::new(|| {
    let mut by_code = HashMap::new();
    let mut by_name = HashMap::new();
    for code in 0..=KEY_CODE_MAX {
        let constant = format!("{:?}", evdev::KeyCode(code));
        let Some(name) = constant.strip_prefix("KEY_") else {
            continue;
        };
        let name = name.to_lowercase();
        by_name.entry(name.clone()).or_insert(code);
        by_code.insert(code, name);
    }
    KeyNames { by_code, by_name }
});
