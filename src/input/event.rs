//! Key events
//!
//! Only `EV_KEY` records matter to the screen reader. Their value is 0 for
//! release, 1 for press and 2 for autorepeat.

use super::keys::KeyCode;
use evdev::{EventType, InputEvent};

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Pressed,
    Released,
    /// Autorepeat while held
    Repeat,
}

/// A decoded key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub state: KeyEventKind,
}

impl KeyEvent {
    pub fn pressed(code: KeyCode) -> Self {
        Self {
            code,
            state: KeyEventKind::Pressed,
        }
    }

    pub fn released(code: KeyCode) -> Self {
        Self {
            code,
            state: KeyEventKind::Released,
        }
    }

    pub fn is_press(&self) -> bool {
        self.state == KeyEventKind::Pressed
    }

    /// Key event from an event's type, code and value; `None` for sync,
    /// relative, misc and other event types
    pub fn from_parts(kind: EventType, code: u16, value: i32) -> Option<Self> {
        if kind != EventType::KEY {
            return None;
        }
        let state = match value {
            0 => KeyEventKind::Released,
            1 => KeyEventKind::Pressed,
            2 => KeyEventKind::Repeat,
            _ => return None,
        };
        Some(Self {
            code: KeyCode(code),
            state,
        })
    }

    /// The key event carried by an evdev record
    pub fn from_input(event: &InputEvent) -> Option<Self> {
        Self::from_parts(event.event_type(), event.code(), event.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values() {
        assert_eq!(
            KeyEvent::from_parts(EventType::KEY, 30, 1),
            Some(KeyEvent::pressed(KeyCode::A))
        );
        assert_eq!(
            KeyEvent::from_parts(EventType::KEY, 30, 0),
            Some(KeyEvent::released(KeyCode::A))
        );
        assert_eq!(
            KeyEvent::from_parts(EventType::KEY, 30, 2).map(|e| e.state),
            Some(KeyEventKind::Repeat)
        );
        assert_eq!(KeyEvent::from_parts(EventType::KEY, 30, 7), None);
    }

    #[test]
    fn test_non_key_events_ignored() {
        // EV_SYN and EV_MSC surround every key event
        assert_eq!(KeyEvent::from_parts(EventType::SYNCHRONIZATION, 0, 0), None);
        assert_eq!(KeyEvent::from_parts(EventType::MISC, 4, 458_756), None);
    }
}
