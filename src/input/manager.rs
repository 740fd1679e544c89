//! Dispatch of key events to registered handlers

use super::event::{KeyEvent, KeyEventKind};
use super::gesture::{Gesture, KeyState, Modifiers};
use crate::Result;
use log::{debug, error, trace};
use std::collections::HashMap;

/// Called for every non-modifier key press
pub type KeyHandler = Box<dyn FnMut(&KeyEvent) -> Result<()> + Send>;

/// Called when a modifier goes down (`true`) or up (`false`)
pub type ModifierHandler = Box<dyn FnMut(Modifiers, bool) -> Result<()> + Send>;

/// Called when its gesture is performed
pub type GestureHandler = Box<dyn FnMut(&Gesture) -> Result<()> + Send>;

/// Tracks keyboard state and fans events out to handlers
///
/// A failing handler is logged; the remaining handlers still run.
pub struct InputManager {
    state: KeyState,
    key_handlers: Vec<KeyHandler>,
    modifier_handlers: Vec<ModifierHandler>,
    gesture_handlers: HashMap<Gesture, Vec<GestureHandler>>,
}

impl InputManager {
    pub fn new(state: KeyState) -> Self {
        Self {
            state,
            key_handlers: Vec::new(),
            modifier_handlers: Vec::new(),
            gesture_handlers: HashMap::new(),
        }
    }

    pub fn key_state(&self) -> &KeyState {
        &self.state
    }

    pub fn register_key_handler(&mut self, handler: KeyHandler) {
        self.key_handlers.push(handler);
    }

    pub fn register_modifier_handler(&mut self, handler: ModifierHandler) {
        self.modifier_handlers.push(handler);
    }

    pub fn register_gesture_handler(&mut self, gesture: Gesture, handler: GestureHandler) {
        debug!("Gesture handler registered for {}", gesture);
        self.gesture_handlers.entry(gesture).or_default().push(handler);
    }

    /// Drop every handler
    pub fn clear(&mut self) {
        self.key_handlers.clear();
        self.modifier_handlers.clear();
        self.gesture_handlers.clear();
    }

    /// Feed one event
    ///
    /// Returns the gesture formed by a non-modifier key press.
    pub fn handle_event(&mut self, event: &KeyEvent) -> Option<Gesture> {
        let modifier = self.state.modifier_of(event.code);
        self.state.update(event);

        if let Some(modifier) = modifier {
            if event.state != KeyEventKind::Repeat {
                let down = event.state == KeyEventKind::Pressed;
                trace!("Modifier {:?} {}", modifier, if down { "down" } else { "up" });
                for handler in self.modifier_handlers.iter_mut() {
                    if let Err(e) = handler(modifier, down) {
                        error!("Modifier handler failed: {}", e);
                    }
                }
            }
            return None;
        }

        if event.state != KeyEventKind::Pressed {
            return None;
        }

        for handler in self.key_handlers.iter_mut() {
            if let Err(e) = handler(event) {
                error!("Key handler failed: {}", e);
            }
        }

        let gesture = self.state.gesture_for(event.code);
        if let Some(handlers) = self.gesture_handlers.get_mut(&gesture) {
            debug!("Gesture {}", gesture);
            for handler in handlers.iter_mut() {
                if let Err(e) = handler(&gesture) {
                    error!("Gesture handler for {} failed: {}", gesture, e);
                }
            }
        }
        Some(gesture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keys::KeyCode;
    use crate::NvdaError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn manager() -> InputManager {
        InputManager::new(KeyState::new(
            vec![KeyCode::INSERT],
            Duration::from_millis(500),
            30,
        ))
    }

    #[test]
    fn test_gesture_resolution() {
        let mut m = manager();
        assert_eq!(m.handle_event(&KeyEvent::pressed(KeyCode::INSERT)), None);
        let g = m.handle_event(&KeyEvent::pressed(KeyCode::T));
        assert_eq!(g.map(|g| g.to_string()).as_deref(), Some("nvda+t"));
        assert_eq!(m.handle_event(&KeyEvent::released(KeyCode::T)), None);
    }

    #[test]
    fn test_handlers_called() {
        let mut m = manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        m.register_key_handler(Box::new(move |e| {
            l.lock().unwrap().push(format!("key {}", e.code));
            Ok(())
        }));
        let l = log.clone();
        m.register_modifier_handler(Box::new(move |mods, down| {
            l.lock().unwrap().push(format!("mod {:?} {}", mods.names(), down));
            Ok(())
        }));
        let l = log.clone();
        m.register_gesture_handler(
            "nvda+t".parse().unwrap(),
            Box::new(move |g| {
                l.lock().unwrap().push(format!("gesture {}", g));
                Ok(())
            }),
        );

        m.handle_event(&KeyEvent::pressed(KeyCode::INSERT));
        m.handle_event(&KeyEvent::pressed(KeyCode::T));
        m.handle_event(&KeyEvent::released(KeyCode::INSERT));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "mod [\"nvda\"] true",
                "key t",
                "gesture nvda+t",
                "mod [\"nvda\"] false",
            ]
        );
    }

    #[test]
    fn test_failing_handler_isolated() {
        let mut m = manager();
        let calls = Arc::new(Mutex::new(0));
        m.register_key_handler(Box::new(|_| Err(NvdaError::Input("boom".into()))));
        let c = calls.clone();
        m.register_key_handler(Box::new(move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        }));

        m.handle_event(&KeyEvent::pressed(KeyCode::A));
        assert_eq!(*calls.lock().unwrap(), 1);

        m.clear();
        m.handle_event(&KeyEvent::pressed(KeyCode::A));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
