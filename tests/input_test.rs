//! Input system tests
//!
//! Drives the input manager and keymap with synthetic key events the way
//! the listener thread would.

use nvda_linux::input::{
    Action, Gesture, InputManager, KeyCode, KeyEvent, KeyState, Keymap, Modifiers,
};
use nvda_linux::state::config::Config;
use std::time::{Duration, Instant};

fn press(manager: &mut InputManager, keys: &[KeyCode]) -> Option<Gesture> {
    let mut gesture = None;
    for key in keys {
        gesture = manager.handle_event(&KeyEvent::pressed(*key));
    }
    for key in keys.iter().rev() {
        manager.handle_event(&KeyEvent::released(*key));
    }
    gesture
}

#[test]
fn test_nvda_key_from_config() {
    let mut config = Config::defaults();
    config.set("keyboard", "insert_as_modifier", "false");
    let mut manager = InputManager::new(KeyState::from_config(&config));

    let g = press(&mut manager, &[KeyCode::CAPS_LOCK, KeyCode::T]).unwrap();
    assert_eq!(g.modifiers, Modifiers::NVDA);

    // Insert is now an ordinary key
    let g = press(&mut manager, &[KeyCode::INSERT]).unwrap();
    assert_eq!(g.to_string(), "insert");
}

#[test]
fn test_gesture_to_action() {
    let config = Config::defaults();
    let mut manager = InputManager::new(KeyState::from_config(&config));
    let mut keymap = Keymap::from_config(&config);

    let g = press(&mut manager, &[KeyCode::INSERT, KeyCode::LEFT_SHIFT, KeyCode::A]).unwrap();
    assert_eq!(g.to_string(), "nvda+shift+a");
    assert_eq!(keymap.resolve(g, Instant::now()), Some(Action::SayApplications));

    let g = press(&mut manager, &[KeyCode::A]).unwrap();
    assert_eq!(keymap.resolve(g, Instant::now()), None);
}

#[test]
fn test_double_press_spells() {
    let config = Config::defaults();
    let mut manager = InputManager::new(KeyState::from_config(&config));
    let mut keymap = Keymap::from_config(&config);
    let t0 = Instant::now();

    let g = press(&mut manager, &[KeyCode::INSERT, KeyCode::TAB]).unwrap();
    assert_eq!(keymap.resolve(g, t0), Some(Action::SayFocus));
    let g = press(&mut manager, &[KeyCode::INSERT, KeyCode::TAB]).unwrap();
    assert_eq!(
        keymap.resolve(g, t0 + Duration::from_millis(250)),
        Some(Action::SpellFocus)
    );
}

#[test]
fn test_double_press_timeout_from_config() {
    let mut config = Config::defaults();
    config.set("keyboard", "double_press_timeout", "100");
    let mut keymap = Keymap::from_config(&config);
    let g: Gesture = "nvda+tab".parse().unwrap();
    let t0 = Instant::now();

    keymap.resolve(g, t0);
    assert_eq!(
        keymap.resolve(g, t0 + Duration::from_millis(250)),
        Some(Action::SayFocus)
    );
}

#[test]
fn test_user_gestures() {
    let mut config = Config::defaults();
    config.set("gestures", "nvda+shift+t", "say_title");
    config.set("gestures", "nvda+t", "none");
    let keymap = Keymap::from_config(&config);

    let custom: Gesture = "nvda+shift+t".parse().unwrap();
    assert_eq!(keymap.lookup(&custom).map(|b| b.action), Some(Action::SayTitle));
    assert!(keymap.describe(&custom).is_some());
    assert!(keymap.lookup(&"nvda+t".parse().unwrap()).is_none());
}

#[test]
fn test_repeat_events_do_not_form_gestures() {
    let config = Config::defaults();
    let mut manager = InputManager::new(KeyState::from_config(&config));
    manager.handle_event(&KeyEvent::pressed(KeyCode::A));
    let repeat = KeyEvent {
        code: KeyCode::A,
        state: nvda_linux::input::KeyEventKind::Repeat,
    };
    assert_eq!(manager.handle_event(&repeat), None);
    assert!(manager.key_state().is_pressed(KeyCode::A));
}
