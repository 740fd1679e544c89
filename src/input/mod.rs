//! Keyboard input
//!
//! Key events are read straight from the evdev keyboards on a listener
//! thread, folded into gestures by the `InputManager` and mapped to screen
//! reader actions by the `Keymap`.

pub mod device;
pub mod event;
pub mod gesture;
pub mod keymap;
pub mod keys;
pub mod listener;
pub mod manager;

pub use device::{discover_keyboards, InputDevice, KeySource};
pub use event::{KeyEvent, KeyEventKind};
pub use gesture::{Gesture, KeyState, Modifiers};
pub use keymap::{Action, Binding, Keymap};
pub use keys::KeyCode;
pub use listener::{InputListener, KeySink};
pub use manager::InputManager;
