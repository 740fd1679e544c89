//! Gesture bindings for screen reader commands
//!
//! Defaults follow NVDA's desktop layout. The `[gestures]` config section
//! adds or replaces bindings (`nvda+t = say_title`); binding a gesture to
//! `none` removes it.

use super::gesture::Gesture;
use crate::state::config::Config;
use crate::{NvdaError, Result};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// A screen reader command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SayFocus,
    SpellFocus,
    SayTitle,
    SayApplications,
    SayStatusOfFocus,
    ReportContrast,
    ToggleSpeech,
    StopSpeech,
    BrailleScrollLeft,
    BrailleScrollRight,
    BrailleHome,
    BrailleEnd,
    ActivateFocus,
    Quit,
}

const ACTION_NAMES: &[(Action, &str)] = &[
    (Action::SayFocus, "say_focus"),
    (Action::SpellFocus, "spell_focus"),
    (Action::SayTitle, "say_title"),
    (Action::SayApplications, "say_applications"),
    (Action::SayStatusOfFocus, "say_status_of_focus"),
    (Action::ReportContrast, "report_contrast"),
    (Action::ToggleSpeech, "toggle_speech"),
    (Action::StopSpeech, "stop_speech"),
    (Action::BrailleScrollLeft, "braille_scroll_left"),
    (Action::BrailleScrollRight, "braille_scroll_right"),
    (Action::BrailleHome, "braille_home"),
    (Action::BrailleEnd, "braille_end"),
    (Action::ActivateFocus, "activate_focus"),
    (Action::Quit, "quit"),
];

impl Action {
    pub fn name(self) -> &'static str {
        ACTION_NAMES
            .iter()
            .find(|(a, _)| *a == self)
            .map(|(_, n)| *n)
            .unwrap_or("unknown")
    }

    /// What pressing the gesture twice quickly does instead
    pub fn double_press(self) -> Option<Action> {
        match self {
            Action::SayFocus => Some(Action::SpellFocus),
            _ => None,
        }
    }
}

impl FromStr for Action {
    type Err = NvdaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        ACTION_NAMES
            .iter()
            .find(|(_, n)| *n == wanted)
            .map(|(a, _)| *a)
            .ok_or_else(|| NvdaError::Input(format!("Unknown action: {}", s)))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bound action and its user-facing description
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub action: Action,
    pub description: String,
}

const DEFAULT_BINDINGS: &[(&str, Action, &str)] = &[
    ("nvda+tab", Action::SayFocus, "Report the focused object, twice to spell it"),
    ("nvda+t", Action::SayTitle, "Report the title of the active window"),
    ("nvda+shift+a", Action::SayApplications, "List running applications"),
    ("nvda+i", Action::SayStatusOfFocus, "Report details of the focused object"),
    ("nvda+shift+c", Action::ReportContrast, "Report text contrast of the focused object"),
    ("nvda+s", Action::ToggleSpeech, "Turn speech on or off"),
    ("nvda+shift+s", Action::StopSpeech, "Stop speaking"),
    ("nvda+control+left", Action::BrailleScrollLeft, "Scroll the braille display back"),
    ("nvda+control+right", Action::BrailleScrollRight, "Scroll the braille display forward"),
    ("nvda+control+home", Action::BrailleHome, "Move the braille display to the start"),
    ("nvda+control+end", Action::BrailleEnd, "Move the braille display to the end"),
    ("nvda+enter", Action::ActivateFocus, "Activate the focused object"),
    ("nvda+q", Action::Quit, "Quit NVDA-Linux"),
];

/// Gesture to action table with double-press detection
pub struct Keymap {
    bindings: HashMap<Gesture, Binding>,

    /// Last gesture resolved and when
    last: Option<(Gesture, Instant)>,

    /// Window for a second press to count as a double press
    double_press_timeout: Duration,
}

impl Keymap {
    /// Empty keymap
    pub fn new(double_press_timeout: Duration) -> Self {
        Self {
            bindings: HashMap::new(),
            last: None,
            double_press_timeout,
        }
    }

    /// Built-in bindings
    pub fn with_defaults(double_press_timeout: Duration) -> Self {
        let mut map = Self::new(double_press_timeout);
        for (gesture, action, description) in DEFAULT_BINDINGS {
            match gesture.parse::<Gesture>() {
                Ok(g) => map.register(g, *action, description),
                Err(e) => warn!("Bad default gesture {}: {}", gesture, e),
            }
        }
        map
    }

    /// Defaults overlaid with the `[gestures]` section
    pub fn from_config(config: &Config) -> Self {
        let mut map =
            Self::with_defaults(Duration::from_millis(config.double_press_timeout()));
        let overrides = config.section_entries("gestures");
        for (gesture, action) in &overrides {
            if let Err(e) = map.apply_override(gesture, action) {
                warn!("Ignoring gesture binding {} = {}: {}", gesture, action, e);
            }
        }
        debug!(
            "Keymap has {} bindings ({} from config)",
            map.len(),
            overrides.len()
        );
        map
    }

    fn apply_override(&mut self, gesture: &str, action: &str) -> Result<()> {
        let gesture: Gesture = gesture.parse()?;
        let action = action.trim();
        if action.is_empty() || action.eq_ignore_ascii_case("none") {
            self.unregister(&gesture);
            return Ok(());
        }
        let action: Action = action.parse()?;
        let description = self
            .describe_action(action)
            .unwrap_or_else(|| action.name().replace('_', " "));
        self.register(gesture, action, &description);
        Ok(())
    }

    // Description of the default binding for an action
    fn describe_action(&self, action: Action) -> Option<String> {
        DEFAULT_BINDINGS
            .iter()
            .find(|(_, a, _)| *a == action)
            .map(|(_, _, d)| d.to_string())
    }

    pub fn register(&mut self, gesture: Gesture, action: Action, description: &str) {
        self.bindings.insert(
            gesture,
            Binding {
                action,
                description: description.to_string(),
            },
        );
    }

    pub fn unregister(&mut self, gesture: &Gesture) -> Option<Binding> {
        self.bindings.remove(gesture)
    }

    pub fn lookup(&self, gesture: &Gesture) -> Option<&Binding> {
        self.bindings.get(gesture)
    }

    pub fn describe(&self, gesture: &Gesture) -> Option<&str> {
        self.lookup(gesture).map(|b| b.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Every binding as (gesture, action), sorted by gesture text
    pub fn bindings(&self) -> Vec<(String, Action)> {
        let mut all: Vec<_> = self
            .bindings
            .iter()
            .map(|(g, b)| (g.to_string(), b.action))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn is_repeat(&self, gesture: &Gesture, now: Instant) -> bool {
        match self.last {
            Some((last, at)) if last == *gesture => {
                now.saturating_duration_since(at) < self.double_press_timeout
            }
            _ => false,
        }
    }

    /// Action for a gesture performed at `now`
    ///
    /// A second press inside the double-press window resolves to the
    /// action's double-press variant, and the press after that starts over.
    pub fn resolve(&mut self, gesture: Gesture, now: Instant) -> Option<Action> {
        let Some(action) = self.bindings.get(&gesture).map(|b| b.action) else {
            self.last = None;
            return None;
        };

        if self.is_repeat(&gesture, now) {
            if let Some(double) = action.double_press() {
                debug!("Double press of {}: {}", gesture, double);
                self.last = None;
                return Some(double);
            }
        }

        trace!("Gesture {} -> {}", gesture, action);
        self.last = Some((gesture, now));
        Some(action)
    }
}
