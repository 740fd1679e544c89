//! Screen reader state
//!
//! `State` owns the configuration, the accessibility provider and every
//! output module. The main loop feeds it events; it decides what to say,
//! show, play and buzz.

pub mod config;

use crate::accessibility::{AccessibilityProvider, AccessibleNode, Role};
use crate::apps::AppRegistry;
use crate::braille::{self, BrailleCommand, BrailleDisplay, CommandSink};
use crate::contrast::{self, Color};
use crate::haptics::{self, HapticController};
use crate::input::{Action, InputManager, KeyEvent, KeyState, Keymap};
use crate::spatial::{self, SpatialOutput};
use crate::speech::{create_synth, process_symbols, spelling, Synth};
use crate::Result;
use config::Config;
use log::{debug, error, info, warn};
use std::time::Instant;

/// Haptic pattern played on every focus change
const FOCUS_PATTERN: &str = "click";

/// Something for the main loop to process
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Key(KeyEvent),
    Braille(BrailleCommand),
    /// Nothing arrived in time; poll the focus
    Tick,
}

/// Output modules; any of them may be missing
#[derive(Default)]
pub struct Outputs {
    pub synth: Option<Box<dyn Synth>>,
    pub braille: Option<BrailleDisplay>,
    pub haptics: Option<HapticController>,
    pub spatial: Option<SpatialOutput>,
}

impl Outputs {
    /// Create every output the configuration enables
    ///
    /// A module that fails to start is logged and left out.
    pub fn from_config(
        config: &Config,
        no_speech: bool,
        no_braille: bool,
        braille_sink: Option<CommandSink>,
    ) -> Self {
        let mut outputs = Outputs::default();

        if config.speech_enabled() && !no_speech {
            match create_synth(&config.speech_engine()) {
                Ok(mut synth) => {
                    configure_synth(synth.as_mut(), config);
                    info!("Speech output: {}", synth.name());
                    outputs.synth = Some(synth);
                }
                Err(e) => error!("Speech unavailable: {}", e),
            }
        }

        if config.braille_enabled() && !no_braille && config.platform_feature("linux", "brltty") {
            match braille::create_display(config, braille_sink) {
                Ok(mut display) => match display.connect() {
                    Ok(()) => outputs.braille = Some(display),
                    Err(e) => warn!("Braille display not connected: {}", e),
                },
                Err(e) => warn!("Braille unavailable: {}", e),
            }
        }

        if config.haptics_enabled() {
            match haptics::create_controller(config) {
                Ok(mut controller) => match controller.connect() {
                    Ok(()) => outputs.haptics = Some(controller),
                    Err(e) => warn!("Haptic device not connected: {}", e),
                },
                Err(e) => warn!("Haptics unavailable: {}", e),
            }
        }

        if config.spatial_audio_enabled() && config.sound_enabled() {
            match spatial::create_output(config) {
                Ok(output) => outputs.spatial = Some(output),
                Err(e) => warn!("Spatial audio unavailable: {}", e),
            }
        }

        outputs
    }
}

fn configure_synth(synth: &mut dyn Synth, config: &Config) {
    if let Some(rate) = config.rate() {
        if let Err(e) = synth.set_rate(rate) {
            warn!("Could not set speech rate: {}", e);
        }
    }
    if let Some(pitch) = config.pitch() {
        if let Err(e) = synth.set_pitch(pitch) {
            warn!("Could not set speech pitch: {}", e);
        }
    }
    if let Some(volume) = config.volume() {
        if let Err(e) = synth.set_volume(volume) {
            warn!("Could not set speech volume: {}", e);
        }
    }
    if let Err(e) = synth.set_voice(&config.voice()) {
        warn!("Could not set voice: {}", e);
    }
}

/// Spoken description of a node: name, role, states, description
pub fn describe_node(node: &AccessibleNode) -> String {
    let checkable = matches!(
        node.role,
        Role::CheckBox | Role::RadioButton | Role::CheckMenuItem
    );

    let mut parts: Vec<String> = Vec::new();
    if !node.name.is_empty() {
        parts.push(node.name.clone());
    }
    let role = node.role.spoken();
    if !role.is_empty() {
        parts.push(role.to_string());
    }
    parts.extend(node.states.spoken(checkable).into_iter().map(String::from));
    if !node.is_enabled() {
        parts.push("unavailable".to_string());
    }
    if !node.description.is_empty() && node.description != node.name {
        parts.push(node.description.clone());
    }
    parts.join(" ")
}

/// Main application state for the screen reader
pub struct State {
    pub config: Config,
    outputs: Outputs,
    provider: Box<dyn AccessibilityProvider>,
    pub input: InputManager,
    pub keymap: Keymap,
    pub apps: AppRegistry,

    /// Speech switched on by the user (ToggleSpeech)
    speech_on: bool,

    /// Id of the node last announced
    focus_id: Option<String>,

    /// Application owning the focus, by name
    current_app: Option<String>,

    /// Last focus query failed; further failures are not logged
    provider_failing: bool,

    quit: bool,
    cleaned_up: bool,
}

impl State {
    /// Build the state and initialize the provider
    pub fn new(
        config: Config,
        outputs: Outputs,
        mut provider: Box<dyn AccessibilityProvider>,
    ) -> Result<Self> {
        provider.initialize()?;
        info!("Accessibility provider: {}", provider.name());

        let input = InputManager::new(KeyState::from_config(&config));
        let keymap = Keymap::from_config(&config);
        let mut apps = AppRegistry::new();
        apps.initialize(&config);

        Ok(Self {
            config,
            outputs,
            provider,
            input,
            keymap,
            apps,
            speech_on: true,
            focus_id: None,
            current_app: None,
            provider_failing: false,
            quit: false,
            cleaned_up: false,
        })
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Outputs {
        &mut self.outputs
    }

    pub fn speech_on(&self) -> bool {
        self.speech_on
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn current_app(&self) -> Option<&str> {
        self.current_app.as_deref()
    }

    /// Speak text after punctuation processing
    pub fn speak(&mut self, text: &str) {
        if !self.speech_on || text.is_empty() {
            return;
        }
        let Some(synth) = self.outputs.synth.as_mut() else {
            debug!("No synth, dropping: {}", text);
            return;
        };
        let spoken = process_symbols(text, self.config.punctuation_level(), &self.config.symbols);
        if let Err(e) = synth.speak(&spoken) {
            error!("Speech failed: {}", e);
        }
    }

    /// Silence speech
    pub fn cancel_speech(&mut self) {
        if let Some(synth) = self.outputs.synth.as_mut() {
            if let Err(e) = synth.cancel() {
                error!("Cancel failed: {}", e);
            }
        }
    }

    /// Announce a node on every output
    pub fn announce_focus(&mut self, node: &AccessibleNode) {
        let text = describe_node(node);
        debug!("Focus: {}", text);
        self.speak(&text);

        if let Some(display) = self.outputs.braille.as_mut() {
            if let Err(e) = display.show_text(&text) {
                error!("Braille output failed: {}", e);
            }
        }
        if let Some(controller) = self.outputs.haptics.as_mut() {
            if let Err(e) = controller.play(FOCUS_PATTERN) {
                error!("Haptic output failed: {}", e);
            }
        }
        if let (Some(output), Some(bounds)) = (self.outputs.spatial.as_mut(), node.bounds.as_ref()) {
            if let Err(e) = output.play_for_bounds(bounds) {
                error!("Spatial cue failed: {}", e);
            }
        }
    }

    /// Check the focus and announce it when it moved
    ///
    /// Returns true when something was announced. A provider error is
    /// logged once and then ignored until the provider answers again.
    pub fn poll_focus(&mut self) -> Result<bool> {
        let focused = match self.provider.focused_node() {
            Ok(focused) => {
                if self.provider_failing {
                    info!("Accessibility provider {} is answering again", self.provider.name());
                    self.provider_failing = false;
                }
                focused
            }
            Err(e) => {
                if !self.provider_failing {
                    warn!("Focus query failed: {}", e);
                    self.provider_failing = true;
                }
                return Ok(false);
            }
        };
        let Some(node) = focused else {
            return Ok(false);
        };
        if self.focus_id.as_deref() == Some(node.id.as_str()) {
            return Ok(false);
        }

        match self.provider.focused_application() {
            Ok(Some(app)) if self.current_app.as_deref() != Some(app.name.as_str()) => {
                self.announce_application(&app.name);
                self.current_app = Some(app.name);
            }
            Ok(_) => {}
            Err(e) => warn!("Focused application unknown: {}", e),
        }

        self.focus_id = Some(node.id.clone());
        self.announce_focus(&node);
        Ok(true)
    }

    fn announce_application(&mut self, name: &str) {
        let announcement = match self.apps.module_for(name) {
            Some(module) => {
                debug!("App module {} for {}", module.id, name);
                if module.browse_mode {
                    format!("{} browse mode", module.display_name)
                } else {
                    module.display_name.to_string()
                }
            }
            None => name.to_string(),
        };
        self.speak(&announcement);
    }

    /// Run a screen reader command
    pub fn perform(&mut self, action: Action) -> Result<()> {
        debug!("Action: {}", action);
        match action {
            Action::SayFocus => match self.provider.focused_node()? {
                Some(node) => self.announce_focus(&node),
                None => self.speak("no focus"),
            },
            Action::SpellFocus => match self.provider.focused_node()? {
                Some(node) => {
                    let text = match node.get_text() {
                        "" => node.name.clone(),
                        text => text.to_string(),
                    };
                    if text.is_empty() {
                        self.speak("blank");
                    } else {
                        self.speak(&spelling::spell(&text).join(", "));
                    }
                }
                None => self.speak("no focus"),
            },
            Action::SayTitle => match self.provider.window_title()? {
                Some(title) if !title.is_empty() => self.speak(&title),
                _ => self.speak("no title"),
            },
            Action::SayApplications => {
                let apps = self.provider.applications()?;
                let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
                let text = match names.len() {
                    0 => "no applications".to_string(),
                    1 => format!("1 application: {}", names[0]),
                    n => format!("{} applications: {}", n, names.join(", ")),
                };
                self.speak(&text);
            }
            Action::SayStatusOfFocus => match self.provider.focused_node()? {
                Some(node) => {
                    let info = node.element_info();
                    debug!("Element info: {}", info);
                    let mut text = describe_node(&node);
                    let children = node.children.len();
                    if children > 0 {
                        text.push_str(&format!(", {} children", children));
                    }
                    if !node.actions.is_empty() {
                        text.push_str(&format!(", actions {}", node.actions.join(" ")));
                    }
                    self.speak(&text);
                }
                None => self.speak("no focus"),
            },
            Action::ReportContrast => {
                let text = match self.provider.focused_node()? {
                    Some(node) => contrast_report(&node),
                    None => "no focus".to_string(),
                };
                self.speak(&text);
            }
            Action::ToggleSpeech => {
                if self.speech_on {
                    self.speak("speech off");
                    self.speech_on = false;
                } else {
                    self.speech_on = true;
                    self.speak("speech on");
                }
            }
            Action::StopSpeech => {
                self.cancel_speech();
                if let Some(controller) = self.outputs.haptics.as_mut() {
                    controller.stop()?;
                }
                if let Some(output) = self.outputs.spatial.as_mut() {
                    output.stop()?;
                }
            }
            Action::BrailleScrollLeft => self.braille(BrailleCommand::ScrollLeft)?,
            Action::BrailleScrollRight => self.braille(BrailleCommand::ScrollRight)?,
            Action::BrailleHome => self.braille(BrailleCommand::Home)?,
            Action::BrailleEnd => self.braille(BrailleCommand::End)?,
            Action::ActivateFocus => match self.provider.focused_node()? {
                Some(node) => match node.actions().first() {
                    Some(name) => {
                        let name = name.clone();
                        self.provider.perform_action(&node.id, &name)?;
                    }
                    None => self.speak("no action"),
                },
                None => self.speak("no focus"),
            },
            Action::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
        Ok(())
    }

    fn braille(&mut self, cmd: BrailleCommand) -> Result<()> {
        if let Some(display) = self.outputs.braille.as_mut() {
            display.apply(cmd)?;
        }
        Ok(())
    }

    /// A key event from the listener
    ///
    /// Every key press silences speech. Bound gestures run their action;
    /// the action is returned.
    pub fn handle_key(&mut self, event: KeyEvent) -> Result<Option<Action>> {
        if event.is_press() {
            self.cancel_speech();
        }
        let Some(gesture) = self.input.handle_event(&event) else {
            return Ok(None);
        };
        let Some(action) = self.keymap.resolve(gesture, Instant::now()) else {
            return Ok(None);
        };
        self.perform(action)?;
        Ok(Some(action))
    }

    /// A command from the braille display's keys
    ///
    /// Routing keys over shown text activate the focused object.
    pub fn handle_braille(&mut self, cmd: BrailleCommand) -> Result<()> {
        match cmd {
            BrailleCommand::Route(cell) => {
                let on_text = self
                    .outputs
                    .braille
                    .as_ref()
                    .and_then(|d| d.route_to_position(cell))
                    .is_some();
                if on_text {
                    self.perform(Action::ActivateFocus)?;
                }
                Ok(())
            }
            other => self.braille(other),
        }
    }

    /// Dispatch one main loop event
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) => self.handle_key(key).map(|_| ()),
            Event::Braille(cmd) => self.handle_braille(cmd),
            Event::Tick => self.poll_focus().map(|_| ()),
        }
    }

    /// Stop every output and release the provider; safe to call twice
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        info!("Cleaning up");

        self.cancel_speech();
        if let Some(display) = self.outputs.braille.as_mut() {
            if let Err(e) = display.disconnect() {
                warn!("Braille disconnect failed: {}", e);
            }
        }
        if let Some(controller) = self.outputs.haptics.as_mut() {
            if let Err(e) = controller.disconnect() {
                warn!("Haptic disconnect failed: {}", e);
            }
        }
        if let Some(output) = self.outputs.spatial.as_mut() {
            if let Err(e) = output.stop() {
                warn!("Spatial stop failed: {}", e);
            }
        }
        if let Err(e) = self.provider.shutdown() {
            warn!("Provider shutdown failed: {}", e);
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Contrast of a node's text from its `fg-color`/`bg-color` attributes
fn contrast_report(node: &AccessibleNode) -> String {
    let color = |key: &str| node.attributes.get(key).map(|v| Color::parse(v));
    match (color("fg-color"), color("bg-color")) {
        (Some(Ok(fg)), Some(Ok(bg))) => contrast::describe(fg, bg),
        (Some(Err(e)), _) | (_, Some(Err(e))) => {
            warn!("Unreadable color attribute: {}", e);
            "contrast unknown".to_string()
        }
        _ => "contrast unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::StateSet;

    #[test]
    fn test_describe_node() {
        let node = AccessibleNode::new("b", Role::Button, "OK")
            .with_states(StateSet::ENABLED | StateSet::FOCUSED);
        assert_eq!(describe_node(&node), "OK button");

        let node = AccessibleNode::new("c", Role::CheckBox, "Bold")
            .with_states(StateSet::SENSITIVE);
        assert_eq!(describe_node(&node), "Bold check box not checked");
    }

    #[test]
    fn test_describe_unavailable() {
        let mut node = AccessibleNode::new("b", Role::Button, "Send");
        node.description = "Send the message".to_string();
        assert_eq!(describe_node(&node), "Send button unavailable Send the message");
    }

    #[test]
    fn test_contrast_report() {
        let mut node = AccessibleNode::new("t", Role::Text, "Body");
        assert_eq!(contrast_report(&node), "contrast unknown");
        node.attributes.insert("fg-color".into(), "0,0,0".into());
        node.attributes.insert("bg-color".into(), "255,255,255".into());
        assert!(contrast_report(&node).contains("21"));
    }
}
