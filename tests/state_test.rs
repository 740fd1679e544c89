//! Screen reader state tests
//!
//! Runs `State` against an in-memory desktop with recording outputs, the
//! way the main loop drives it.

use nvda_linux::accessibility::{
    AccessibilityProvider, AccessibleNode, ApplicationInfo, Bounds, MemoryProvider, Role,
    StateSet,
};
use nvda_linux::braille::{BrailleCommand, BrailleDisplay, BrailleDriver, BrailleTable, Dots};
use nvda_linux::haptics::{HapticController, HapticDevice};
use nvda_linux::input::{Action, KeyCode, KeyEvent};
use nvda_linux::spatial::calibration::CalibrationStore;
use nvda_linux::spatial::player::CuePlayer;
use nvda_linux::spatial::SpatialOutput;
use nvda_linux::speech::Synth;
use nvda_linux::state::config::Config;
use nvda_linux::state::{Event, Outputs, State};
use nvda_linux::{NvdaError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Log<T> = Arc<Mutex<Vec<T>>>;

struct Recorder {
    spoken: Log<String>,
    cancels: Arc<Mutex<usize>>,
}

impl Synth for Recorder {
    fn set_rate(&mut self, _: u8) -> Result<()> {
        Ok(())
    }
    fn set_pitch(&mut self, _: u8) -> Result<()> {
        Ok(())
    }
    fn set_volume(&mut self, _: u8) -> Result<()> {
        Ok(())
    }
    fn set_voice(&mut self, _: &str) -> Result<()> {
        Ok(())
    }
    fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
    fn letter(&mut self, text: &str) -> Result<()> {
        self.speak(text)
    }
    fn cancel(&mut self) -> Result<()> {
        *self.cancels.lock().unwrap() += 1;
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recorder"
    }
}

struct FakeDisplay {
    writes: Log<Vec<Dots>>,
    disconnects: Arc<Mutex<usize>>,
}

impl BrailleDriver for FakeDisplay {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }
    fn disconnect(&mut self) -> Result<()> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }
    fn display_size(&self) -> Option<usize> {
        Some(4)
    }
    fn write_cells(&mut self, cells: &[Dots]) -> Result<()> {
        self.writes.lock().unwrap().push(cells.to_vec());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeMotor {
    pulses: Log<(u32, f32)>,
    disconnects: Arc<Mutex<usize>>,
}

impl HapticDevice for FakeMotor {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }
    fn disconnect(&mut self) -> Result<()> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }
    fn pulse(&mut self, ms: u32, intensity: f32) -> Result<()> {
        self.pulses.lock().unwrap().push((ms, intensity));
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakePlayer {
    cues: Log<usize>,
}

impl CuePlayer for FakePlayer {
    fn play(&mut self, samples: &[i16], _: u32) -> Result<()> {
        self.cues.lock().unwrap().push(samples.len());
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Provider handle the test keeps after `State` takes ownership
#[derive(Clone)]
struct SharedProvider(Arc<Mutex<MemoryProvider>>);

impl AccessibilityProvider for SharedProvider {
    fn initialize(&mut self) -> Result<()> {
        self.0.lock().unwrap().initialize()
    }
    fn focused_node(&mut self) -> Result<Option<AccessibleNode>> {
        self.0.lock().unwrap().focused_node()
    }
    fn focused_application(&mut self) -> Result<Option<ApplicationInfo>> {
        self.0.lock().unwrap().focused_application()
    }
    fn node_at_point(&mut self, x: i32, y: i32) -> Result<Option<AccessibleNode>> {
        self.0.lock().unwrap().node_at_point(x, y)
    }
    fn applications(&mut self) -> Result<Vec<ApplicationInfo>> {
        self.0.lock().unwrap().applications()
    }
    fn perform_action(&mut self, node_id: &str, action: &str) -> Result<()> {
        self.0.lock().unwrap().perform_action(node_id, action)
    }
    fn window_title(&mut self) -> Result<Option<String>> {
        self.0.lock().unwrap().window_title()
    }
    fn shutdown(&mut self) -> Result<()> {
        self.0.lock().unwrap().shutdown()
    }
    fn name(&self) -> &'static str {
        "shared"
    }
}

/// Provider whose focus queries fail while `down` is set
struct FlakyProvider {
    inner: MemoryProvider,
    down: Arc<AtomicBool>,
}

impl AccessibilityProvider for FlakyProvider {
    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }
    fn focused_node(&mut self) -> Result<Option<AccessibleNode>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(NvdaError::Accessibility("bus gone".to_string()));
        }
        self.inner.focused_node()
    }
    fn focused_application(&mut self) -> Result<Option<ApplicationInfo>> {
        self.inner.focused_application()
    }
    fn node_at_point(&mut self, x: i32, y: i32) -> Result<Option<AccessibleNode>> {
        self.inner.node_at_point(x, y)
    }
    fn applications(&mut self) -> Result<Vec<ApplicationInfo>> {
        self.inner.applications()
    }
    fn perform_action(&mut self, node_id: &str, action: &str) -> Result<()> {
        self.inner.perform_action(node_id, action)
    }
    fn window_title(&mut self) -> Result<Option<String>> {
        self.inner.window_title()
    }
    fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown()
    }
    fn name(&self) -> &'static str {
        "flaky"
    }
}

struct Harness {
    state: State,
    provider: SharedProvider,
    spoken: Log<String>,
    cells: Log<Vec<Dots>>,
    pulses: Log<(u32, f32)>,
    cues: Log<usize>,
    braille_disconnects: Arc<Mutex<usize>>,
    haptic_disconnects: Arc<Mutex<usize>>,
}

impl Harness {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    fn clear_spoken(&self) {
        self.spoken.lock().unwrap().clear();
    }

    fn focus(&self, id: &str) {
        self.provider.0.lock().unwrap().set_focus(id).unwrap();
    }

    fn press(&mut self, keys: &[KeyCode]) -> Option<Action> {
        let mut action = None;
        for key in keys {
            action = self.state.handle_key(KeyEvent::pressed(*key)).unwrap();
        }
        for key in keys.iter().rev() {
            self.state.handle_key(KeyEvent::released(*key)).unwrap();
        }
        action
    }
}

fn desktop() -> AccessibleNode {
    let shown = StateSet::VISIBLE | StateSet::SHOWING | StateSet::ENABLED;

    let mut ok = AccessibleNode::new("ok", Role::Button, "OK")
        .with_states(shown | StateSet::FOCUSABLE | StateSet::FOCUSED)
        .with_bounds(Bounds::new(100, 100, 80, 30));
    ok.actions.push("click".to_string());

    let mut url = AccessibleNode::new("url", Role::Entry, "Address")
        .with_states(shown | StateSet::FOCUSABLE)
        .with_bounds(Bounds::new(0, 0, 800, 30));
    url.text = Some("abc".to_string());

    let firefox = AccessibleNode::new("firefox", Role::Application, "Firefox").with_child(
        AccessibleNode::new("ffwin", Role::Frame, "Start Page")
            .with_states(shown)
            .with_bounds(Bounds::new(0, 0, 1920, 1080))
            .with_child(url)
            .with_child(ok),
    );

    let term = AccessibleNode::new("konsole", Role::Application, "konsole").with_child(
        AccessibleNode::new("kwin", Role::Frame, "Shell")
            .with_states(shown)
            .with_child(
                AccessibleNode::new("tty", Role::Terminal, "Terminal")
                    .with_states(shown | StateSet::FOCUSABLE),
            ),
    );

    AccessibleNode::new("desktop", Role::Desktop, "main")
        .with_child(firefox)
        .with_child(term)
}

fn harness_with(config: Config) -> Harness {
    let spoken: Log<String> = Arc::default();
    let cells: Log<Vec<Dots>> = Arc::default();
    let pulses: Log<(u32, f32)> = Arc::default();
    let cues: Log<usize> = Arc::default();
    let braille_disconnects = Arc::new(Mutex::new(0));
    let haptic_disconnects = Arc::new(Mutex::new(0));

    let mut display = BrailleDisplay::new(
        Box::new(FakeDisplay {
            writes: cells.clone(),
            disconnects: braille_disconnects.clone(),
        }),
        BrailleTable::builtin(),
        40,
    );
    display.connect().unwrap();

    let mut haptics = HapticController::new(
        Box::new(FakeMotor {
            pulses: pulses.clone(),
            disconnects: haptic_disconnects.clone(),
        }),
        0.8,
        100,
    );
    haptics.connect().unwrap();

    let outputs = Outputs {
        synth: Some(Box::new(Recorder {
            spoken: spoken.clone(),
            cancels: Arc::default(),
        })),
        braille: Some(display),
        haptics: Some(haptics),
        spatial: Some(SpatialOutput::new(
            CalibrationStore::new(),
            Box::new(FakePlayer { cues: cues.clone() }),
        )),
    };

    let provider = SharedProvider(Arc::new(Mutex::new(MemoryProvider::new(desktop()))));
    let state = State::new(config, outputs, Box::new(provider.clone())).unwrap();

    Harness {
        state,
        provider,
        spoken,
        cells,
        pulses,
        cues,
        braille_disconnects,
        haptic_disconnects,
    }
}

fn harness() -> Harness {
    harness_with(Config::defaults())
}

#[test]
fn test_focus_announced_on_every_output() {
    let mut h = harness();

    assert!(h.state.poll_focus().unwrap());
    assert_eq!(h.spoken(), vec!["Firefox browse mode", "OK button"]);
    assert_eq!(h.state.current_app(), Some("Firefox"));

    let display = h.state.outputs().braille.as_ref().unwrap();
    assert_eq!(display.text(), "OK button");
    assert_eq!(display.cells(), 4);
    assert_eq!(h.cells.lock().unwrap().last().map(|w| w.len()), Some(4));

    h.state.outputs_mut().haptics.as_mut().unwrap().wait();
    assert_eq!(h.pulses.lock().unwrap().first(), Some(&(100, 0.8)));
    assert_eq!(h.cues.lock().unwrap().len(), 1);
}

#[test]
fn test_unchanged_focus_is_quiet() {
    let mut h = harness();
    assert!(h.state.poll_focus().unwrap());
    h.clear_spoken();

    assert!(!h.state.poll_focus().unwrap());
    h.state.handle_event(Event::Tick).unwrap();
    assert!(h.spoken().is_empty());
}

#[test]
fn test_application_switch() {
    let mut h = harness();
    h.state.poll_focus().unwrap();

    h.focus("url");
    h.clear_spoken();
    h.state.poll_focus().unwrap();
    // Same application, no new announcement
    assert_eq!(h.spoken().len(), 1);
    assert!(h.spoken()[0].starts_with("Address edit"));

    h.focus("tty");
    h.clear_spoken();
    h.state.poll_focus().unwrap();
    assert_eq!(h.spoken()[0], "Konsole");
    assert_eq!(h.state.current_app(), Some("konsole"));
}

#[test]
fn test_disabled_app_module_uses_plain_name() {
    let mut config = Config::defaults();
    config.set("apps", "browsers.firefox", "false");
    let mut h = harness_with(config);

    h.state.poll_focus().unwrap();
    assert_eq!(h.spoken()[0], "Firefox");
}

#[test]
fn test_say_focus_and_spell() {
    let mut h = harness();
    h.focus("url");
    h.state.poll_focus().unwrap();
    h.clear_spoken();

    let action = h.press(&[KeyCode::INSERT, KeyCode::TAB]);
    assert_eq!(action, Some(Action::SayFocus));
    assert!(h.spoken()[0].starts_with("Address edit"));

    let action = h.press(&[KeyCode::INSERT, KeyCode::TAB]);
    assert_eq!(action, Some(Action::SpellFocus));
    assert_eq!(h.spoken().last().map(String::as_str), Some("a, b, c"));
}

#[test]
fn test_title_and_applications() {
    let mut h = harness();
    h.state.perform(Action::SayTitle).unwrap();
    h.state.perform(Action::SayApplications).unwrap();
    assert_eq!(h.spoken(), vec!["Start Page", "2 applications: Firefox, konsole"]);
}

#[test]
fn test_toggle_speech() {
    let mut h = harness();

    assert_eq!(h.press(&[KeyCode::INSERT, KeyCode::S]), Some(Action::ToggleSpeech));
    assert!(!h.state.speech_on());
    assert_eq!(h.spoken(), vec!["speech off"]);

    h.state.poll_focus().unwrap();
    assert_eq!(h.spoken().len(), 1);

    h.state.perform(Action::ToggleSpeech).unwrap();
    assert!(h.state.speech_on());
    assert_eq!(h.spoken().last().map(String::as_str), Some("speech on"));
}

#[test]
fn test_activate_and_route() {
    let mut h = harness();
    h.state.poll_focus().unwrap();

    h.press(&[KeyCode::INSERT, KeyCode::ENTER]);
    h.state
        .handle_event(Event::Braille(BrailleCommand::Route(1)))
        .unwrap();
    // Beyond the shown text: nothing happens
    h.state
        .handle_event(Event::Braille(BrailleCommand::Route(30)))
        .unwrap();

    let provider = h.provider.0.lock().unwrap();
    let done = provider.performed_actions();
    assert_eq!(done.len(), 2);
    assert_eq!(done[0], ("ok".to_string(), "click".to_string()));
}

#[test]
fn test_no_action_available() {
    let mut h = harness();
    h.focus("tty");
    h.state.perform(Action::ActivateFocus).unwrap();
    assert_eq!(h.spoken(), vec!["no action"]);
}

#[test]
fn test_braille_scrolling() {
    let mut h = harness();
    h.state.poll_focus().unwrap();

    h.press(&[KeyCode::INSERT, KeyCode::LEFT_CTRL, KeyCode::RIGHT]);
    assert_eq!(h.state.outputs().braille.as_ref().unwrap().offset(), 4);

    h.state
        .handle_event(Event::Braille(BrailleCommand::End))
        .unwrap();
    assert_eq!(h.state.outputs().braille.as_ref().unwrap().offset(), 8);

    h.press(&[KeyCode::INSERT, KeyCode::LEFT_CTRL, KeyCode::HOME]);
    assert_eq!(h.state.outputs().braille.as_ref().unwrap().offset(), 0);
}

#[test]
fn test_status_and_contrast() {
    let mut h = harness();
    h.state.perform(Action::SayStatusOfFocus).unwrap();
    assert_eq!(h.spoken(), vec!["OK button, actions click"]);

    h.state.perform(Action::ReportContrast).unwrap();
    assert_eq!(h.spoken()[1], "contrast unknown");
}

#[test]
fn test_quit_and_cleanup() {
    let mut h = harness();
    assert_eq!(h.press(&[KeyCode::INSERT, KeyCode::Q]), Some(Action::Quit));
    assert!(h.state.should_quit());

    h.state.cleanup();
    h.state.cleanup();
    assert_eq!(*h.braille_disconnects.lock().unwrap(), 1);
    assert_eq!(*h.haptic_disconnects.lock().unwrap(), 1);

    let Harness {
        state,
        braille_disconnects,
        ..
    } = h;
    drop(state);
    assert_eq!(*braille_disconnects.lock().unwrap(), 1);
}

#[test]
fn test_without_outputs() {
    let provider = MemoryProvider::new(desktop());
    let mut state = State::new(Config::defaults(), Outputs::default(), Box::new(provider)).unwrap();
    assert!(state.poll_focus().unwrap());
    state.perform(Action::StopSpeech).unwrap();
    state.perform(Action::BrailleEnd).unwrap();
}

#[test]
fn test_failing_provider_keeps_loop_alive() {
    let down = Arc::new(AtomicBool::new(true));
    let provider = FlakyProvider {
        inner: MemoryProvider::new(desktop()),
        down: down.clone(),
    };
    let mut state = State::new(Config::defaults(), Outputs::default(), Box::new(provider)).unwrap();

    assert!(!state.poll_focus().unwrap());
    assert!(!state.poll_focus().unwrap());
    state.handle_event(Event::Tick).unwrap();

    down.store(false, Ordering::SeqCst);
    assert!(state.poll_focus().unwrap());
    assert!(!state.poll_focus().unwrap());
}
