//! Output modules built from configuration
//!
//! Uses temporary directories in place of sysfs, braille table files and
//! accessibility snapshots.

use nvda_linux::accessibility::{
    AccessibilityProvider, AccessibleNode, Bounds, MemoryProvider, Role, StateSet,
};
use nvda_linux::braille;
use nvda_linux::contrast::{self, Color, WcagLevel};
use nvda_linux::haptics;
use nvda_linux::state::config::Config;
use std::fs;
use tempfile::TempDir;

fn fake_sysfs() -> TempDir {
    let dir = TempDir::new().unwrap();
    let vib = dir.path().join("timed_output/vibrator");
    fs::create_dir_all(&vib).unwrap();
    fs::write(vib.join("enable"), "0").unwrap();
    dir
}

#[test]
fn test_haptics_from_config() {
    let sysfs = fake_sysfs();
    let mut config = Config::defaults();
    config.set("haptics", "device", &sysfs.path().to_string_lossy());
    config.set("haptics", "intensity", "0.5");
    config.set("haptics", "duration", "40");

    let mut controller = haptics::create_controller(&config).unwrap();
    assert_eq!(controller.intensity(), 0.5);
    assert_eq!(controller.duration(), 40);

    controller.connect().unwrap();
    assert!(controller.play("click").unwrap());
    controller.wait();
    let enable = sysfs.path().join("timed_output/vibrator/enable");
    assert_eq!(fs::read_to_string(&enable).unwrap(), "100");

    assert!(controller.stop().unwrap());
    assert_eq!(fs::read_to_string(&enable).unwrap(), "0");
}

#[test]
fn test_haptics_duration_clamped() {
    let sysfs = fake_sysfs();
    let mut config = Config::defaults();
    config.set("haptics", "device", &sysfs.path().to_string_lossy());
    config.set("haptics", "duration", "8589934592");

    let controller = haptics::create_controller(&config).unwrap();
    assert_eq!(controller.duration(), u32::MAX);
}

#[test]
fn test_haptics_without_device() {
    let empty = TempDir::new().unwrap();
    let mut config = Config::defaults();
    config.set("haptics", "device", &empty.path().to_string_lossy());
    assert!(haptics::create_controller(&config).is_err());
}

#[test]
fn test_braille_table_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mini.tbl");
    fs::write(&path, "# test table\na 1\nb 12\nspace 0\n").unwrap();

    let mut config = Config::defaults();
    config.set("braille", "translation_table", &path.to_string_lossy());
    config.set("braille", "cells", "20");

    let display = braille::create_display(&config, None).unwrap();
    assert_eq!(display.table().name(), "mini");
    assert_eq!(display.table().translate("ab a"), vec![0b1, 0b11, 0, 0b1]);
    assert_eq!(display.cells(), 20);
    assert!(!display.is_connected());
}

#[test]
fn test_braille_bad_table() {
    let mut config = Config::defaults();
    config.set("braille", "translation_table", "/nonexistent/table.tbl");
    assert!(braille::create_display(&config, None).is_err());

    config.set("braille", "translation_table", "builtin");
    config.set("braille", "display", "telepathy");
    assert!(braille::create_display(&config, None).is_err());
}

#[test]
fn test_snapshot_round_trip() {
    let shown = StateSet::VISIBLE | StateSet::SHOWING | StateSet::ENABLED;
    let mut send = AccessibleNode::new("send", Role::Button, "Send")
        .with_states(shown | StateSet::FOCUSED)
        .with_bounds(Bounds::new(500, 20, 60, 24));
    send.actions.push("click".to_string());
    let app = AccessibleNode::new("tb", Role::Application, "Thunderbird").with_child(
        AccessibleNode::new("compose", Role::Frame, "Write: Hello")
            .with_states(shown)
            .with_bounds(Bounds::new(0, 0, 800, 600))
            .with_child(send),
    );

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("desktop.json");
    fs::write(&path, serde_json::to_string_pretty(&app).unwrap()).unwrap();

    let mut provider = MemoryProvider::load(&path).unwrap();
    provider.initialize().unwrap();
    assert_eq!(provider.focused_node().unwrap().map(|n| n.name), Some("Send".to_string()));
    assert_eq!(provider.window_title().unwrap().as_deref(), Some("Write: Hello"));
    assert_eq!(
        provider.node_at_point(510, 30).unwrap().map(|n| n.id),
        Some("send".to_string())
    );
    assert!(provider.find_application("THUNDERBIRD").unwrap().is_some());

    provider.perform_action("send", "click").unwrap();
    assert!(provider.perform_action("send", "expand").is_err());
    assert_eq!(provider.performed_actions().len(), 1);
}

#[test]
fn test_bad_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(MemoryProvider::load(&path).is_err());
    assert!(MemoryProvider::load(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_contrast_levels() {
    let black = Color::new(0, 0, 0);
    let white = Color::new(255, 255, 255);
    assert!(contrast::is_accessible(black, white, WcagLevel::AAA));

    let grey = Color::parse("#777777").unwrap();
    assert!(!contrast::is_accessible(grey, white, WcagLevel::AAA));
    assert!(Color::parse("not a color").is_err());
}
