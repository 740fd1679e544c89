//! Configuration management
//!
//! Settings live in an INI file (`~/.config/nvda_linux/config.ini`). Nested
//! options are flattened into dotted keys inside their section, e.g.
//! `[platforms] linux.atspi = true`.

use crate::platform::Platform;
use crate::speech::PunctuationLevel;
use crate::{NvdaError, Result};
use ini::Ini;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default settings, section by section
const DEFAULTS: &[(&str, &[(&str, &str)])] = &[
    (
        "general",
        &[
            ("language", "en"),
            ("startup_sound", "true"),
            ("debug_mode", "false"),
            ("log_level", "ERROR"),
        ],
    ),
    (
        "speech",
        &[
            ("enabled", "true"),
            ("engine", "auto"),
            ("voice", "en"),
            ("rate", "50"),
            ("pitch", "50"),
            ("volume", "100"),
            ("punctuation_level", "some"),
        ],
    ),
    (
        "braille",
        &[
            ("enabled", "false"),
            ("display", "auto"),
            ("translation_table", "builtin"),
            ("cells", "40"),
            ("cursor_blink", "true"),
            ("cursor_style", "block"),
        ],
    ),
    (
        "keyboard",
        &[
            ("caps_lock_as_modifier", "true"),
            ("insert_as_modifier", "true"),
            ("keyboard_layout", "en"),
            ("key_repeat_delay", "500"),
            ("key_repeat_rate", "30"),
            ("double_press_timeout", "500"),
        ],
    ),
    (
        "sound",
        &[
            ("enabled", "true"),
            ("volume", "100"),
            ("beep_volume", "50"),
            ("beep_frequency", "1000"),
        ],
    ),
    (
        "haptics",
        &[
            ("enabled", "false"),
            ("device", "auto"),
            ("intensity", "1.0"),
            ("duration", "100"),
        ],
    ),
    (
        "spatial_audio",
        &[
            ("enabled", "false"),
            ("headset", "default"),
            ("profile", "default"),
            ("calibration", "true"),
            ("screen_width", "1920"),
            ("screen_height", "1080"),
        ],
    ),
    (
        "platforms",
        &[
            ("linux.enabled", "true"),
            ("linux.atspi", "true"),
            ("linux.speech_dispatcher", "true"),
            ("linux.brltty", "true"),
            ("windows.enabled", "false"),
            ("android.enabled", "false"),
        ],
    ),
    (
        "apps",
        &[
            ("browsers.firefox", "true"),
            ("browsers.chrome", "true"),
            ("browsers.edge", "true"),
            ("browsers.electron", "true"),
            ("office.libreoffice", "true"),
            ("office.onlyoffice", "true"),
            ("terminals.gnome_terminal", "true"),
            ("terminals.konsole", "true"),
            ("terminals.xterm", "true"),
            ("terminals.terminator", "true"),
            ("editors.kate", "true"),
            ("editors.gedit", "true"),
            ("mail.thunderbird", "true"),
            ("media.mpv", "true"),
            ("media.amarok", "true"),
            ("games.enabled", "true"),
        ],
    ),
    (
        "symbols",
        &[
            ("32", "space"),
            ("33", "bang"),
            ("34", "quote"),
            ("35", "number"),
            ("36", "dollar"),
            ("37", "percent"),
            ("38", "and"),
            ("39", "tick"),
            ("40", "left paren"),
            ("41", "right paren"),
            ("42", "star"),
            ("43", "plus"),
            ("44", "comma"),
            ("45", "dash"),
            ("46", "dot"),
            ("47", "slash"),
            ("58", "colon"),
            ("59", "semi"),
            ("60", "less"),
            ("61", "equals"),
            ("62", "greater"),
            ("63", "question"),
            ("64", "at"),
            ("91", "left bracket"),
            ("92", "backslash"),
            ("93", "right bracket"),
            ("94", "caret"),
            ("95", "line"),
            ("96", "grav"),
            ("123", "left brace"),
            ("124", "bar"),
            ("125", "right brace"),
            ("126", "tilda"),
        ],
    ),
    ("gestures", &[]),
];

/// Options that must stay within 0..=100
const PERCENT_OPTIONS: &[(&str, &str)] = &[
    ("speech", "rate"),
    ("speech", "pitch"),
    ("speech", "volume"),
    ("sound", "volume"),
    ("sound", "beep_volume"),
];

/// A problem found by [`Config::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub section: String,
    pub option: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.section, self.option, self.message)
    }
}

/// Application configuration for the screen reader
///
/// Holds every persistent setting: speech parameters, braille display,
/// keyboard modifiers, output modules, platform and per-application switches.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path
    path: PathBuf,

    /// Symbols dictionary (char code -> name) for punctuation speech
    pub symbols: HashMap<u32, String>,
}

impl Config {
    /// Default config file location (`~/.config/nvda_linux/config.ini`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("nvda_linux")
            .join("config.ini")
    }

    /// Load configuration from `path`, writing the defaults there first if
    /// the file does not exist yet. Environment overrides are applied last.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| NvdaError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default at {:?}", path);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let default = Self::default_ini();
            default
                .write_to_file(path)
                .map_err(|e| NvdaError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        let mut config = Self::from_ini(ini);
        config.path = path.to_path_buf();
        let applied = config.apply_env_overrides(std::env::vars());
        if applied > 0 {
            info!("Applied {} option(s) from environment", applied);
        }
        Ok(config)
    }

    /// Build a configuration from an in-memory INI, filling in defaults
    pub fn from_ini(mut ini: Ini) -> Self {
        for (section, options) in DEFAULTS {
            for (key, value) in options.iter() {
                if ini.get_from(Some(*section), key).is_none() {
                    ini.with_section(Some(*section)).set(*key, *value);
                }
            }
        }

        let mut config = Self {
            ini,
            path: Self::default_path(),
            symbols: HashMap::new(),
        };
        config.parse_symbols();
        config
    }

    /// Pure defaults, not backed by any file
    pub fn defaults() -> Self {
        Self::from_ini(Ini::new())
    }

    /// Save configuration to its own path
    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Saving config to {:?}", path);
        self.ini
            .write_to_file(path)
            .map_err(|e| NvdaError::Config(format!("Failed to save config: {}", e)))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Create default configuration
    fn default_ini() -> Ini {
        let mut ini = Ini::new();
        for (section, options) in DEFAULTS {
            let mut setter = ini.with_section(Some(*section));
            for (key, value) in options.iter() {
                setter.set(*key, *value);
            }
        }
        ini
    }

    /// Restore every option to its default, keeping the file path
    pub fn reset(&mut self) {
        debug!("Resetting configuration to defaults");
        self.ini = Self::default_ini();
        self.parse_symbols();
    }

    /// Parse symbols from config
    fn parse_symbols(&mut self) {
        self.symbols.clear();
        if let Some(section) = self.ini.section(Some("symbols")) {
            for (key, value) in section.iter() {
                if let Ok(code) = key.parse::<u32>() {
                    self.symbols.insert(code, value.to_string());
                }
            }
        }
        debug!("Loaded {} symbols", self.symbols.len());
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Raw value lookup
    pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.get_from(Some(section), key)
    }

    /// Set a value in config, creating the section if needed
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
        if section == "symbols" {
            self.parse_symbols();
        }
    }

    /// Options of one section in file order
    pub fn section_entries(&self, section: &str) -> Vec<(String, String)> {
        self.ini
            .section(Some(section))
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overlay every option of `other` onto this configuration
    pub fn merge(&mut self, other: &Config) {
        for (section, props) in other.ini.iter() {
            let Some(section) = section else { continue };
            for (key, value) in props.iter() {
                self.ini.with_section(Some(section)).set(key, value);
            }
        }
        self.parse_symbols();
    }

    /// Apply `NVDA_<SECTION>_<OPTION>` overrides
    ///
    /// The longest matching section name wins, so `NVDA_SPATIAL_AUDIO_PROFILE`
    /// lands in `[spatial_audio]`. Dots in existing option names match `_`.
    /// Returns how many options were set.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut sections: Vec<String> = self
            .ini
            .sections()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        sections.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut applied = 0;
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix("NVDA_") else {
                continue;
            };
            let rest = rest.to_lowercase();

            let Some(section) = sections
                .iter()
                .find(|s| rest.starts_with(&format!("{}_", s)))
                .cloned()
            else {
                continue;
            };
            let option = &rest[section.len() + 1..];
            if option.is_empty() {
                continue;
            }

            let key = self
                .section_entries(&section)
                .into_iter()
                .map(|(k, _)| k)
                .find(|k| k.replace('.', "_") == option)
                .unwrap_or_else(|| option.to_string());

            debug!("Environment override {}.{} = {}", section, key, value);
            self.set(&section, &key, &value);
            applied += 1;
        }
        applied
    }

    /// Whole configuration as nested JSON
    ///
    /// Dotted options nest (`linux.atspi` -> `{"linux": {"atspi": ..}}`) and
    /// values are typed: bool, then integer, then float, then string.
    pub fn get_all(&self) -> Value {
        let mut root = Map::new();
        for (section, props) in self.ini.iter() {
            let Some(section) = section else { continue };
            let mut obj = Map::new();
            for (key, value) in props.iter() {
                insert_dotted(&mut obj, key, typed_value(value));
            }
            root.insert(section.to_string(), Value::Object(obj));
        }
        Value::Object(root)
    }

    /// Check option types and ranges against the defaults
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut issue = |section: &str, option: &str, message: String| {
            issues.push(ValidationIssue {
                section: section.to_string(),
                option: option.to_string(),
                message,
            });
        };

        for &(section, options) in DEFAULTS {
            if section == "symbols" {
                continue;
            }
            for &(key, default) in options.iter() {
                let Some(value) = self.get_raw(section, key) else {
                    continue;
                };
                if parse_bool(default).is_some() && parse_bool(value).is_none() {
                    issue(section, key, format!("expected a boolean, got '{}'", value));
                } else if default.parse::<i64>().is_ok() && value.trim().parse::<i64>().is_err() {
                    issue(section, key, format!("expected an integer, got '{}'", value));
                } else if default.parse::<f64>().is_ok() && value.trim().parse::<f64>().is_err() {
                    issue(section, key, format!("expected a number, got '{}'", value));
                }
            }
        }

        for &(section, key) in PERCENT_OPTIONS {
            if let Some(Ok(v)) = self.get_raw(section, key).map(|v| v.trim().parse::<i64>()) {
                if !(0..=100).contains(&v) {
                    issue(section, key, format!("{} is outside 0..=100", v));
                }
            }
        }

        if let Some(Ok(v)) = self
            .get_raw("haptics", "intensity")
            .map(|v| v.trim().parse::<f64>())
        {
            if !(0.0..=1.0).contains(&v) {
                issue("haptics", "intensity", format!("{} is outside 0.0..=1.0", v));
            }
        }

        if let Some(Ok(v)) = self.get_raw("braille", "cells").map(|v| v.trim().parse::<i64>()) {
            if !(1..=160).contains(&v) {
                issue("braille", "cells", format!("{} is outside 1..=160", v));
            }
        }

        if let Some(level) = self.get_raw("speech", "punctuation_level") {
            if level.parse::<PunctuationLevel>().is_err() {
                issue(
                    "speech",
                    "punctuation_level",
                    format!("unknown level '{}'", level),
                );
            }
        }

        for i in &issues {
            warn!("Invalid configuration: {}", i);
        }
        issues
    }

    // Screen reader-specific configuration getters

    /// Is the given platform switched on in `[platforms]`?
    pub fn platform_enabled(&self, platform: &str) -> bool {
        self.get_bool("platforms", &format!("{}.enabled", platform), false)
    }

    /// Is the running platform switched on?
    pub fn current_platform_enabled(&self) -> bool {
        self.platform_enabled(Platform::detect().config_key())
    }

    /// Should the given platform integration be used (e.g. `linux`, `atspi`)?
    pub fn platform_feature(&self, platform: &str, feature: &str) -> bool {
        self.get_bool("platforms", &format!("{}.{}", platform, feature), false)
    }

    /// Is an application module switched on in `[apps]`?
    pub fn app_enabled(&self, category: &str, app: &str) -> bool {
        self.get_bool("apps", &format!("{}.{}", category, app), false)
    }

    /// Debug logging requested from the config file
    pub fn debug_mode(&self) -> bool {
        self.get_bool("general", "debug_mode", false)
    }

    /// Log level for normal runs
    pub fn log_level(&self) -> log::LevelFilter {
        self.get_string("general", "log_level", "ERROR")
            .parse()
            .unwrap_or(log::LevelFilter::Error)
    }

    /// Play the startup announcement?
    pub fn startup_sound(&self) -> bool {
        self.get_bool("general", "startup_sound", true)
    }

    pub fn speech_enabled(&self) -> bool {
        self.get_bool("speech", "enabled", true)
    }

    /// Speech engine name: auto, espeak, speech-dispatcher or native
    pub fn speech_engine(&self) -> String {
        self.get_string("speech", "engine", "auto")
    }

    pub fn voice(&self) -> String {
        self.get_string("speech", "voice", "en")
    }

    /// Speech rate (0-100)
    pub fn rate(&self) -> Option<u8> {
        self.percent("speech", "rate", 50)
    }

    /// Speech pitch (0-100)
    pub fn pitch(&self) -> Option<u8> {
        self.percent("speech", "pitch", 50)
    }

    /// Speech volume (0-100)
    pub fn volume(&self) -> Option<u8> {
        self.percent("speech", "volume", 100)
    }

    /// How much punctuation is spoken
    pub fn punctuation_level(&self) -> PunctuationLevel {
        self.get_string("speech", "punctuation_level", "some")
            .parse()
            .unwrap_or_default()
    }

    pub fn braille_enabled(&self) -> bool {
        self.get_bool("braille", "enabled", false)
    }

    /// Braille display driver: auto or brlapi
    pub fn braille_display(&self) -> String {
        self.get_string("braille", "display", "auto")
    }

    /// Translation table: `builtin` or a path to a table file
    pub fn braille_table(&self) -> String {
        self.get_string("braille", "translation_table", "builtin")
    }

    /// Number of cells assumed until the display reports its size
    pub fn braille_cells(&self) -> usize {
        let cells = self.get_int("braille", "cells", 40);
        if (1..=160).contains(&cells) {
            cells as usize
        } else {
            40
        }
    }

    pub fn caps_lock_as_modifier(&self) -> bool {
        self.get_bool("keyboard", "caps_lock_as_modifier", true)
    }

    pub fn insert_as_modifier(&self) -> bool {
        self.get_bool("keyboard", "insert_as_modifier", true)
    }

    /// Key repeat delay in milliseconds
    pub fn key_repeat_delay(&self) -> u64 {
        self.get_int("keyboard", "key_repeat_delay", 500).max(0) as u64
    }

    /// Key repeat rate in repeats per second
    pub fn key_repeat_rate(&self) -> u64 {
        self.get_int("keyboard", "key_repeat_rate", 30).max(0) as u64
    }

    /// Window for detecting a double press, in milliseconds
    pub fn double_press_timeout(&self) -> u64 {
        self.get_int("keyboard", "double_press_timeout", 500).max(0) as u64
    }

    pub fn sound_enabled(&self) -> bool {
        self.get_bool("sound", "enabled", true)
    }

    /// Beep volume scaled to 0.0-1.0 (includes the master sound volume)
    pub fn beep_volume(&self) -> f32 {
        let master = self.percent("sound", "volume", 100).unwrap_or(100) as f32 / 100.0;
        let beep = self.percent("sound", "beep_volume", 50).unwrap_or(50) as f32 / 100.0;
        master * beep
    }

    /// Beep frequency in Hz
    pub fn beep_frequency(&self) -> f32 {
        self.get_float("sound", "beep_frequency", 1000.0).clamp(20.0, 20000.0)
    }

    pub fn haptics_enabled(&self) -> bool {
        self.get_bool("haptics", "enabled", false)
    }

    pub fn haptics_device(&self) -> String {
        self.get_string("haptics", "device", "auto")
    }

    /// Default vibration intensity (0.0-1.0)
    pub fn haptics_intensity(&self) -> f32 {
        self.get_float("haptics", "intensity", 1.0).clamp(0.0, 1.0)
    }

    /// Default pulse duration in milliseconds
    pub fn haptics_duration(&self) -> u64 {
        self.get_int("haptics", "duration", 100).max(0) as u64
    }

    pub fn spatial_audio_enabled(&self) -> bool {
        self.get_bool("spatial_audio", "enabled", false)
    }

    /// Calibration profile selected at startup
    pub fn spatial_profile(&self) -> String {
        self.get_string("spatial_audio", "profile", "default")
    }

    /// Screen size in pixels used to place spatial cues
    pub fn spatial_screen_size(&self) -> (u32, u32) {
        let dimension = |key: &str, default: u32| {
            u32::try_from(self.get_int("spatial_audio", key, default as i64))
                .ok()
                .filter(|&v| v > 0)
                .unwrap_or(default)
        };
        (dimension("screen_width", 1920), dimension("screen_height", 1080))
    }

    /// Where calibration profiles are stored (next to the config file)
    pub fn spatial_profiles_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join("spatial_profiles.json"))
            .unwrap_or_else(|| PathBuf::from("spatial_profiles.json"))
    }

    fn percent(&self, section: &str, key: &str, default: i64) -> Option<u8> {
        self.get_int(section, key, default)
            .try_into()
            .ok()
            .filter(|&v: &u8| v <= 100)
    }
}

/// Parse the boolean spellings accepted in the config file
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn typed_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Some(b) = match trimmed {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    } {
        return Value::Bool(b);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

fn insert_dotted(obj: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            obj.insert(key.to_string(), value);
        }
        Some((head, tail)) => {
            let entry = obj
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_dotted(child, tail, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let config = Config::defaults();
        assert_eq!(config.rate(), Some(50));
        assert_eq!(config.volume(), Some(100));
        assert!(config.speech_enabled());
        assert!(!config.braille_enabled());
        assert_eq!(config.braille_cells(), 40);
        assert!(config.symbols.contains_key(&33));
    }

    #[test]
    fn test_bool_spellings() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_dotted_nesting() {
        let config = Config::defaults();
        let all = config.get_all();
        assert_eq!(all["platforms"]["linux"]["atspi"], Value::Bool(true));
        assert_eq!(all["speech"]["rate"], Value::from(50));
        assert_eq!(all["haptics"]["intensity"], Value::from(1.0));
        assert_eq!(all["speech"]["voice"], Value::from("en"));
    }

    #[test]
    fn test_env_prefix_prefers_longest_section() {
        let mut config = Config::defaults();
        let n = config.apply_env_overrides(vec![
            ("NVDA_SPATIAL_AUDIO_PROFILE".to_string(), "studio".to_string()),
            ("NVDA_PLATFORMS_LINUX_ATSPI".to_string(), "false".to_string()),
            ("HOME".to_string(), "/tmp".to_string()),
        ]);
        assert_eq!(n, 2);
        assert_eq!(config.spatial_profile(), "studio");
        assert!(!config.platform_feature("linux", "atspi"));
    }

    #[test]
    fn test_spatial_screen_size() {
        let mut config = Config::defaults();
        assert_eq!(config.spatial_screen_size(), (1920, 1080));
        config.set("spatial_audio", "screen_width", "2560");
        config.set("spatial_audio", "screen_height", "-5");
        assert_eq!(config.spatial_screen_size(), (2560, 1080));
        config.set("spatial_audio", "screen_width", "99999999999");
        assert_eq!(config.spatial_screen_size(), (1920, 1080));
    }

    #[test]
    fn test_out_of_range_percent_is_none() {
        let mut config = Config::defaults();
        config.set("speech", "rate", "150");
        assert_eq!(config.rate(), None);
        assert_eq!(config.validate().len(), 1);
    }
}
