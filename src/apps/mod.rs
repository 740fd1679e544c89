//! Application modules
//!
//! Each module describes one supported application: the process names it
//! runs under and how the screen reader should behave inside it. Modules
//! are switched on and off in the `[apps]` config section.

use crate::state::config::Config;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Application family, also the key prefix in `[apps]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppCategory {
    Browsers,
    Office,
    Terminals,
    Editors,
    Mail,
    Media,
    Games,
}

impl AppCategory {
    pub const ALL: [AppCategory; 7] = [
        AppCategory::Browsers,
        AppCategory::Office,
        AppCategory::Terminals,
        AppCategory::Editors,
        AppCategory::Mail,
        AppCategory::Media,
        AppCategory::Games,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppCategory::Browsers => "browsers",
            AppCategory::Office => "office",
            AppCategory::Terminals => "terminals",
            AppCategory::Editors => "editors",
            AppCategory::Mail => "mail",
            AppCategory::Media => "media",
            AppCategory::Games => "games",
        }
    }
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supported application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppModule {
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: AppCategory,
    /// Process or AT-SPI application names, matched as whole words
    pub process_names: &'static [&'static str],
    /// Documents are read with a virtual cursor
    pub browse_mode: bool,
    /// Characters are echoed as they are typed
    pub announce_typed_text: bool,
}

impl AppModule {
    /// Option name under `[apps]`
    pub fn config_key(&self) -> String {
        match self.category {
            AppCategory::Games => "games.enabled".to_string(),
            category => format!("{}.{}", category, self.id),
        }
    }

    fn matcher(&self) -> Option<Regex> {
        let names: Vec<String> = self.process_names.iter().map(|n| regex::escape(n)).collect();
        let pattern = format!(r"(?i)\b(?:{})\b", names.join("|"));
        match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Bad process pattern for {}: {}", self.id, e);
                None
            }
        }
    }
}

const fn module(
    id: &'static str,
    display_name: &'static str,
    category: AppCategory,
    process_names: &'static [&'static str],
    browse_mode: bool,
    announce_typed_text: bool,
) -> AppModule {
    AppModule {
        id,
        display_name,
        category,
        process_names,
        browse_mode,
        announce_typed_text,
    }
}

/// Every module shipped with the screen reader
pub const BUILTIN_MODULES: &[AppModule] = &[
    module("firefox", "Firefox", AppCategory::Browsers, &["firefox", "firefox-esr"], true, true),
    module(
        "chrome",
        "Chrome",
        AppCategory::Browsers,
        &["chrome", "google-chrome", "chromium", "chromium-browser"],
        true,
        true,
    ),
    module("edge", "Microsoft Edge", AppCategory::Browsers, &["microsoft-edge", "msedge"], true, true),
    module("electron", "Electron", AppCategory::Browsers, &["electron"], true, true),
    module(
        "libreoffice",
        "LibreOffice",
        AppCategory::Office,
        &["libreoffice", "soffice", "soffice.bin"],
        false,
        true,
    ),
    module(
        "onlyoffice",
        "ONLYOFFICE",
        AppCategory::Office,
        &["onlyoffice", "desktopeditors"],
        false,
        true,
    ),
    module(
        "gnome_terminal",
        "GNOME Terminal",
        AppCategory::Terminals,
        &["gnome-terminal", "gnome-terminal-server"],
        false,
        true,
    ),
    module("konsole", "Konsole", AppCategory::Terminals, &["konsole"], false, true),
    module("xterm", "XTerm", AppCategory::Terminals, &["xterm", "uxterm"], false, true),
    module("terminator", "Terminator", AppCategory::Terminals, &["terminator"], false, true),
    module("kate", "Kate", AppCategory::Editors, &["kate"], false, true),
    module("gedit", "gedit", AppCategory::Editors, &["gedit"], false, true),
    module("thunderbird", "Thunderbird", AppCategory::Mail, &["thunderbird"], true, true),
    module("mpv", "mpv", AppCategory::Media, &["mpv"], false, false),
    module("amarok", "Amarok", AppCategory::Media, &["amarok"], false, false),
    module(
        "games",
        "Games",
        AppCategory::Games,
        &["wine", "wine64", "proton", "steam"],
        false,
        false,
    ),
];

/// Known modules and which of them are active
pub struct AppRegistry {
    modules: Vec<AppModule>,
    active: Vec<bool>,
    matchers: Vec<Option<Regex>>,
}

impl AppRegistry {
    /// Registry of the built-in modules, none active yet
    pub fn new() -> Self {
        let modules = BUILTIN_MODULES.to_vec();
        let matchers = modules.iter().map(AppModule::matcher).collect();
        Self {
            active: vec![false; modules.len()],
            modules,
            matchers,
        }
    }

    /// Activate the modules switched on in `[apps]`; returns how many
    pub fn initialize(&mut self, config: &Config) -> usize {
        for (module, active) in self.modules.iter().zip(self.active.iter_mut()) {
            *active = config.get_bool("apps", &module.config_key(), false);
            debug!(
                "App module {} {}",
                module.id,
                if *active { "enabled" } else { "disabled" }
            );
        }
        let count = self.active.iter().filter(|a| **a).count();
        info!("{} application modules active", count);
        count
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.id == id)
    }

    /// Is `id` a known module that is currently active?
    pub fn is_supported(&self, id: &str) -> bool {
        self.index_of(id).is_some_and(|i| self.active[i])
    }

    /// Active modules, optionally limited to one category
    pub fn active_modules(&self, category: Option<AppCategory>) -> Vec<&AppModule> {
        self.modules
            .iter()
            .zip(&self.active)
            .filter(|(m, active)| **active && category.map_or(true, |c| m.category == c))
            .map(|(m, _)| m)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&AppModule> {
        self.index_of(id).map(|i| &self.modules[i])
    }

    /// JSON description of a module, including whether it is active
    pub fn info(&self, id: &str) -> Option<Value> {
        let i = self.index_of(id)?;
        let mut value = serde_json::to_value(&self.modules[i]).ok()?;
        if let Value::Object(map) = &mut value {
            map.insert("active".to_string(), Value::Bool(self.active[i]));
        }
        Some(value)
    }

    /// First active module whose process names occur in `app_name`
    pub fn module_for(&self, app_name: &str) -> Option<&AppModule> {
        self.modules
            .iter()
            .zip(&self.active)
            .zip(&self.matchers)
            .find(|((_, active), re)| {
                **active && re.as_ref().is_some_and(|re| re.is_match(app_name))
            })
            .map(|((m, _), _)| m)
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}
