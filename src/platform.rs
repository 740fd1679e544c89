//! Platform detection utilities

use std::fs;

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks for WSL-specific indicators in /proc/version and environment variables.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

/// Host platform as named in the `[platforms]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    Android,
    /// Linux without a graphical session (virtual console, ssh)
    Console,
}

impl Platform {
    /// Detect the platform we are running on
    pub fn detect() -> Self {
        Self::detect_with(|name| std::env::var_os(name).is_some())
    }

    /// Detection with an injectable environment lookup
    pub fn detect_with<F: Fn(&str) -> bool>(has_var: F) -> Self {
        if has_var("ANDROID_ROOT") {
            return Platform::Android;
        }
        if cfg!(target_os = "windows") {
            return Platform::Windows;
        }
        if !has_var("DISPLAY") && !has_var("WAYLAND_DISPLAY") {
            return Platform::Console;
        }
        Platform::Linux
    }

    /// Lower-case name used as the config key prefix
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Android => "android",
            Platform::Console => "console",
        }
    }

    /// Config section name holding this platform's switches
    ///
    /// The console shares the Linux settings.
    pub fn config_key(&self) -> &'static str {
        match self {
            Platform::Console => "linux",
            other => other.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wsl() {
        let _ = is_wsl();
    }

    #[test]
    fn test_detect_android_first() {
        let p = Platform::detect_with(|v| v == "ANDROID_ROOT" || v == "DISPLAY");
        assert_eq!(p, Platform::Android);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_detect_console_without_display() {
        assert_eq!(Platform::detect_with(|_| false), Platform::Console);
        assert_eq!(Platform::detect_with(|v| v == "WAYLAND_DISPLAY"), Platform::Linux);
    }

    #[test]
    fn test_console_uses_linux_settings() {
        assert_eq!(Platform::Console.config_key(), "linux");
        assert_eq!(Platform::Android.config_key(), "android");
    }
}
