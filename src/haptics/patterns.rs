//! Vibration patterns
//!
//! A pattern alternates vibration and pause durations in milliseconds,
//! starting with a vibration: `[100, 50, 100]` is a double click.

use crate::{NvdaError, Result};
use std::collections::HashMap;

/// Pattern used for unknown names
pub const DEFAULT_PATTERN: &str = "click";

const BUILTIN: &[(&str, &[u32])] = &[
    ("click", &[100]),
    ("double_click", &[100, 50, 100]),
    ("error", &[200, 100, 200]),
    ("success", &[100, 100, 100]),
    ("scroll", &[50, 50, 50]),
    ("notification", &[150, 100, 150]),
];

/// Validated on/off durations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapticPattern(Vec<u32>);

impl HapticPattern {
    /// Reject patterns that would never vibrate
    pub fn new(segments: Vec<u32>) -> Result<Self> {
        if segments.iter().step_by(2).all(|&ms| ms == 0) {
            return Err(NvdaError::Haptics(
                "Pattern needs at least one non-zero vibration".to_string(),
            ));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn total_duration(&self) -> u32 {
        self.0.iter().fold(0u32, |total, ms| total.saturating_add(*ms))
    }
}

/// Named patterns, built-in and user-defined
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    patterns: HashMap<String, HapticPattern>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        let patterns = BUILTIN
            .iter()
            .map(|&(name, segments)| (name.to_string(), HapticPattern(segments.to_vec())))
            .collect();
        Self { patterns }
    }

    /// Pattern by name; unknown names fall back to a click
    pub fn get(&self, name: &str) -> HapticPattern {
        self.patterns
            .get(name)
            .or_else(|| self.patterns.get(DEFAULT_PATTERN))
            .cloned()
            .unwrap_or_else(|| HapticPattern(vec![100]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Add or replace a pattern
    pub fn register(&mut self, name: &str, segments: Vec<u32>) -> Result<()> {
        let pattern = HapticPattern::new(segments)?;
        self.patterns.insert(name.to_string(), pattern);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}
