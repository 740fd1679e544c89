//! Accessible state flags

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// States of an accessible node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StateSet: u32 {
        const FOCUSED = 1 << 0;
        const FOCUSABLE = 1 << 1;
        const VISIBLE = 1 << 2;
        const SHOWING = 1 << 3;
        const ENABLED = 1 << 4;
        const SENSITIVE = 1 << 5;
        const CHECKED = 1 << 6;
        const SELECTED = 1 << 7;
        const EXPANDABLE = 1 << 8;
        const EXPANDED = 1 << 9;
        const EDITABLE = 1 << 10;
        const READ_ONLY = 1 << 11;
        const REQUIRED = 1 << 12;
        const INVALID = 1 << 13;
        const MULTI_LINE = 1 << 14;
        const BUSY = 1 << 15;
    }
}

impl StateSet {
    /// Map one AT-SPI state name ("focused", "read-only", "multi_line")
    pub fn from_atspi_name(name: &str) -> Option<StateSet> {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        let state = match normalized.as_str() {
            "focused" => StateSet::FOCUSED,
            "focusable" => StateSet::FOCUSABLE,
            "visible" => StateSet::VISIBLE,
            "showing" => StateSet::SHOWING,
            "enabled" => StateSet::ENABLED,
            "sensitive" => StateSet::SENSITIVE,
            "checked" => StateSet::CHECKED,
            "selected" => StateSet::SELECTED,
            "expandable" => StateSet::EXPANDABLE,
            "expanded" => StateSet::EXPANDED,
            "editable" => StateSet::EDITABLE,
            "read_only" => StateSet::READ_ONLY,
            "required" => StateSet::REQUIRED,
            "invalid" | "invalid_entry" => StateSet::INVALID,
            "multi_line" | "multiline" => StateSet::MULTI_LINE,
            "busy" => StateSet::BUSY,
            _ => return None,
        };
        Some(state)
    }

    /// Lower-case names of the set flags, for reports
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_lowercase())
            .collect()
    }

    /// Words spoken for the states worth announcing
    ///
    /// Checkable roles also announce "not checked".
    pub fn spoken(&self, checkable: bool) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.contains(StateSet::CHECKED) {
            words.push("checked");
        } else if checkable {
            words.push("not checked");
        }
        if self.contains(StateSet::SELECTED) {
            words.push("selected");
        }
        if self.contains(StateSet::EXPANDED) {
            words.push("expanded");
        } else if self.contains(StateSet::EXPANDABLE) {
            words.push("collapsed");
        }
        if self.contains(StateSet::READ_ONLY) {
            words.push("read only");
        }
        if self.contains(StateSet::REQUIRED) {
            words.push("required");
        }
        if self.contains(StateSet::INVALID) {
            words.push("invalid entry");
        }
        if self.contains(StateSet::BUSY) {
            words.push("busy");
        }
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_atspi_name() {
        assert_eq!(StateSet::from_atspi_name("read-only"), Some(StateSet::READ_ONLY));
        assert_eq!(StateSet::from_atspi_name("FOCUSED"), Some(StateSet::FOCUSED));
        assert_eq!(StateSet::from_atspi_name("armed"), None);
    }

    #[test]
    fn test_spoken() {
        let states = StateSet::EXPANDABLE | StateSet::REQUIRED;
        assert_eq!(states.spoken(true), vec!["not checked", "collapsed", "required"]);
        assert!(StateSet::FOCUSED.spoken(false).is_empty());
    }

    #[test]
    fn test_names() {
        let states = StateSet::FOCUSED | StateSet::READ_ONLY;
        assert_eq!(states.names(), vec!["focused", "read_only"]);
    }
}
