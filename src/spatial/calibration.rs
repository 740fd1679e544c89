//! Listener calibration profiles
//!
//! Profiles describe the listener's head and room. They are stored as JSON
//! next to the configuration file.

use crate::{NvdaError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE: &str = "default";

/// Head and room measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Head radius in metres
    pub head_radius: f32,
    /// Distance between the ears in metres
    pub ear_distance: f32,
    /// Room width, depth, height in metres
    pub room_size: [f32; 3],
    /// Reverb mix, 0.0-1.0
    pub reverb: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            head_radius: 0.0875,
            ear_distance: 0.175,
            room_size: [5.0, 5.0, 3.0],
            reverb: 0.3,
        }
    }
}

impl CalibrationProfile {
    pub fn validate(&self) -> Result<()> {
        let sizes = [self.head_radius, self.ear_distance]
            .into_iter()
            .chain(self.room_size);
        for value in sizes {
            if !value.is_finite() || value <= 0.0 {
                return Err(NvdaError::Audio(format!(
                    "Calibration sizes must be positive, got {}",
                    value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.reverb) {
            return Err(NvdaError::Audio(format!(
                "Reverb {} outside 0.0-1.0",
                self.reverb
            )));
        }
        Ok(())
    }

    /// Room diagonal in metres
    pub fn room_diagonal(&self) -> f32 {
        self.room_size.iter().map(|s| s * s).sum::<f32>().sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    current: String,
    profiles: BTreeMap<String, CalibrationProfile>,
}

/// Named profiles and the one in use
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    profiles: BTreeMap<String, CalibrationProfile>,
    current: String,
    path: Option<PathBuf>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), CalibrationProfile::default());
        Self {
            profiles,
            current: DEFAULT_PROFILE.to_string(),
            path: None,
        }
    }

    /// Load profiles from a JSON file; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        store.path = Some(path.to_path_buf());
        if !path.exists() {
            debug!("No calibration file at {:?}, using defaults", path);
            return Ok(store);
        }

        let file: StoreFile = serde_json::from_str(&fs::read_to_string(path)?)?;
        for (name, profile) in file.profiles {
            profile.validate()?;
            store.profiles.insert(name, profile);
        }
        if store.profiles.contains_key(&file.current) {
            store.current = file.current;
        }
        info!(
            "Loaded {} calibration profiles, using {}",
            store.profiles.len(),
            store.current
        );
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Err(NvdaError::Audio("Calibration store has no file".to_string())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            current: self.current.clone(),
            profiles: self.profiles.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Add or replace a profile
    pub fn save_profile(&mut self, name: &str, profile: CalibrationProfile) -> Result<()> {
        profile.validate()?;
        self.profiles.insert(name.to_string(), profile);
        Ok(())
    }

    pub fn get_profile(&self, name: &str) -> Option<&CalibrationProfile> {
        self.profiles.get(name)
    }

    /// Switch to a profile; `None` re-selects the current one
    pub fn calibrate(&mut self, name: Option<&str>) -> Result<&CalibrationProfile> {
        if let Some(name) = name {
            if !self.profiles.contains_key(name) {
                return Err(NvdaError::Audio(format!("Unknown calibration profile: {}", name)));
            }
            self.current = name.to_string();
        }
        Ok(self.current_profile())
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    pub fn current_profile(&self) -> &CalibrationProfile {
        self.profiles
            .get(&self.current)
            .or_else(|| self.profiles.get(DEFAULT_PROFILE))
            .unwrap_or(&FALLBACK)
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

static FALLBACK: CalibrationProfile = CalibrationProfile {
    head_radius: 0.0875,
    ear_distance: 0.175,
    room_size: [5.0, 5.0, 3.0],
    reverb: 0.3,
};

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn custom() -> CalibrationProfile {
        CalibrationProfile {
            head_radius: 0.12,
            ear_distance: 0.22,
            room_size: [6.0, 6.0, 4.0],
            reverb: 0.4,
        }
    }

    #[test]
    fn test_save_and_select() {
        let mut store = CalibrationStore::new();
        store.save_profile("custom", custom()).unwrap();
        assert_eq!(store.calibrate(Some("custom")).copied().ok(), Some(custom()));
        assert_eq!(store.current_name(), "custom");
        assert!(store.calibrate(Some("missing")).is_err());
        assert_eq!(store.current_name(), "custom");
    }

    #[test]
    fn test_invalid_profile() {
        let mut store = CalibrationStore::new();
        let bad = CalibrationProfile { reverb: 1.5, ..custom() };
        assert!(store.save_profile("bad", bad).is_err());
        let bad = CalibrationProfile { head_radius: 0.0, ..custom() };
        assert!(store.save_profile("bad", bad).is_err());
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");

        let mut store = CalibrationStore::load(&path).unwrap();
        assert_eq!(store.names(), vec!["default"]);
        store.save_profile("large_room", CalibrationProfile { room_size: [10.0, 10.0, 5.0], ..Default::default() }).unwrap();
        store.calibrate(Some("large_room")).unwrap();
        store.save().unwrap();

        let reloaded = CalibrationStore::load(&path).unwrap();
        assert_eq!(reloaded.current_name(), "large_room");
        assert_eq!(reloaded.current_profile().room_size, [10.0, 10.0, 5.0]);
    }
}
