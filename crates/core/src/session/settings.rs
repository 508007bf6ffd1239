//! User settings persistence.
//!
//! This module handles loading and saving user preferences: where the map
//! opens and which store the session talks to.

use crate::error::Result;
use crate::geometry::LonLat;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Center shown when no settings file exists.
pub const DEFAULT_CENTER: LonLat = LonLat::new(35.2532, 39.5000);

/// Zoom shown when no settings file exists.
pub const DEFAULT_ZOOM: f64 = 6.7;

/// User-configurable settings persisted between sessions.
///
/// Settings are stored as JSON in the user's config directory
/// (e.g., `~/.config/mapnote/settings.json` on Linux).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Initial map center.
    pub center: LonLat,
    /// Initial zoom level.
    pub zoom: f64,
    /// Store URL override (takes precedence over environment).
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "mapnote", "mapnote").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if not found.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Loads settings from `path`; a missing or corrupt file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            api_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mapnote-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_and_load() {
        let path = scratch_path("roundtrip");
        let settings = Settings {
            center: LonLat::new(29.0, 41.0),
            zoom: 11.0,
            api_url: Some("http://geo.local/api/".into()),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_or_corrupt_file_gives_defaults() {
        let path = scratch_path("corrupt");
        assert_eq!(Settings::load_from(&path), Settings::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        let _ = fs::remove_file(&path);
    }
}
