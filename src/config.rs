//! Save system configuration
//!
//! Loaded from a JSON file; anything missing falls back to defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persistence::{FileStore, SAVE_EXTENSION};

/// Collectible count assumed for a level that has no configuration entry
pub const DEFAULT_COLLECTIBLE_COUNT: usize = 3;

/// Static configuration of one playable level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level_id: String,
    #[serde(default)]
    pub total_collectibles: usize,
}

impl LevelConfig {
    pub fn new(level_id: impl Into<String>, total_collectibles: usize) -> Self {
        Self {
            level_id: level_id.into(),
            total_collectibles,
        }
    }
}

/// Collectible count for `level_id`, or [`DEFAULT_COLLECTIBLE_COUNT`]
pub fn collectible_count(levels: &[LevelConfig], level_id: &str) -> usize {
    levels
        .iter()
        .find(|l| l.level_id == level_id)
        .map(|l| l.total_collectibles)
        .unwrap_or(DEFAULT_COLLECTIBLE_COUNT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Where slot files live
    pub saves_dir: PathBuf,
    /// Default destination for exports
    pub export_dir: PathBuf,
    /// Legacy flat key-value settings file (migration source)
    pub settings_file: PathBuf,
    /// Slot file extension
    pub extension: String,
    /// Number of slots the menu shows
    pub slot_count: u32,
    /// Every known level, in menu order
    pub levels: Vec<LevelConfig>,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from("Saves"),
            export_dir: PathBuf::from("ExportedSaves"),
            settings_file: PathBuf::from("settings.json"),
            extension: SAVE_EXTENSION.to_string(),
            slot_count: 3,
            levels: Vec::new(),
        }
    }
}

impl SaveConfig {
    /// Load config from `path`, falling back to defaults if it is missing
    /// or unreadable
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<SaveConfig>(&json) {
                Ok(config) => {
                    log::info!("Loaded config from {:?} ({} levels)", path, config.levels.len());
                    config
                }
                Err(e) => {
                    log::warn!("Config {:?} is malformed ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Level IDs that appear more than once
    pub fn duplicate_level_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for level in &self.levels {
            if !seen.insert(level.level_id.as_str()) && !duplicates.contains(&level.level_id) {
                duplicates.push(level.level_id.clone());
            }
        }
        duplicates
    }

    /// Log configuration problems. Returns false if any were found.
    pub fn validate(&self) -> bool {
        let duplicates = self.duplicate_level_ids();
        if !duplicates.is_empty() {
            log::error!("Duplicate level IDs found: {}", duplicates.join(", "));
            return false;
        }
        true
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::with_extension(&self.saves_dir, &self.extension)
    }
}
