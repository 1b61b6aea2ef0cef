//! Flat key-value settings store
//!
//! The older builds kept all progress as loose scalar keys next to general
//! game settings. Only the migration pass reads progress from here now; it
//! also owns the "migration done" flag.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persistence::SaveError;
use crate::persistence::store::write_atomic;

/// A scalar setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Int(i32),
    Float(f32),
    Str(String),
}

/// Narrow access to a flat settings store.
///
/// Typed getters return `None` when the key is missing or holds another
/// type, matching how the old store answered.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn set(&mut self, key: &str, value: PrefValue);

    /// Persist pending writes
    fn flush(&mut self) -> Result<(), SaveError>;

    fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(PrefValue::Int(v)) => Some(v),
            _ => None,
        }
    }

    fn get_float(&self, key: &str) -> Option<f32> {
        match self.get(key) {
            Some(PrefValue::Float(v)) => Some(v),
            _ => None,
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(PrefValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    /// `key == 1`, the old boolean convention
    fn get_flag(&self, key: &str) -> bool {
        self.get_int(key) == Some(1)
    }

    fn set_int(&mut self, key: &str, value: i32) {
        self.set(key, PrefValue::Int(value));
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, PrefValue::Str(value.to_string()));
    }
}

/// In-memory store, used by tests and as a scratch store
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, PrefValue>,
    flushes: usize,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful flushes so far
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<(), SaveError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Settings kept as one JSON object on disk (native builds)
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
}

impl JsonSettingsFile {
    /// Open the store at `path`. A missing file is an empty store; a
    /// malformed one is an error so it is never silently overwritten.
    pub fn open(path: &Path) -> Result<Self, SaveError> {
        let values = match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                SaveError::Settings(format!("malformed settings file {:?}: {}", path, e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings file at {:?}, starting empty", path);
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsFile {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<(), SaveError> {
        let json = serde_json::to_string_pretty(&self.values).map_err(SaveError::Encode)?;
        write_atomic(&self.path, json.as_bytes())?;
        log::debug!("Settings saved to {:?}", self.path);
        Ok(())
    }
}

/// Settings in browser LocalStorage, one entry per key (WASM only)
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageSettings {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageSettings {
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()?;
        Some(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl SettingsStore for LocalStorageSettings {
    fn get(&self, key: &str) -> Option<PrefValue> {
        let raw = self.storage.get_item(key).ok()??;
        // Values written by other code may be bare strings
        Some(serde_json::from_str(&raw).unwrap_or(PrefValue::Str(raw)))
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        if let Ok(json) = serde_json::to_string(&value) {
            if self.storage.set_item(key, &json).is_err() {
                log::warn!("LocalStorage rejected write of {}", key);
            }
        }
    }

    fn flush(&mut self) -> Result<(), SaveError> {
        // LocalStorage writes are immediate
        Ok(())
    }
}
