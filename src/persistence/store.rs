//! File-backed slot storage
//!
//! One file per save name under a single root directory. Writes go to a
//! temp file first and are renamed into place, so a slot file is either the
//! old record or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::codec;
use super::error::SaveError;
use super::record::SaveRecord;

/// Default extension for slot and exported files
pub const SAVE_EXTENSION: &str = ".lvlsave";

/// Whole-file saves under one root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    extension: String,
}

impl FileStore {
    /// Store under `root` using [`SAVE_EXTENSION`]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extension(root, SAVE_EXTENSION)
    }

    /// `extension` may be given with or without the leading dot
    pub fn with_extension(root: impl Into<PathBuf>, extension: &str) -> Self {
        let extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        Self {
            root: root.into(),
            extension,
        }
    }

    /// Directory holding the save files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File extension, with its leading dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolve a save name to its file path. The extension is appended
    /// unless `name` already carries it.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SaveError> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(SaveError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(self.file_name(name)))
    }

    fn file_name(&self, name: &str) -> String {
        if has_extension(name, &self.extension) {
            name.to_string()
        } else {
            format!("{}{}", name, self.extension)
        }
    }

    /// Whether a save file exists on disk right now
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Load a record. A missing file is `Ok(None)`; an undecodable one is
    /// [`SaveError::Corrupt`].
    pub fn load(&self, name: &str) -> Result<Option<SaveRecord>, SaveError> {
        let path = self.path_for(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No save file at {:?}", path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let record = codec::decode(&text, &path)?;
        log::debug!("Loaded {} bytes from {:?}", text.len(), path);
        Ok(Some(record))
    }

    /// Write the whole record. With `overwrite == false` an existing file is
    /// left alone and [`SaveError::AlreadyExists`] is returned.
    pub fn save(&self, record: &SaveRecord, name: &str, overwrite: bool) -> Result<PathBuf, SaveError> {
        let path = self.path_for(name)?;
        if !overwrite && path.exists() {
            return Err(SaveError::AlreadyExists { path });
        }
        let text = codec::encode(record)?;
        write_atomic(&path, text.as_bytes())?;
        log::info!("Saved '{}' to {:?}", name, path);
        Ok(path)
    }

    /// Remove a save file. Returns false if there was nothing to delete.
    pub fn delete(&self, name: &str) -> Result<bool, SaveError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted save '{}'", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Delete skipped, no file at {:?}", path);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file with this store's extension under the root
    pub fn delete_all(&self) -> Result<usize, SaveError> {
        let mut deleted = 0;
        for name in self.list_saved()? {
            if self.delete(&name)? {
                deleted += 1;
            }
        }
        log::info!("Deleted {} saves in {:?}", deleted, self.root);
        Ok(deleted)
    }

    /// Names (without extension) of every save under the root
    pub fn list_saved(&self) -> Result<Vec<String>, SaveError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = strip_extension(file_name, &self.extension) {
                if !stem.trim().is_empty() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copy raw bytes between two saves. With `overwrite == false` the
    /// destination must not exist; otherwise it is replaced atomically.
    pub fn copy(&self, from: &str, to: &str, overwrite: bool) -> Result<(), SaveError> {
        let source = self.path_for(from)?;
        let dest = self.path_for(to)?;
        if !source.is_file() {
            return Err(SaveError::NotFound { path: source });
        }
        if !overwrite && dest.exists() {
            return Err(SaveError::AlreadyExists { path: dest });
        }
        let bytes = fs::read(&source)?;
        write_atomic(&dest, &bytes)?;
        log::info!("Copied save '{}' to '{}'", from, to);
        Ok(())
    }

    /// Rename a save. Fails if the target name is taken.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), SaveError> {
        let old_path = self.path_for(old)?;
        let new_path = self.path_for(new)?;
        if !old_path.is_file() {
            return Err(SaveError::NotFound { path: old_path });
        }
        if new_path.exists() {
            return Err(SaveError::AlreadyExists { path: new_path });
        }
        fs::rename(&old_path, &new_path)?;
        log::info!("Renamed save '{}' to '{}'", old, new);
        Ok(())
    }

    /// Copy a save to an external location, replacing whatever is there.
    ///
    /// `destination` is either a directory (existing, or spelled with a
    /// trailing separator), in which case the save keeps its own file name,
    /// or a full file path. Missing parent directories are created.
    pub fn export(&self, name: &str, destination: &Path) -> Result<PathBuf, SaveError> {
        let source = self.path_for(name)?;
        if !source.is_file() {
            log::warn!("Export failed, source save not found: {:?}", source);
            return Err(SaveError::NotFound { path: source });
        }

        let target = if destination.is_dir() || ends_with_separator(destination) {
            fs::create_dir_all(destination)?;
            destination.join(self.file_name(name))
        } else {
            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            destination.to_path_buf()
        };

        let bytes = fs::read(&source)?;
        write_atomic(&target, &bytes)?;
        log::info!("Exported save '{}' to {:?}", name, target);
        Ok(target)
    }

    /// Move an unreadable save out of the way, keeping its bytes
    pub(crate) fn quarantine(&self, name: &str) -> Result<PathBuf, SaveError> {
        let path = self.path_for(name)?;
        let stem = strip_extension(&self.file_name(name), &self.extension)
            .unwrap_or(name)
            .to_string();
        let quarantined = self.root.join(format!("{}.corrupt", stem));
        fs::rename(&path, &quarantined)?;
        log::warn!("Moved unreadable save {:?} to {:?}", path, quarantined);
        Ok(quarantined)
    }
}

/// Write `bytes` to a sibling temp file, sync, then rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    log::debug!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

fn has_extension(name: &str, extension: &str) -> bool {
    strip_extension(name, extension).is_some()
}

/// Case-insensitive extension strip
fn strip_extension<'a>(name: &'a str, extension: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(extension.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, ext) = name.split_at(split);
    ext.eq_ignore_ascii_case(extension).then_some(stem)
}

fn ends_with_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_str()
        .map(|s| s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR))
        .unwrap_or(false)
}
