//! Slot session: the one active save record and the numbered slots on disk
//!
//! A [`SaveSession`] is built once at startup and handed by reference to
//! everything that reads or mutates progress. Tests build as many
//! independent sessions as they like.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LevelConfig;
use crate::persistence::{CURRENT_VERSION, FileStore, SaveError, SaveRecord, codec};

/// File name prefix for numbered slots (`save_slot_<N>`)
pub const SLOT_FILE_PREFIX: &str = "save_slot_";

/// Save name (no extension) of a numbered slot
pub fn slot_file_name(slot: u32) -> String {
    format!("{}{}", SLOT_FILE_PREFIX, slot)
}

/// Slot number of a save name like `save_slot_2`; case-insensitive prefix
pub fn parse_slot_file_name(name: &str) -> Option<u32> {
    let prefix = name.get(..SLOT_FILE_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(SLOT_FILE_PREFIX) {
        return None;
    }
    name[SLOT_FILE_PREFIX.len()..].parse().ok()
}

/// `PLAYER A` for slot 0, `PLAYER B` for slot 1, ...; numeric past `Z`
pub fn default_profile_name(slot: u32) -> String {
    if slot < 26 {
        let letter = char::from(b'A' + slot as u8);
        format!("PLAYER {}", letter)
    } else {
        format!("PLAYER {}", u64::from(slot) + 1)
    }
}

/// Blank names and any `PLAYER <letter>` count as default
pub fn is_default_profile_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return true;
    }
    match name.strip_prefix("PLAYER ") {
        Some(rest) => {
            let mut chars = rest.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
        }
        None => false,
    }
}

/// Cross-level completion totals for a slot card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSummary {
    pub total_levels: usize,
    pub completed_levels: usize,
    pub perfect_levels: usize,
    pub collected_total: usize,
    pub collectible_max: usize,
    pub reward_all_levels: bool,
    pub reward_all_collectibles: bool,
    pub reward_all_perfect: bool,
}

impl SaveSummary {
    /// One star per earned reward
    pub fn star_count(&self) -> u32 {
        self.reward_all_levels as u32
            + self.reward_all_collectibles as u32
            + self.reward_all_perfect as u32
    }
}

/// Totals for `record` over every configured level. Levels with no
/// progress entry contribute nothing.
pub fn summarize(record: &SaveRecord, levels: &[LevelConfig]) -> SaveSummary {
    if levels.is_empty() {
        return SaveSummary::default();
    }

    let mut summary = SaveSummary {
        total_levels: levels.len(),
        ..Default::default()
    };

    for config in levels {
        summary.collectible_max += config.total_collectibles;

        let Some(progress) = record.level(&config.level_id) else {
            continue;
        };
        if progress.completed {
            summary.completed_levels += 1;
        }
        if progress.perfect {
            summary.perfect_levels += 1;
        }
        summary.collected_total += progress
            .collectibles
            .iter()
            .take(config.total_collectibles)
            .filter(|c| **c)
            .count();
    }

    summary.reward_all_levels = summary.completed_levels >= summary.total_levels;
    summary.reward_all_collectibles =
        summary.collected_total >= summary.collectible_max && summary.collectible_max > 0;
    summary.reward_all_perfect = summary.perfect_levels >= summary.total_levels;
    summary
}

/// The active slot and its record
#[derive(Debug)]
pub struct SaveSession {
    store: FileStore,
    active: SaveRecord,
    active_slot: u32,
}

impl SaveSession {
    /// Session with an empty default record; nothing is read until [`load`](Self::load)
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            active: SaveRecord::default(),
            active_slot: 0,
        }
    }

    /// Backing file store
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// The in-memory record of the active slot
    pub fn active(&self) -> &SaveRecord {
        &self.active
    }

    /// Mutable active record; changes reach disk on [`save`](Self::save)
    pub fn active_mut(&mut self) -> &mut SaveRecord {
        &mut self.active
    }

    /// Slot number [`save`](Self::save) writes to
    pub fn active_slot(&self) -> u32 {
        self.active_slot
    }

    /// Adopt `slot` as the active record, creating and persisting a default
    /// record if the slot has no file. An unreadable file is moved aside to
    /// `save_slot_<N>.corrupt` and replaced by a fresh record.
    pub fn load(&mut self, slot: u32) -> Result<(), SaveError> {
        let name = slot_file_name(slot);
        let loaded = match self.store.load(&name) {
            Ok(record) => record,
            Err(SaveError::Corrupt { path, source }) => {
                log::warn!("Slot {} is unreadable ({}): {:?}", slot, source, path);
                self.store.quarantine(&name)?;
                None
            }
            Err(e) => return Err(e),
        };

        self.active_slot = slot;
        match loaded {
            Some(record) => {
                if record.version > CURRENT_VERSION {
                    log::warn!(
                        "Slot {} was written by a newer format (version {}, current {})",
                        slot,
                        record.version,
                        CURRENT_VERSION
                    );
                }
                log::info!("Loaded slot {} ({})", slot, record.profile_name);
                self.active = record;
            }
            None => {
                self.active = SaveRecord::new(default_profile_name(slot));
                log::info!("Created new save in slot {}", slot);
                self.save()?;
            }
        }
        Ok(())
    }

    /// Stamp the current format version and write the active record to its slot
    pub fn save(&mut self) -> Result<(), SaveError> {
        self.active.version = CURRENT_VERSION;
        self.store
            .save(&self.active, &slot_file_name(self.active_slot), true)?;
        Ok(())
    }

    /// Remove a slot's file. The in-memory active record is left as is, even
    /// when `slot` is the active slot.
    pub fn delete(&mut self, slot: u32) -> Result<bool, SaveError> {
        let deleted = self.store.delete(&slot_file_name(slot))?;
        if deleted && slot == self.active_slot {
            log::debug!("Deleted the active slot {}; in-memory record kept", slot);
        }
        Ok(deleted)
    }

    /// Checks the filesystem on every call
    pub fn slot_exists(&self, slot: u32) -> bool {
        self.store.exists(&slot_file_name(slot))
    }

    /// Read a slot without making it active
    pub fn peek(&self, slot: u32) -> Result<Option<SaveRecord>, SaveError> {
        self.store.load(&slot_file_name(slot))
    }

    /// Slot numbers that have a file on disk, ascending
    pub fn used_slots(&self) -> Result<Vec<u32>, SaveError> {
        let mut slots: Vec<u32> = self
            .store
            .list_saved()?
            .iter()
            .filter_map(|name| parse_slot_file_name(name))
            .collect();
        slots.sort_unstable();
        slots.dedup();
        Ok(slots)
    }

    /// Smallest slot number with no file
    pub fn first_free_slot(&self) -> Result<u32, SaveError> {
        let used: HashSet<u32> = self.used_slots()?.into_iter().collect();
        let mut candidate = 0;
        while used.contains(&candidate) {
            candidate += 1;
        }
        Ok(candidate)
    }

    pub fn build_summary(&self, levels: &[LevelConfig]) -> SaveSummary {
        summarize(&self.active, levels)
    }

    pub fn has_checkpoint_for_level(&self, level_id: &str) -> bool {
        self.active.has_checkpoint_for(level_id)
    }

    /// Copy one slot over another. An existing destination is replaced; if
    /// the destination is the active slot it is reloaded.
    pub fn copy_slot(&mut self, from: u32, to: u32) -> Result<(), SaveError> {
        if from == to {
            log::debug!("Copy onto itself ignored (slot {})", from);
            return Ok(());
        }
        let from_name = slot_file_name(from);
        if !self.store.exists(&from_name) {
            return Err(SaveError::NotFound {
                path: self.store.path_for(&from_name)?,
            });
        }
        let to_name = slot_file_name(to);
        if self.store.exists(&to_name) {
            log::info!("Slot {} already has a save, replacing it", to);
        }
        self.store.copy(&from_name, &to_name, true)?;

        if to == self.active_slot {
            self.load(to)?;
        }
        Ok(())
    }

    /// Export `slot` as `<dest_dir>/<base_name><ext>`. `base_name` defaults
    /// to `LevelUp_File_<slot>`.
    pub fn export(
        &self,
        slot: u32,
        dest_dir: &Path,
        base_name: Option<&str>,
    ) -> Result<PathBuf, SaveError> {
        let base_name = match base_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("LevelUp_File_{}", slot),
        };
        let target = dest_dir.join(format!("{}{}", base_name, self.store.extension()));
        match self.store.export(&slot_file_name(slot), &target) {
            Ok(path) => {
                log::info!("Exported slot {} to {:?}", slot, path);
                Ok(path)
            }
            Err(e) => {
                log::warn!("Export of slot {} failed: {}", slot, e);
                Err(e)
            }
        }
    }

    /// Import an external save file into `slot`.
    ///
    /// The file is decoded before anything is written, so a missing or
    /// corrupt source leaves every slot untouched. The profile name is
    /// re-stamped for the destination slot. With `activate`, the slot is
    /// then loaded as the active record.
    pub fn import(&mut self, slot: u32, source: &Path, activate: bool) -> Result<(), SaveError> {
        if !source.is_file() {
            log::warn!("Import failed, source file not found: {:?}", source);
            return Err(SaveError::NotFound {
                path: source.to_path_buf(),
            });
        }

        let text = fs::read_to_string(source)?;
        let mut record = match codec::decode(&text, source) {
            Ok(record) => record,
            Err(e) => {
                log::error!("Import failed, could not decode {:?}: {}", source, e);
                return Err(e);
            }
        };

        record.profile_name = default_profile_name(slot);
        record.version = CURRENT_VERSION;
        self.store.save(&record, &slot_file_name(slot), true)?;
        log::info!("Imported {:?} into slot {}", source, slot);

        if activate {
            self.load(slot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::LevelProgress;
    use tempfile::TempDir;

    fn session() -> (TempDir, SaveSession) {
        let dir = TempDir::new().unwrap();
        let session = SaveSession::new(FileStore::new(dir.path().join("Saves")));
        (dir, session)
    }

    fn levels() -> Vec<LevelConfig> {
        vec![
            LevelConfig::new("1-1", 3),
            LevelConfig::new("1-2", 3),
            LevelConfig::new("1-3", 2),
        ]
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(slot_file_name(3), "save_slot_3");
        assert_eq!(parse_slot_file_name("save_slot_12"), Some(12));
        assert_eq!(parse_slot_file_name("SAVE_SLOT_2"), Some(2));
        assert_eq!(parse_slot_file_name("save_slot_x"), None);
        assert_eq!(parse_slot_file_name("backup_1"), None);
        assert_eq!(parse_slot_file_name("save_slot_-1"), None);
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(default_profile_name(0), "PLAYER A");
        assert_eq!(default_profile_name(2), "PLAYER C");
        assert_eq!(default_profile_name(26), "PLAYER 27");
        assert_eq!(default_profile_name(u32::MAX), "PLAYER 4294967296");
        assert!(is_default_profile_name("  PLAYER B "));
        assert!(is_default_profile_name(""));
        assert!(!is_default_profile_name("Mario"));
        assert!(!is_default_profile_name("PLAYER AB"));
    }

    #[test]
    fn test_load_creates_and_persists_default() {
        let (_dir, mut session) = session();
        assert!(!session.slot_exists(1));
        session.load(1).unwrap();
        assert!(session.slot_exists(1));
        assert_eq!(session.active_slot(), 1);
        assert_eq!(session.active().profile_name, "PLAYER B");
        assert_eq!(session.peek(1).unwrap().as_ref(), Some(session.active()));
    }

    #[test]
    fn test_save_and_reload() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        session.active_mut().levels.push(LevelProgress::new("1-1"));
        session.active_mut().version = 0;
        session.save().unwrap();
        assert_eq!(session.active().version, CURRENT_VERSION);

        let store = session.store().clone();
        let mut other = SaveSession::new(store);
        other.load(0).unwrap();
        assert_eq!(other.active(), session.active());
    }

    #[test]
    fn test_exists_tracks_disk_after_delete() {
        let (_dir, mut session) = session();
        session.load(2).unwrap();
        session.save().unwrap();
        assert!(session.slot_exists(2));

        assert!(session.delete(2).unwrap());
        assert!(!session.slot_exists(2));
        // Active record survives deletion of its own slot
        assert_eq!(session.active().profile_name, "PLAYER C");
        assert_eq!(session.active_slot(), 2);
    }

    #[test]
    fn test_newer_version_is_adopted() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        let path = session.store().path_for("save_slot_0").unwrap();
        fs::write(
            &path,
            r#"{"version": 99, "profileName": "Future", "levels": [{"levelID": "1-1", "highScore": 321}]}"#,
        )
        .unwrap();

        session.load(0).unwrap();
        assert_eq!(session.active().version, 99);
        assert_eq!(session.active().profile_name, "Future");
        assert_eq!(session.active().level("1-1").unwrap().high_score, 321);
        assert!(!session.store().root().join("save_slot_0.corrupt").exists());

        // Rewritten as the current format on the next save
        session.save().unwrap();
        assert_eq!(session.peek(0).unwrap().unwrap().version, CURRENT_VERSION);
    }

    #[test]
    fn test_first_free_slot_fills_gaps() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        session.load(2).unwrap();
        assert_eq!(session.used_slots().unwrap(), vec![0, 2]);
        assert_eq!(session.first_free_slot().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_slot_is_replaced_and_kept() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        let path = session.store().path_for("save_slot_0").unwrap();
        fs::write(&path, "{ truncated").unwrap();

        session.load(0).unwrap();
        assert_eq!(session.active().profile_name, "PLAYER A");
        assert!(session.active().levels.is_empty());
        assert!(session.store().root().join("save_slot_0.corrupt").exists());
        assert!(session.peek(0).unwrap().is_some());
    }

    #[test]
    fn test_summary_arithmetic() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        let record = session.active_mut();
        for id in ["1-1", "1-2"] {
            record.level_or_insert(id).completed = true;
        }
        record.level_or_insert("1-1").perfect = true;

        let summary = session.build_summary(&levels());
        assert_eq!(summary.total_levels, 3);
        assert_eq!(summary.completed_levels, 2);
        assert_eq!(summary.perfect_levels, 1);
        assert!(!summary.reward_all_levels);

        session.active_mut().level_or_insert("1-3").completed = true;
        let summary = session.build_summary(&levels());
        assert!(summary.reward_all_levels);
        assert!(!summary.reward_all_perfect);
        assert_eq!(summary.star_count(), 1);
    }

    #[test]
    fn test_summary_collectibles() {
        let mut record = SaveRecord::new("PLAYER A");
        let level = record.level_or_insert("1-3");
        // More flags than configured; only the first two count
        level.collectibles = vec![true, true, true];
        level.recount();

        let summary = summarize(&record, &levels());
        assert_eq!(summary.collectible_max, 8);
        assert_eq!(summary.collected_total, 2);
        assert!(!summary.reward_all_collectibles);

        let none = summarize(&record, &[LevelConfig::new("1-3", 0)]);
        assert!(!none.reward_all_collectibles);
    }

    #[test]
    fn test_summary_without_levels() {
        let summary = summarize(&SaveRecord::default(), &[]);
        assert_eq!(summary, SaveSummary::default());
        assert_eq!(summary.star_count(), 0);
    }

    #[test]
    fn test_copy_slot_replaces_and_reloads_active() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        session.active_mut().level_or_insert("1-1").high_score = 500;
        session.save().unwrap();

        session.load(1).unwrap();
        session.copy_slot(0, 1).unwrap();
        assert_eq!(session.active_slot(), 1);
        assert_eq!(session.active().level("1-1").unwrap().high_score, 500);

        assert!(matches!(
            session.copy_slot(5, 1),
            Err(SaveError::NotFound { .. })
        ));
        // A failed copy leaves the destination in place
        assert_eq!(session.peek(1).unwrap().unwrap().level("1-1").unwrap().high_score, 500);
        session.copy_slot(1, 1).unwrap();
    }

    #[test]
    fn test_export_then_import_round_trip() {
        let (dir, mut session) = session();
        session.load(0).unwrap();
        session.active_mut().level_or_insert("1-2").best_time_ms = 4200.0;
        session.save().unwrap();

        let exported = session
            .export(0, &dir.path().join("out"), None)
            .unwrap();
        assert!(exported.ends_with("LevelUp_File_0.lvlsave"));

        session.import(2, &exported, true).unwrap();
        assert_eq!(session.active_slot(), 2);
        assert_eq!(session.active().profile_name, "PLAYER C");
        assert_eq!(session.active().level("1-2").unwrap().best_time_ms, 4200.0);
    }

    #[test]
    fn test_export_missing_slot_fails() {
        let (dir, session) = session();
        assert!(session.export(4, dir.path(), Some("nope")).is_err());
    }

    #[test]
    fn test_import_missing_source_leaves_slot_untouched() {
        let (dir, mut session) = session();
        session.load(1).unwrap();
        let path = session.store().path_for("save_slot_1").unwrap();
        let before = fs::read(&path).unwrap();

        let err = session
            .import(1, &dir.path().join("does_not_exist.lvlsave"), true)
            .unwrap_err();
        assert!(matches!(err, SaveError::NotFound { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_import_corrupt_source_leaves_slot_untouched() {
        let (dir, mut session) = session();
        session.load(1).unwrap();
        let path = session.store().path_for("save_slot_1").unwrap();
        let before = fs::read(&path).unwrap();

        let bad = dir.path().join("bad.lvlsave");
        fs::write(&bad, "not a save").unwrap();
        assert!(matches!(
            session.import(1, &bad, true),
            Err(SaveError::Corrupt { .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!session.slot_exists(0));
    }

    #[test]
    fn test_import_without_activate_keeps_active() {
        let (dir, mut session) = session();
        session.load(0).unwrap();
        let source = dir.path().join("friend.lvlsave");
        fs::write(&source, r#"{"version": 1, "profileName": "Luigi"}"#).unwrap();

        session.import(2, &source, false).unwrap();
        assert_eq!(session.active_slot(), 0);
        assert_eq!(session.peek(2).unwrap().unwrap().profile_name, "PLAYER C");
    }
}
