//! One-time migration of legacy flat-key progress into a save slot
//!
//! Older builds stored progress as loose keys in the settings store. On
//! first boot of a slot-aware build those keys are folded into the lowest
//! free slot, then a flag key is written so the pass never runs again, even
//! though the legacy keys stay behind.
//!
//! The flag is written last. If anything fails before that, the next boot
//! treats the migration as never having run.

use crate::config::{LevelConfig, collectible_count};
use crate::persistence::{
    CheckpointMode, CheckpointRecord, DEFAULT_LIVES, NO_CHECKPOINT, SaveError, SaveRecord,
};
use crate::prefs::SettingsStore;
use crate::session::SaveSession;

/// Settings key marking the migration as done
pub const MIGRATION_FLAG_KEY: &str = "LegacyProgressMigrated_v1";

/// Legacy key names
pub mod keys {
    pub const SAVED_LEVEL: &str = "SavedLevel";
    pub const SAVED_LIVES: &str = "SavedLives";
    pub const SAVED_COINS: &str = "SavedCoins";
    pub const SAVED_CHECKPOINT: &str = "SavedCheckpoint";
    pub const SAVED_SPEEDRUN_TIME: &str = "SavedSpeedrunTime";
    /// Followed by the collectible index
    pub const SAVED_COLLECTIBLE: &str = "SavedGreenCoin";

    pub const INFINITE_LIVES: &str = "InfiniteLives";
    pub const CHECKPOINTS: &str = "Checkpoints";
    pub const CHECKPOINT_MODE: &str = "CheckpointMode";
    pub const TIME_LIMIT: &str = "TimeLimit";

    pub fn level_completed(level_id: &str) -> String {
        format!("LevelCompleted_{}", level_id)
    }

    pub fn level_perfect(level_id: &str) -> String {
        format!("LevelPerfect_{}", level_id)
    }

    pub fn highest_rank(level_id: &str) -> String {
        format!("HighestPlayerRank_{}", level_id)
    }

    pub fn high_score(level_id: &str) -> String {
        format!("HighScore_{}", level_id)
    }

    pub fn best_time(level_id: &str) -> String {
        format!("BestTimeMs_{}", level_id)
    }

    pub fn collected(index: usize, level_id: &str) -> String {
        format!("CollectedCoin{}_{}", index, level_id)
    }

    pub fn run_collectible(index: usize) -> String {
        format!("{}{}", SAVED_COLLECTIBLE, index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The flag was already set; nothing was read
    AlreadyMigrated,
    /// No legacy keys; the flag is now set
    NothingToMigrate,
    Migrated(MigrationReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub slot: u32,
    pub checkpoint: bool,
    pub levels: usize,
    pub modifiers: bool,
}

/// Which legacy key groups are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegacyGroups {
    pub checkpoint: bool,
    pub levels: bool,
    pub modifiers: bool,
}

impl LegacyGroups {
    pub fn detect<S: SettingsStore + ?Sized>(settings: &S, levels: &[LevelConfig]) -> Self {
        let checkpoint = [
            keys::SAVED_LEVEL,
            keys::SAVED_LIVES,
            keys::SAVED_COINS,
            keys::SAVED_CHECKPOINT,
            keys::SAVED_SPEEDRUN_TIME,
        ]
        .iter()
        .any(|k| settings.has_key(k));

        let levels = levels.iter().any(|config| {
            let id = config.level_id.as_str();
            [
                keys::level_completed(id),
                keys::level_perfect(id),
                keys::highest_rank(id),
                keys::high_score(id),
                keys::best_time(id),
            ]
            .iter()
            .any(|k| settings.has_key(k))
        });

        let modifiers = [
            keys::INFINITE_LIVES,
            keys::CHECKPOINT_MODE,
            keys::CHECKPOINTS,
            keys::TIME_LIMIT,
        ]
        .iter()
        .any(|k| settings.has_key(k));

        Self {
            checkpoint,
            levels,
            modifiers,
        }
    }

    pub fn any(&self) -> bool {
        self.checkpoint || self.levels || self.modifiers
    }
}

/// Run the migration pass if it has not run before
pub fn migrate_legacy<S: SettingsStore + ?Sized>(
    settings: &mut S,
    session: &mut SaveSession,
    levels: &[LevelConfig],
) -> Result<MigrationOutcome, SaveError> {
    if settings.get_flag(MIGRATION_FLAG_KEY) {
        log::debug!("Legacy progress already migrated, skipping");
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    let groups = LegacyGroups::detect(&*settings, levels);
    if !groups.any() {
        log::info!("No legacy progress found, marking as migrated");
        mark_done(settings)?;
        return Ok(MigrationOutcome::NothingToMigrate);
    }

    log::info!(
        "Legacy progress detected (checkpoint: {}, levels: {}, modifiers: {})",
        groups.checkpoint,
        groups.levels,
        groups.modifiers
    );

    let slot = session.first_free_slot()?;
    log::info!("Migrating legacy progress into slot {}", slot);
    session.load(slot)?;

    let record = session.active_mut();
    let checkpoint = groups.checkpoint && convert_checkpoint(&*settings, record, levels);
    let level_count = if groups.levels {
        convert_levels(&*settings, record, levels)
    } else {
        0
    };
    if groups.modifiers {
        convert_modifiers(&*settings, record);
    }

    session.save()?;
    mark_done(settings)?;

    let record = session.active();
    log::info!(
        "Migration completed into slot {} (checkpoint: {} in '{}', modifiers: {:?})",
        slot,
        record.checkpoint.has_checkpoint,
        record.checkpoint.level_id,
        record.modifiers
    );

    Ok(MigrationOutcome::Migrated(MigrationReport {
        slot,
        checkpoint,
        levels: level_count,
        modifiers: groups.modifiers,
    }))
}

fn mark_done<S: SettingsStore + ?Sized>(settings: &mut S) -> Result<(), SaveError> {
    settings.set_int(MIGRATION_FLAG_KEY, 1);
    settings.flush()
}

/// Rebuild the single checkpoint. Returns false when no level was saved.
fn convert_checkpoint<S: SettingsStore + ?Sized>(
    settings: &S,
    record: &mut SaveRecord,
    levels: &[LevelConfig],
) -> bool {
    let level_id = settings.get_string(keys::SAVED_LEVEL).unwrap_or_default();
    let level_id = level_id.trim();
    if level_id.is_empty() || level_id.eq_ignore_ascii_case("none") {
        log::info!("No saved level, skipping checkpoint migration");
        return false;
    }

    let count = collectible_count(levels, level_id);
    let collectibles_in_run = (0..count)
        .map(|i| settings.get_flag(&keys::run_collectible(i)))
        .collect();

    let elapsed = settings
        .get_string(keys::SAVED_SPEEDRUN_TIME)
        .unwrap_or_default();

    record.checkpoint = CheckpointRecord {
        has_checkpoint: true,
        level_id: level_id.to_string(),
        checkpoint_id: settings
            .get_int(keys::SAVED_CHECKPOINT)
            .unwrap_or(NO_CHECKPOINT),
        coins: settings.get_int(keys::SAVED_COINS).unwrap_or(0),
        lives: settings.get_int(keys::SAVED_LIVES).unwrap_or(DEFAULT_LIVES),
        score: 0,
        elapsed_ms: parse_legacy_elapsed(&elapsed),
        collectibles_in_run,
    };

    let cp = &record.checkpoint;
    log::info!(
        "Migrated checkpoint: level={}, lives={}, coins={}, id={}",
        cp.level_id,
        cp.lives,
        cp.coins,
        cp.checkpoint_id
    );
    true
}

/// Merge legacy per-level keys into every configured level.
/// Returns the number of levels visited.
fn convert_levels<S: SettingsStore + ?Sized>(
    settings: &S,
    record: &mut SaveRecord,
    levels: &[LevelConfig],
) -> usize {
    for config in levels {
        let id = config.level_id.as_str();
        let level = record.level_or_insert(id);
        level.resize_collectibles(config.total_collectibles);

        level.completed |= settings.get_flag(&keys::level_completed(id));
        level.perfect |= settings.get_flag(&keys::level_perfect(id));

        if let Some(rank) = settings.get_int(&keys::highest_rank(id)) {
            level.merge_rank(rank);
        }
        if let Some(score) = settings.get_int(&keys::high_score(id)) {
            level.merge_high_score(score);
        }

        let best_key = keys::best_time(id);
        let legacy_best = settings
            .get_string(&best_key)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .or_else(|| settings.get_float(&best_key).map(f64::from))
            .filter(|ms| *ms > 0.0);
        if let Some(ms) = legacy_best {
            level.merge_best_time(ms);
        }

        let legacy_flags: Vec<bool> = (0..level.collectibles.len())
            .map(|i| settings.get_flag(&keys::collected(i, id)))
            .collect();
        level.merge_collectibles(&legacy_flags);

        log::info!(
            "Migrated level '{}': completed={}, perfect={}, rank={}, best={}ms, high score={}, collectibles={}/{}",
            id,
            level.completed,
            level.perfect,
            level.highest_rank,
            level.best_time_ms,
            level.high_score,
            level.collected_count,
            level.collectibles.len()
        );
    }
    levels.len()
}

fn convert_modifiers<S: SettingsStore + ?Sized>(settings: &S, record: &mut SaveRecord) {
    let m = &mut record.modifiers;
    m.infinite_lives_enabled = settings.get_flag(keys::INFINITE_LIVES);
    m.checkpoint_mode = match settings.get_int(keys::CHECKPOINT_MODE) {
        Some(mode) => CheckpointMode::from(mode),
        None if settings.get_flag(keys::CHECKPOINTS) => CheckpointMode::Visual,
        None => CheckpointMode::Off,
    };
    m.infinite_time_enabled = settings.get_flag(keys::TIME_LIMIT);
    log::info!("Migrated modifiers: {:?}", m);
}

/// Parse the legacy elapsed-time string.
///
/// Accepts raw milliseconds, then a `[-][d.]hh:mm[:ss[.fffffff]]`
/// duration. Blank input is 0. Anything else is 1: a time existed but its
/// value is unknown.
pub fn parse_legacy_elapsed(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    if let Ok(ms) = raw.parse::<f64>() {
        if ms.is_finite() {
            return ms;
        }
    }
    parse_duration_ms(raw).unwrap_or(1.0)
}

/// Largest day count a legacy duration string can carry
const MAX_DURATION_DAYS: u64 = 10_675_199;

fn parse_duration_ms(raw: &str) -> Option<f64> {
    let (sign, rest) = match raw.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, raw),
    };

    let parts: Vec<&str> = rest.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let (days, hours) = match parts[0].split_once('.') {
        Some((d, h)) => (parse_digits(d)?, parse_digits(h)?),
        None => (0, parse_digits(parts[0])?),
    };
    let minutes = parse_digits(parts[1])?;
    if days > MAX_DURATION_DAYS || hours > 23 || minutes > 59 {
        return None;
    }

    let seconds = match parts.get(2) {
        Some(field) => {
            let (whole, fraction) = match field.split_once('.') {
                Some((w, f)) => (w, f),
                None => (*field, ""),
            };
            let whole = parse_digits(whole)?;
            if whole > 59 || fraction.len() > 7 {
                return None;
            }
            let fraction = if fraction.is_empty() {
                0.0
            } else {
                parse_digits(fraction)? as f64 / 10f64.powi(fraction.len() as i32)
            };
            whole as f64 + fraction
        }
        None => 0.0,
    };

    let whole_minutes = days
        .checked_mul(24)?
        .checked_add(hours)?
        .checked_mul(60)?
        .checked_add(minutes)?;
    Some(sign * (whole_minutes as f64 * 60.0 + seconds) * 1000.0)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{FileStore, LevelProgress};
    use crate::prefs::{MemorySettings, PrefValue};
    use tempfile::TempDir;

    fn session() -> (TempDir, SaveSession) {
        let dir = TempDir::new().unwrap();
        let session = SaveSession::new(FileStore::new(dir.path().join("Saves")));
        (dir, session)
    }

    fn levels() -> Vec<LevelConfig> {
        vec![LevelConfig::new("1-1", 3), LevelConfig::new("1-2", 2)]
    }

    fn legacy_settings() -> MemorySettings {
        let mut prefs = MemorySettings::new();
        prefs.set_string(keys::SAVED_LEVEL, "1-2");
        prefs.set_int(keys::SAVED_LIVES, 5);
        prefs.set_int(keys::SAVED_COINS, 42);
        prefs.set_int(keys::SAVED_CHECKPOINT, 1);
        prefs.set_string(keys::SAVED_SPEEDRUN_TIME, "00:01:05.5000000");
        prefs.set_int("SavedGreenCoin1", 1);

        prefs.set_int("LevelCompleted_1-1", 1);
        prefs.set_int("LevelPerfect_1-1", 0);
        prefs.set_int("HighestPlayerRank_1-1", 3);
        prefs.set_int("HighScore_1-1", 7_500);
        prefs.set_string("BestTimeMs_1-1", "95000.25");
        prefs.set_int("CollectedCoin0_1-1", 1);
        prefs.set_int("CollectedCoin2_1-1", 1);

        prefs.set_int(keys::INFINITE_LIVES, 1);
        prefs.set_int(keys::CHECKPOINTS, 1);
        prefs
    }

    #[test]
    fn test_flag_short_circuits() {
        let (_dir, mut session) = session();
        let mut prefs = legacy_settings();
        prefs.set_int(MIGRATION_FLAG_KEY, 1);
        let outcome = migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        assert_eq!(outcome, MigrationOutcome::AlreadyMigrated);
        assert!(session.used_slots().unwrap().is_empty());
    }

    #[test]
    fn test_nothing_to_migrate_sets_flag() {
        let (_dir, mut session) = session();
        let mut prefs = MemorySettings::new();
        prefs.set("MasterVolume", PrefValue::Float(0.8));
        let outcome = migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMigrate);
        assert!(prefs.get_flag(MIGRATION_FLAG_KEY));
        assert_eq!(prefs.flush_count(), 1);
        assert!(session.used_slots().unwrap().is_empty());
    }

    #[test]
    fn test_full_migration() {
        let (_dir, mut session) = session();
        let mut prefs = legacy_settings();
        let outcome = migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated(MigrationReport {
                slot: 0,
                checkpoint: true,
                levels: 2,
                modifiers: true,
            })
        );
        assert!(prefs.get_flag(MIGRATION_FLAG_KEY));

        let record = session.peek(0).unwrap().unwrap();
        assert_eq!(record.profile_name, "PLAYER A");

        let cp = &record.checkpoint;
        assert!(cp.has_checkpoint);
        assert_eq!(cp.level_id, "1-2");
        assert_eq!((cp.lives, cp.coins, cp.checkpoint_id), (5, 42, 1));
        assert_eq!(cp.elapsed_ms, 65_500.0);
        assert_eq!(cp.collectibles_in_run, vec![false, true]);

        let level = record.level("1-1").unwrap();
        assert!(level.completed);
        assert!(!level.perfect);
        assert_eq!(level.highest_rank, 3);
        assert_eq!(level.high_score, 7_500);
        assert_eq!(level.best_time_ms, 95_000.25);
        assert_eq!(level.collectibles, vec![true, false, true]);
        assert_eq!(level.collected_count, 2);

        let untouched = record.level("1-2").unwrap();
        assert!(!untouched.completed);
        assert_eq!(untouched.collectibles, vec![false, false]);

        assert!(record.modifiers.infinite_lives_enabled);
        assert_eq!(record.modifiers.checkpoint_mode, CheckpointMode::Visual);
        assert!(!record.modifiers.infinite_time_enabled);
    }

    #[test]
    fn test_second_run_creates_no_slot() {
        let (_dir, mut session) = session();
        let mut prefs = legacy_settings();
        migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        let outcome = migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        assert_eq!(outcome, MigrationOutcome::AlreadyMigrated);
        assert_eq!(session.used_slots().unwrap(), vec![0]);
    }

    #[test]
    fn test_picks_lowest_free_slot() {
        let (_dir, mut session) = session();
        session.load(0).unwrap();
        session.load(2).unwrap();
        let mut prefs = legacy_settings();
        let outcome = migrate_legacy(&mut prefs, &mut session, &levels()).unwrap();
        match outcome {
            MigrationOutcome::Migrated(report) => assert_eq!(report.slot, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(session.active_slot(), 1);
        assert_eq!(session.used_slots().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_checkpoint_mode_prefers_tri_state_key() {
        let mut prefs = MemorySettings::new();
        prefs.set_int(keys::CHECKPOINTS, 1);
        prefs.set_int(keys::CHECKPOINT_MODE, 2);
        prefs.set_int(keys::TIME_LIMIT, 1);
        let mut record = SaveRecord::default();
        convert_modifiers(&prefs, &mut record);
        assert_eq!(record.modifiers.checkpoint_mode, CheckpointMode::Invisible);
        assert!(record.modifiers.infinite_time_enabled);

        let mut prefs = MemorySettings::new();
        prefs.set_int(keys::CHECKPOINTS, 0);
        convert_modifiers(&prefs, &mut record);
        assert_eq!(record.modifiers.checkpoint_mode, CheckpointMode::Off);
    }

    #[test]
    fn test_levels_merge_with_existing_progress() {
        let mut record = SaveRecord::default();
        let mut existing = LevelProgress::new("1-1");
        existing.perfect = true;
        existing.highest_rank = 5;
        existing.high_score = 9_000;
        existing.best_time_ms = 80_000.0;
        existing.collectibles = vec![false, true, false];
        existing.recount();
        record.levels.push(existing);

        let prefs = legacy_settings();
        convert_levels(&prefs, &mut record, &levels());

        let level = record.level("1-1").unwrap();
        assert!(level.completed);
        assert!(level.perfect);
        assert_eq!(level.highest_rank, 5);
        assert_eq!(level.high_score, 9_000);
        assert_eq!(level.best_time_ms, 80_000.0);
        assert_eq!(level.collectibles, vec![true, true, true]);
        assert_eq!(level.collected_count, 3);
    }

    #[test]
    fn test_legacy_time_replaces_unset() {
        let mut prefs = MemorySettings::new();
        prefs.set_string("BestTimeMs_1-1", "120000");
        let mut record = SaveRecord::default();
        convert_levels(&prefs, &mut record, &levels());
        assert_eq!(record.level("1-1").unwrap().best_time_ms, 120_000.0);
    }

    #[test]
    fn test_saved_level_none_skips_checkpoint() {
        let mut prefs = MemorySettings::new();
        prefs.set_string(keys::SAVED_LEVEL, "none");
        prefs.set_int(keys::SAVED_LIVES, 2);
        let mut record = SaveRecord::default();
        assert!(!convert_checkpoint(&prefs, &mut record, &levels()));
        assert!(!record.checkpoint.has_checkpoint);
    }

    #[test]
    fn test_unknown_level_uses_default_collectible_count() {
        let mut prefs = MemorySettings::new();
        prefs.set_string(keys::SAVED_LEVEL, "bonus");
        let mut record = SaveRecord::default();
        assert!(convert_checkpoint(&prefs, &mut record, &levels()));
        assert_eq!(record.checkpoint.collectibles_in_run.len(), 3);
        assert_eq!(record.checkpoint.lives, DEFAULT_LIVES);
        assert_eq!(record.checkpoint.checkpoint_id, NO_CHECKPOINT);
        assert_eq!(record.checkpoint.elapsed_ms, 0.0);
    }

    #[test]
    fn test_failed_save_leaves_flag_unset() {
        let dir = TempDir::new().unwrap();
        // Saves root is a regular file, so every slot write fails
        let blocker = dir.path().join("Saves");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut session = SaveSession::new(FileStore::new(&blocker));

        let mut prefs = legacy_settings();
        assert!(migrate_legacy(&mut prefs, &mut session, &levels()).is_err());
        assert!(!prefs.has_key(MIGRATION_FLAG_KEY));
        assert_eq!(prefs.flush_count(), 0);
    }

    #[test]
    fn test_parse_legacy_elapsed() {
        assert_eq!(parse_legacy_elapsed(""), 0.0);
        assert_eq!(parse_legacy_elapsed("  "), 0.0);
        assert_eq!(parse_legacy_elapsed("12345.5"), 12_345.5);
        assert_eq!(parse_legacy_elapsed("00:02:03"), 123_000.0);
        assert_eq!(parse_legacy_elapsed("00:00:01.25"), 1_250.0);
        assert_eq!(parse_legacy_elapsed("1.02:00:00"), 93_600_000.0);
        assert_eq!(parse_legacy_elapsed("00:10"), 600_000.0);
        assert_eq!(parse_legacy_elapsed("garbage"), 1.0);
        assert_eq!(parse_legacy_elapsed("00:75:00"), 1.0);
        assert_eq!(parse_legacy_elapsed("NaN"), 1.0);
    }

    #[test]
    fn test_parse_legacy_elapsed_huge_day_count() {
        assert_eq!(parse_legacy_elapsed("1000000000000000000.00:00"), 1.0);
        assert_eq!(parse_legacy_elapsed("18446744073709551615.23:59:59"), 1.0);
        assert_eq!(parse_legacy_elapsed("10675200.00:00"), 1.0);
        assert_eq!(
            parse_legacy_elapsed("10675199.00:00"),
            10_675_199.0 * 86_400_000.0
        );
    }

    #[test]
    fn test_non_positive_legacy_time_is_skipped() {
        let mut prefs = MemorySettings::new();
        prefs.set_string("BestTimeMs_1-1", "0");
        prefs.set_string("BestTimeMs_1-2", "-250");
        let mut record = SaveRecord::default();
        record.level_or_insert("1-2").best_time_ms = 90_000.0;
        convert_levels(&prefs, &mut record, &levels());
        assert_eq!(record.level("1-1").unwrap().best_time_ms, 0.0);
        assert_eq!(record.level("1-2").unwrap().best_time_ms, 90_000.0);
    }
}
