//! On-disk save record types
//!
//! One [`SaveRecord`] per slot, stored with camelCase field names. Missing
//! fields fall back to their defaults or sentinels.

use serde::{Deserialize, Serialize};

/// Current on-disk format version, stamped on every save
pub const CURRENT_VERSION: u32 = 1;

/// `highest_rank` sentinel: no rank recorded yet
pub const RANK_NONE: i32 = -1;

/// `checkpoint_id` sentinel: no checkpoint reached
pub const NO_CHECKPOINT: i32 = -1;

/// Lives a run starts with when nothing else is known
pub const DEFAULT_LIVES: i32 = 3;

fn rank_none() -> i32 {
    RANK_NONE
}

fn no_checkpoint() -> i32 {
    NO_CHECKPOINT
}

/// Root record for one save slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub profile_name: String,
    /// Unique by `level_id`, in first-seen order
    #[serde(default)]
    pub levels: Vec<LevelProgress>,
    /// Single, slot-global checkpoint
    #[serde(default)]
    pub checkpoint: CheckpointRecord,
    #[serde(default)]
    pub modifiers: ModifiersRecord,
}

impl Default for SaveRecord {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            profile_name: String::new(),
            levels: Vec::new(),
            checkpoint: CheckpointRecord::default(),
            modifiers: ModifiersRecord::default(),
        }
    }
}

impl SaveRecord {
    /// Fresh record for a named profile
    pub fn new(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
            ..Self::default()
        }
    }

    /// Progress entry for `level_id`, if one exists
    pub fn level(&self, level_id: &str) -> Option<&LevelProgress> {
        self.levels.iter().find(|l| l.level_id == level_id)
    }

    /// Mutable progress entry for `level_id`, if one exists
    pub fn level_mut(&mut self, level_id: &str) -> Option<&mut LevelProgress> {
        self.levels.iter_mut().find(|l| l.level_id == level_id)
    }

    /// Find or append the progress entry for `level_id`
    pub fn level_or_insert(&mut self, level_id: &str) -> &mut LevelProgress {
        let index = match self.levels.iter().position(|l| l.level_id == level_id) {
            Some(i) => i,
            None => {
                self.levels.push(LevelProgress::new(level_id));
                self.levels.len() - 1
            }
        };
        &mut self.levels[index]
    }

    /// Whether the slot-global checkpoint belongs to `level_id`
    pub fn has_checkpoint_for(&self, level_id: &str) -> bool {
        self.checkpoint.has_checkpoint && self.checkpoint.level_id == level_id
    }
}

/// Per-level permanent progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    #[serde(rename = "levelID")]
    pub level_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub perfect: bool,
    /// [`RANK_NONE`] until a rank is earned
    #[serde(default = "rank_none")]
    pub highest_rank: i32,
    /// 0 means unset
    #[serde(default)]
    pub best_time_ms: f64,
    #[serde(default)]
    pub high_score: i32,
    #[serde(default)]
    pub collectibles: Vec<bool>,
    /// Derived from `collectibles`; see [`LevelProgress::recount`]
    #[serde(default)]
    pub collected_count: u32,
}

impl LevelProgress {
    /// Empty progress with unset sentinels
    pub fn new(level_id: impl Into<String>) -> Self {
        Self {
            level_id: level_id.into(),
            completed: false,
            perfect: false,
            highest_rank: RANK_NONE,
            best_time_ms: 0.0,
            high_score: 0,
            collectibles: Vec::new(),
            collected_count: 0,
        }
    }

    /// Keep the larger score. Returns true if the stored value changed.
    pub fn merge_high_score(&mut self, score: i32) -> bool {
        if score > self.high_score {
            self.high_score = score;
            true
        } else {
            false
        }
    }

    /// Keep the faster time. An unset (0) best accepts any time; NaN is
    /// ignored. Returns true if the stored value changed.
    pub fn merge_best_time(&mut self, time_ms: f64) -> bool {
        if time_ms.is_nan() {
            return false;
        }
        if self.best_time_ms == 0.0 || time_ms < self.best_time_ms {
            let changed = self.best_time_ms != time_ms;
            self.best_time_ms = time_ms;
            changed
        } else {
            false
        }
    }

    /// Keep the higher rank. Returns true if the stored value changed.
    pub fn merge_rank(&mut self, rank: i32) -> bool {
        if rank > self.highest_rank {
            self.highest_rank = rank;
            true
        } else {
            false
        }
    }

    /// Resize the collectible flags to `total`, keeping set flags that fit
    pub fn resize_collectibles(&mut self, total: usize) {
        if self.collectibles.len() != total {
            self.collectibles.resize(total, false);
            self.recount();
        }
    }

    /// Set flag `index`. Out-of-range indices are ignored.
    pub fn mark_collected(&mut self, index: usize) -> bool {
        match self.collectibles.get_mut(index) {
            Some(flag) => {
                *flag = true;
                self.recount();
                true
            }
            None => false,
        }
    }

    /// OR another flag array into this one, index by index
    pub fn merge_collectibles(&mut self, other: &[bool]) {
        for (mine, theirs) in self.collectibles.iter_mut().zip(other) {
            *mine |= *theirs;
        }
        self.recount();
    }

    /// Recompute `collected_count` from the flags
    pub fn recount(&mut self) {
        self.collected_count = self.collectibles.iter().filter(|c| **c).count() as u32;
    }
}

/// The single in-progress checkpoint of a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    #[serde(default)]
    pub has_checkpoint: bool,
    #[serde(rename = "levelID", default)]
    pub level_id: String,
    #[serde(default = "no_checkpoint")]
    pub checkpoint_id: i32,
    #[serde(default)]
    pub coins: i32,
    #[serde(default)]
    pub lives: i32,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub elapsed_ms: f64,
    #[serde(default)]
    pub collectibles_in_run: Vec<bool>,
}

impl Default for CheckpointRecord {
    fn default() -> Self {
        Self {
            has_checkpoint: false,
            level_id: String::new(),
            checkpoint_id: NO_CHECKPOINT,
            coins: 0,
            lives: 0,
            score: 0,
            elapsed_ms: 0.0,
            collectibles_in_run: Vec::new(),
        }
    }
}

/// How checkpoints behave in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CheckpointMode {
    /// No checkpoints at all
    #[default]
    Off,
    /// Visible checkpoint flags
    Visual,
    /// Hidden checkpoint triggers
    Invisible,
}

impl CheckpointMode {
    /// Checkpoints exist in any mode but `Off`
    pub fn enabled(self) -> bool {
        self != CheckpointMode::Off
    }

    /// Stored value (0..=2)
    pub fn as_i32(self) -> i32 {
        match self {
            CheckpointMode::Off => 0,
            CheckpointMode::Visual => 1,
            CheckpointMode::Invisible => 2,
        }
    }
}

/// Out-of-range values clamp into `0..=2`
impl From<i32> for CheckpointMode {
    fn from(value: i32) -> Self {
        match value.clamp(0, 2) {
            0 => CheckpointMode::Off,
            1 => CheckpointMode::Visual,
            _ => CheckpointMode::Invisible,
        }
    }
}

impl From<CheckpointMode> for i32 {
    fn from(mode: CheckpointMode) -> Self {
        mode.as_i32()
    }
}

/// Difficulty modifiers chosen for the profile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiersRecord {
    #[serde(default)]
    pub infinite_lives_enabled: bool,
    #[serde(default)]
    pub checkpoint_mode: CheckpointMode,
    #[serde(default)]
    pub infinite_time_enabled: bool,
}

/// End-of-level rank, stored as its ordinal in `highest_rank`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PlayerRank {
    #[default]
    Default,
    D,
    C,
    B,
    A,
    S,
}

impl PlayerRank {
    /// Minimum score for each rank, best first
    const THRESHOLDS: [(i32, PlayerRank); 5] = [
        (10_000, PlayerRank::S),
        (9_000, PlayerRank::A),
        (7_000, PlayerRank::B),
        (5_000, PlayerRank::C),
        (3_000, PlayerRank::D),
    ];

    /// Rank earned by a final score
    pub fn from_score(score: i32) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, rank)| *rank)
            .unwrap_or(PlayerRank::Default)
    }

    /// Stored ordinal (0..=5)
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decode a stored rank. [`RANK_NONE`] and unknown values map to `None`.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(PlayerRank::Default),
            1 => Some(PlayerRank::D),
            2 => Some(PlayerRank::C),
            3 => Some(PlayerRank::B),
            4 => Some(PlayerRank::A),
            5 => Some(PlayerRank::S),
            _ => None,
        }
    }

    /// Letter shown on the results screen
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerRank::Default => "?",
            PlayerRank::D => "D",
            PlayerRank::C => "C",
            PlayerRank::B => "B",
            PlayerRank::A => "A",
            PlayerRank::S => "S",
        }
    }
}
