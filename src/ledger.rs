//! Progress ledger: best-of merges and the checkpoint slot of the active record
//!
//! Every operation degrades to a logged no-op when the ledger has no session
//! behind it, so gameplay code can run before persistence is set up.

use crate::persistence::{CheckpointRecord, LevelProgress, PlayerRank, SaveError, SaveRecord};
use crate::session::SaveSession;

/// Targeted progress mutations, independent of where the record lives
pub trait ProgressStore {
    /// Find or append the level entry
    fn get_or_create_level(&mut self, level_id: &str) -> &mut LevelProgress;

    fn try_get_level(&self, level_id: &str) -> Option<&LevelProgress>;

    fn save_high_score_if_better(&mut self, level_id: &str, score: i32) {
        self.get_or_create_level(level_id).merge_high_score(score);
    }

    fn save_best_time_if_better(&mut self, level_id: &str, time_ms: f64) {
        self.get_or_create_level(level_id).merge_best_time(time_ms);
    }

    fn save_rank_if_better(&mut self, level_id: &str, rank: PlayerRank) {
        self.get_or_create_level(level_id).merge_rank(rank.as_i32());
    }

    /// Resize the level's flags to `total` if needed, then set `index`
    fn mark_collectible_collected(&mut self, level_id: &str, index: usize, total: usize) {
        let level = self.get_or_create_level(level_id);
        level.resize_collectibles(total);
        level.mark_collected(index);
    }

    /// The stored checkpoint, only if it is live and belongs to `level_id`
    fn try_get_checkpoint(&self, level_id: &str) -> Option<&CheckpointRecord>;

    /// Replace the slot's checkpoint wholesale
    fn save_checkpoint(&mut self, checkpoint: CheckpointRecord);

    /// Mark the checkpoint as gone. Other fields are left stale.
    fn clear_checkpoint(&mut self);

    fn save(&mut self) -> Result<(), SaveError>;
}

/// What a finished run reports
#[derive(Debug, Clone, Default)]
pub struct LevelResult {
    pub perfect: bool,
    pub rank: PlayerRank,
    /// Only speedrun-timed runs report a time
    pub time_ms: Option<f64>,
    pub score: i32,
    pub collectibles_in_run: Vec<bool>,
}

/// Which records a completion improved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionOutcome {
    pub new_best_time: bool,
    pub new_high_score: bool,
    pub new_rank: bool,
    pub checkpoint_cleared: bool,
}

/// [`ProgressStore`] over the active record of a [`SaveSession`]
#[derive(Debug)]
pub struct ProgressLedger<'a> {
    session: Option<&'a mut SaveSession>,
    // Handed out by get_or_create_level when detached; never persisted
    scratch: LevelProgress,
}

impl<'a> ProgressLedger<'a> {
    pub fn new(session: &'a mut SaveSession) -> Self {
        Self {
            session: Some(session),
            scratch: LevelProgress::new(""),
        }
    }

    /// A ledger with nothing behind it; all writes are dropped
    pub fn detached() -> Self {
        Self {
            session: None,
            scratch: LevelProgress::new(""),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    fn record(&self) -> Option<&SaveRecord> {
        self.session.as_deref().map(SaveSession::active)
    }

    fn record_mut(&mut self) -> Option<&mut SaveRecord> {
        self.session.as_deref_mut().map(SaveSession::active_mut)
    }

    /// Fold a finished run into the level's permanent progress and persist.
    ///
    /// The checkpoint is cleared only when it belongs to this level.
    pub fn record_completion(
        &mut self,
        level_id: &str,
        result: &LevelResult,
    ) -> Result<CompletionOutcome, SaveError> {
        if !self.is_attached() {
            log::warn!("No active save; completion of '{}' not recorded", level_id);
            return Ok(CompletionOutcome::default());
        }

        let total = result.collectibles_in_run.len();
        for (index, collected) in result.collectibles_in_run.iter().enumerate() {
            if *collected {
                self.mark_collectible_collected(level_id, index, total);
            }
        }

        let mut outcome = CompletionOutcome::default();
        let level = self.get_or_create_level(level_id);
        level.completed = true;
        level.perfect |= result.perfect;
        outcome.new_rank = level.merge_rank(result.rank.as_i32());
        if let Some(time_ms) = result.time_ms {
            outcome.new_best_time = level.merge_best_time(time_ms);
        }
        outcome.new_high_score = level.merge_high_score(result.score);

        if self.try_get_checkpoint(level_id).is_some() {
            self.clear_checkpoint();
            outcome.checkpoint_cleared = true;
        }

        self.save()?;
        log::info!(
            "Level '{}' completed (perfect: {}, best time: {}, high score: {})",
            level_id,
            result.perfect,
            outcome.new_best_time,
            outcome.new_high_score
        );
        Ok(outcome)
    }
}

impl ProgressStore for ProgressLedger<'_> {
    fn get_or_create_level(&mut self, level_id: &str) -> &mut LevelProgress {
        match self.session.as_deref_mut() {
            Some(session) => session.active_mut().level_or_insert(level_id),
            None => {
                log::warn!("No active save; progress for '{}' will not be persisted", level_id);
                self.scratch = LevelProgress::new(level_id);
                &mut self.scratch
            }
        }
    }

    fn try_get_level(&self, level_id: &str) -> Option<&LevelProgress> {
        self.record()?.level(level_id)
    }

    fn try_get_checkpoint(&self, level_id: &str) -> Option<&CheckpointRecord> {
        let record = self.record()?;
        record
            .has_checkpoint_for(level_id)
            .then_some(&record.checkpoint)
    }

    fn save_checkpoint(&mut self, checkpoint: CheckpointRecord) {
        let Some(record) = self.record_mut() else {
            return;
        };
        record.checkpoint = CheckpointRecord {
            has_checkpoint: true,
            ..checkpoint
        };
    }

    fn clear_checkpoint(&mut self) {
        if let Some(record) = self.record_mut() {
            record.checkpoint.has_checkpoint = false;
            record.checkpoint.level_id.clear();
        }
    }

    fn save(&mut self) -> Result<(), SaveError> {
        match self.session.as_deref_mut() {
            Some(session) => session.save(),
            None => Ok(()),
        }
    }
}
