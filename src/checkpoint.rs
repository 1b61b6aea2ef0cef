//! Checkpoint snapshot protocol for a running level
//!
//! Touching a checkpoint freezes the run's values at that instant. Later
//! saves replay the frozen values, so score or coins earned after the touch
//! never leak into the persisted checkpoint. Lives are the exception and
//! always come from the live run.

use glam::Vec2;

use crate::ledger::ProgressStore;
use crate::persistence::{
    CheckpointMode, CheckpointRecord, DEFAULT_LIVES, ModifiersRecord, NO_CHECKPOINT, SaveError,
};

/// Mutable values of the run in progress
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRunState {
    /// Active checkpoint id, if any
    pub checkpoint: Option<i32>,
    pub coins: i32,
    pub lives: i32,
    pub score: i32,
    pub elapsed_ms: f64,
    pub collectibles_in_run: Vec<bool>,
}

impl Default for LiveRunState {
    fn default() -> Self {
        Self {
            checkpoint: None,
            coins: 0,
            lives: DEFAULT_LIVES,
            score: 0,
            elapsed_ms: 0.0,
            collectibles_in_run: Vec::new(),
        }
    }
}

impl LiveRunState {
    pub fn new(collectible_total: usize) -> Self {
        Self {
            collectibles_in_run: vec![false; collectible_total],
            ..Default::default()
        }
    }
}

/// Values frozen at the moment a checkpoint was touched
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSnapshot {
    pub checkpoint_id: i32,
    pub coins: i32,
    pub score: i32,
    pub elapsed_ms: f64,
    pub collectibles_in_run: Vec<bool>,
}

impl CheckpointSnapshot {
    fn capture(checkpoint_id: i32, live: &LiveRunState) -> Self {
        Self {
            checkpoint_id,
            coins: live.coins,
            score: live.score,
            elapsed_ms: live.elapsed_ms,
            collectibles_in_run: live.collectibles_in_run.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Drawn as a flag in the level
    Visual,
    /// Trigger volume only
    Invisible,
}

/// A checkpoint placed in the level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointMarker {
    pub id: i32,
    pub spawn: Vec2,
    pub kind: MarkerKind,
}

impl CheckpointMarker {
    pub fn new(id: i32, spawn: Vec2, kind: MarkerKind) -> Self {
        Self { id, spawn, kind }
    }
}

/// Per-level checkpoint bookkeeping
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    level_id: String,
    mode: CheckpointMode,
    markers: Vec<CheckpointMarker>,
    snapshot: Option<CheckpointSnapshot>,
}

impl CheckpointTracker {
    pub fn new(level_id: impl Into<String>, modifiers: &ModifiersRecord) -> Self {
        Self {
            level_id: level_id.into(),
            mode: modifiers.checkpoint_mode,
            markers: Vec::new(),
            snapshot: None,
        }
    }

    pub fn level_id(&self) -> &str {
        &self.level_id
    }

    pub fn mode(&self) -> CheckpointMode {
        self.mode
    }

    pub fn enabled(&self) -> bool {
        self.mode.enabled()
    }

    pub fn snapshot(&self) -> Option<&CheckpointSnapshot> {
        self.snapshot.as_ref()
    }

    /// Whether a marker of `kind` should be drawn in the current mode
    pub fn is_marker_shown(&self, kind: MarkerKind) -> bool {
        self.mode == CheckpointMode::Visual && kind == MarkerKind::Visual
    }

    /// Add a marker, replacing any with the same id
    pub fn register(&mut self, marker: CheckpointMarker) {
        match self.markers.iter_mut().find(|m| m.id == marker.id) {
            Some(existing) => *existing = marker,
            None => self.markers.push(marker),
        }
    }

    pub fn unregister(&mut self, id: i32) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        self.markers.len() != before
    }

    pub fn markers(&self) -> &[CheckpointMarker] {
        &self.markers
    }

    /// Player reached checkpoint `id`: activate it, freeze the run values
    /// and persist. Returns false when checkpoints are turned off.
    pub fn touch<P: ProgressStore + ?Sized>(
        &mut self,
        ledger: &mut P,
        live: &mut LiveRunState,
        id: i32,
    ) -> Result<bool, SaveError> {
        if !self.enabled() {
            log::debug!("Checkpoints disabled, ignoring touch of {}", id);
            return Ok(false);
        }
        live.checkpoint = Some(id);
        self.snapshot = Some(CheckpointSnapshot::capture(id, live));
        log::info!(
            "Checkpoint {} touched in '{}' (coins: {}, score: {})",
            id,
            self.level_id,
            live.coins,
            live.score
        );
        self.save_current_checkpoint(ledger, live)
    }

    /// Persist the active checkpoint from the frozen snapshot.
    ///
    /// With no snapshot yet (e.g. right after restoring from disk) one is
    /// taken from the live values. Returns false when no checkpoint is active.
    pub fn save_current_checkpoint<P: ProgressStore + ?Sized>(
        &mut self,
        ledger: &mut P,
        live: &LiveRunState,
    ) -> Result<bool, SaveError> {
        let Some(id) = live.checkpoint else {
            return Ok(false);
        };
        let snapshot = self.snapshot.get_or_insert_with(|| {
            log::debug!("No snapshot for checkpoint {}, capturing live values", id);
            CheckpointSnapshot::capture(id, live)
        });

        ledger.save_checkpoint(CheckpointRecord {
            has_checkpoint: true,
            level_id: self.level_id.clone(),
            checkpoint_id: snapshot.checkpoint_id,
            coins: snapshot.coins,
            lives: live.lives,
            score: snapshot.score,
            elapsed_ms: snapshot.elapsed_ms,
            collectibles_in_run: snapshot.collectibles_in_run.clone(),
        });
        ledger.save()?;
        Ok(true)
    }

    /// Rebuild the live run from the stored checkpoint. Without one for this
    /// level the run falls back to a fresh start. Returns whether a
    /// checkpoint was applied.
    pub fn restore<P: ProgressStore + ?Sized>(
        &mut self,
        ledger: &P,
        live: &mut LiveRunState,
    ) -> bool {
        self.snapshot = None;
        let Some(cp) = ledger.try_get_checkpoint(&self.level_id) else {
            log::debug!("No checkpoint for '{}', starting fresh", self.level_id);
            live.checkpoint = None;
            live.coins = 0;
            live.score = 0;
            return false;
        };

        live.checkpoint = (cp.checkpoint_id != NO_CHECKPOINT).then_some(cp.checkpoint_id);
        live.coins = cp.coins;
        live.lives = cp.lives;
        live.score = cp.score;
        live.elapsed_ms = cp.elapsed_ms;
        if !cp.collectibles_in_run.is_empty() {
            live.collectibles_in_run = cp.collectibles_in_run.clone();
        }
        log::info!(
            "Restored checkpoint {} in '{}' (lives: {}, coins: {}, score: {})",
            cp.checkpoint_id,
            self.level_id,
            cp.lives,
            cp.coins,
            cp.score
        );
        true
    }

    /// Spawn point of the active checkpoint. Only an exact id match counts.
    pub fn respawn_position(&self, live: &LiveRunState) -> Option<Vec2> {
        if !self.enabled() {
            return None;
        }
        let id = live.checkpoint?;
        let marker = self.markers.iter().find(|m| m.id == id);
        if marker.is_none() {
            log::warn!("Active checkpoint {} has no marker in '{}'", id, self.level_id);
        }
        marker.map(|m| m.spawn)
    }

    /// Drop the checkpoint from the ledger and the live run
    pub fn clear<P: ProgressStore + ?Sized>(
        &mut self,
        ledger: &mut P,
        live: &mut LiveRunState,
    ) -> Result<(), SaveError> {
        ledger.clear_checkpoint();
        ledger.save()?;
        live.checkpoint = None;
        self.snapshot = None;
        log::info!("Checkpoint cleared for '{}'", self.level_id);
        Ok(())
    }
}
