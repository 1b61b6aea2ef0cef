//! Slot file persistence
//!
//! Features:
//! - Versioned JSON records, one file per slot
//! - Atomic writes (tmp → rename), never a half-written slot
//! - Corruption detection, with the bad file kept aside for recovery

pub mod codec;
pub mod error;
pub mod record;
pub mod store;

pub use codec::{decode, encode};
pub use error::SaveError;
pub use record::{
    CURRENT_VERSION, CheckpointMode, CheckpointRecord, DEFAULT_LIVES, LevelProgress,
    ModifiersRecord, NO_CHECKPOINT, PlayerRank, RANK_NONE, SaveRecord,
};
pub use store::{FileStore, SAVE_EXTENSION};
