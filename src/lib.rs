//! LevelUp save system - slot-based progress persistence
//!
//! Core modules:
//! - `persistence`: Save record model, JSON codec and file-backed store
//! - `session`: The active slot and its lifecycle (load/save/copy/import/export)
//! - `ledger`: Best-of progress merges and the checkpoint slot
//! - `checkpoint`: Snapshotting live run state at checkpoints
//! - `migration`: One-time conversion of legacy flat settings keys
//! - `prefs`: Flat key-value settings stores
//! - `transfer`: File picker driven import/export
//! - `config`: Save directories and the level table

pub mod checkpoint;
pub mod config;
pub mod ledger;
pub mod migration;
pub mod persistence;
pub mod prefs;
pub mod session;
pub mod transfer;

pub use checkpoint::{CheckpointMarker, CheckpointTracker, LiveRunState, MarkerKind};
pub use config::{LevelConfig, SaveConfig};
pub use ledger::{LevelResult, ProgressLedger, ProgressStore};
pub use migration::{MigrationOutcome, migrate_legacy};
pub use persistence::{FileStore, SaveError, SaveRecord};
pub use prefs::{MemorySettings, SettingsStore};
pub use session::{SaveSession, SaveSummary};
pub use transfer::{TransferController, TransferOutcome};
