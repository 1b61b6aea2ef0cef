use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Corrupt save data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("File already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid save name: {name:?}")]
    InvalidName { name: String },

    #[error("Settings store error: {0}")]
    Settings(String),

    #[error("Another import/export is already in progress")]
    TransferBusy,
}

impl SaveError {
    /// Whether the caller can reasonably retry or fall back
    pub fn is_recoverable(&self) -> bool {
        match self {
            SaveError::Io(_) => true,
            SaveError::NotFound { .. } => true,
            SaveError::AlreadyExists { .. } => true,
            SaveError::TransferBusy => true,
            // A fresh default record can replace it
            SaveError::Corrupt { .. } => true,
            SaveError::Encode(_) => false,
            SaveError::InvalidName { .. } => false,
            SaveError::Settings(_) => false,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        SaveError::Corrupt {
            path: path.into(),
            source,
        }
    }
}
