//! Error types for the Gwent tracker

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt savegame at byte {offset}: {reason}")]
    CorruptSavegame { offset: usize, reason: String },

    #[error("Unexpected savegame layout: {0}")]
    UnexpectedLayout(String),

    #[error("Catalog parse error in {}: {reason}", path.display())]
    CatalogParse { path: PathBuf, reason: String },

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TrackerError {
    pub fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        TrackerError::CorruptSavegame {
            offset,
            reason: reason.into(),
        }
    }

    pub fn layout(reason: impl Into<String>) -> Self {
        TrackerError::UnexpectedLayout(reason.into())
    }

    /// True when the file parsed but its shape no longer matches what the
    /// extractor knows about, as opposed to the bytes themselves being broken.
    pub fn is_format_drift(&self) -> bool {
        matches!(self, TrackerError::UnexpectedLayout(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
