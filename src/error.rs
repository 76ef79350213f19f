//! Error types for the quiz core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by stores, analyzers and the [`QuizSystem`](crate::QuizSystem) facade.
///
/// Absence (unknown question id, user without history) is never an error;
/// those cases come back as `None` or an empty collection.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The underlying SQLite database failed. Never retried by the core.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored row could not be decoded.
    #[error("corrupt record for question {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A call argument was rejected before touching any state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`QuizConfig`](crate::QuizConfig).
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl QuizError {
    /// Returns `true` for failures of the storage collaborator, as opposed to
    /// caller mistakes.
    pub fn is_storage(&self) -> bool {
        matches!(self, QuizError::Storage(_) | QuizError::Corrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;
