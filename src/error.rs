use crate::competitor::{Identity, Mode};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0} already exists")]
    DuplicateRegistration(Identity),

    #[error("{0} is not registered")]
    UnknownCompetitor(Identity),

    #[error("invalid score {input:?}: expected a non-negative whole number")]
    InvalidScore { input: String },

    #[error("invalid name: {reason}")]
    InvalidName { reason: String },

    #[error("{0} cannot play against itself")]
    SelfMatch(Identity),

    #[error("expected a {expected} competitor, found a {found} one")]
    ModeMismatch { expected: Mode, found: Mode },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("malformed workbook {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("save rejected by storage backend")]
    Unavailable,
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
