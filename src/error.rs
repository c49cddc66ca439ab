//! Error taxonomy for the brain and its storage.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("brain document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("`{table}` has no entry for action `{action}`")]
    MissingAction { table: &'static str, action: &'static str },

    #[error("unknown action `{name}`")]
    UnknownAction { name: String },

    #[error("weight for `{action}` is {value}, expected a finite value >= {floor}")]
    InvalidWeight { action: &'static str, value: f64, floor: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("persistence worker has stopped")]
    WorkerStopped,
}

impl BrainError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BrainError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the stored document exists but cannot be trusted.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            BrainError::Parse(_)
                | BrainError::MissingAction { .. }
                | BrainError::UnknownAction { .. }
                | BrainError::InvalidWeight { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BrainError>;
