use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::app::ports::{FetchError, TransferError};
use crate::config::ConfigError;
use crate::parser::FilterError;

/// Stage of a single run, used to give fatal errors their context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Gate,
    Filter,
    Pack,
    Transfer,
    Persist,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Gate => "gate",
            Stage::Filter => "filter",
            Stage::Pack => "pack",
            Stage::Transfer => "transfer",
            Stage::Persist => "persist",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal outcome of a run. Best-effort failures never surface here.
#[derive(Error, Debug)]
pub enum RepackError {
    #[error("Configuration invalid: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error("Failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to load channel whitelist '{}': {source}", path.display())]
    Whitelist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: FilterError,
    },

    #[error("Failed to pack '{}' into '{}': {source}", source_path.display(), dest.display())]
    Pack {
        source_path: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload '{}' to '{remote}': {source}", local.display())]
    Transfer {
        local: PathBuf,
        remote: String,
        #[source]
        source: TransferError,
    },

    #[error("I/O error during {stage} on '{}': {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RepackError {
    /// Stage in which the run was aborted.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RepackError::ConfigInvalid(_) => None,
            RepackError::Fetch { .. } => Some(Stage::Acquire),
            RepackError::Whitelist { .. } | RepackError::Parse { .. } => Some(Stage::Filter),
            RepackError::Pack { .. } => Some(Stage::Pack),
            RepackError::Transfer { .. } => Some(Stage::Transfer),
            RepackError::Io { stage, .. } => Some(*stage),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepackError>;
