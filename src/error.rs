use std::{io, path::PathBuf};
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("package not found in index: {0}")]
    NotFound(String),
    #[error("network request failed for {url}: {message}")]
    Network { url: String, message: String },
    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("more than one redirect while downloading {0}")]
    RedirectLimitExceeded(String),
    #[error("archive extraction failed for {name}: {message}")]
    Extraction { name: String, message: String },
    #[error("filesystem operation failed on {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no profile selected")]
    NoProfileSelected,
    #[error("no game path configured for {0}")]
    NoGamePathConfigured(String),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error("unknown mod {mod_id} in profile {profile_id}")]
    UnknownMod { profile_id: String, mod_id: String },
    #[error("failed to persist profiles: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn network(url: &str, message: impl ToString) -> Self {
        EngineError::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// A failure recorded at an item boundary (one package in a batch, subtree, or sync).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ItemFailure {
    pub full_name: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(full_name: impl Into<String>, err: &dyn std::fmt::Display) -> Self {
        Self {
            full_name: full_name.into(),
            message: err.to_string(),
        }
    }
}
