//! Error types for synchronization runs.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a run was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Scan,
    Negotiation,
    Transfer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Scan => "scan",
            Stage::Negotiation => "negotiation",
            Stage::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote agent unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote protocol error: {0}")]
    RemoteProtocol(String),

    #[error("Synchronization failed during {stage}: {source}")]
    SyncFailed {
        stage: Stage,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the stage it aborted. Already-wrapped errors keep their stage.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            SyncError::SyncFailed { .. } => self,
            other => SyncError::SyncFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage recorded on an aggregated failure.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SyncError::SyncFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error, looking through the stage wrapper.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::SyncFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            SyncError::Configuration(format!("invalid request: {}", e))
        } else if e.is_decode() {
            SyncError::RemoteProtocol(format!("undecodable response: {}", e))
        } else {
            SyncError::RemoteUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::RemoteProtocol(format!("malformed payload: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
