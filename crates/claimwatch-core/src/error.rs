//! Error types for claim tracking
//!
//! Nothing here is fatal: every variant describes a degraded outcome that the
//! caller logs and survives.

use std::path::PathBuf;

use thiserror::Error;

use crate::OwnerId;

/// Core claimwatch errors
#[derive(Error, Debug)]
pub enum ClaimError {
    // Persistence errors
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Collaborator errors
    #[error("Name lookup failed for owner {owner}: {reason}")]
    NameResolution { owner: OwnerId, reason: String },

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

impl ClaimError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ClaimError::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClaimError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for claimwatch operations
pub type ClaimResult<T> = Result<T, ClaimError>;
