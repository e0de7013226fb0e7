//! Error taxonomy for the sync engine.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// A single failed request attempt: network failure, timeout, bad status or
/// an undecodable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "upstream returned status {}: {}", code, self.message),
            None => write!(f, "upstream request failed: {}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Raw `TransportError`s stay inside the retry layer; this is the only
    /// way a failed request surfaces.
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: TransportError },

    #[error("malformed game record: {0}")]
    MalformedRecord(String),

    #[error("could not resolve team: {0}")]
    TeamResolution(String),

    #[error("no current season configured")]
    NoCurrentSeason,

    #[error("season {0} not found")]
    SeasonNotFound(Uuid),

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),

    #[error("sync cancelled")]
    Cancelled,

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    /// Errors that abort a whole entry point rather than a single week.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::NoCurrentSeason | SyncError::SeasonNotFound(_) | SyncError::Cancelled
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
