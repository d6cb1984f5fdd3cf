//! Error taxonomy for the fetch tools.

use crate::types::Apid;
use thiserror::Error;

/// Errors surfaced by the store, the drivers and the output sinks.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Record source failure (connection lost, bad statement, corrupt row).
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Windowed frame lookup failed.
    #[error("Frame lookup failed: {0}")]
    Lookup(String),

    /// Time-correlation packet body could not be decoded.
    #[error("Cannot decode time correlation packet: {reason}")]
    Decode { reason: String },

    /// Packet handed to the resolver is not a time-correlation packet.
    #[error("Packet APID {apid} is not the time correlation APID {expected}")]
    NotTimeCorrelation { apid: Apid, expected: Apid },

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output sink failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Blocking worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    /// True for failures that only affect a single time-correlation packet.
    pub fn is_per_packet(&self) -> bool {
        matches!(
            self,
            FetchError::Decode { .. } | FetchError::NotTimeCorrelation { .. }
        )
    }
}
