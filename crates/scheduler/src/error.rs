//! Error taxonomy at the snapshot-execution boundary
//!
//! Nothing below that boundary is allowed to terminate the long-running
//! scheduler tasks; every variant here is logged and survived, except
//! `ConfigError`, which is rejected before any task starts.

use std::time::Duration;

use snap_core::ArchiveError;
use thiserror::Error;

/// Configuration the scheduler cannot run with; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "max staleness period {max:?} must be strictly greater than the quiet period {min:?}"
    )]
    StalenessNotAboveQuiet { min: Duration, max: Duration },
}

/// Tree read or change-stream connection failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no configured endpoint responded")]
    Unavailable,
    #[error("store request timed out")]
    Timeout,
    #[error("malformed store response: {0}")]
    Decode(String),
}

/// Archive write or upload failure
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("archive write failed: {0}")]
    WriteFailed(String),
}

/// Failure of one read-serialize-sink sequence
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}
