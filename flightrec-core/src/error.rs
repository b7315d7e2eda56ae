//! Error taxonomy for control operations.

use std::fmt;

use thiserror::Error;

use crate::recorder::RecorderError;
use crate::units::{RejectedDuration, RejectedSize, UnitError};

/// Errors returned by [`ControlService`](crate::ControlService) operations
/// and by decoding of update requests.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("flight recorder is already running")]
    AlreadyRunning,
    #[error("flight recorder is not running")]
    NotRunning,
    #[error("flight recorder snapshot already in progress")]
    SnapshotInProgress,
    #[error("{}", RejectedDuration(.0))]
    InvalidDuration(String),
    #[error("{}", RejectedSize(.0))]
    InvalidSize(String),
    #[error("flight recorder failed: {0}")]
    Recorder(#[source] RecorderError),
    #[error("failed to write snapshot: {0}")]
    WriteFailed(#[source] RecorderError),
}

/// Coarse classification of a [`ControlError`], used by transports to pick a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller sent a value that cannot be decoded.
    InvalidInput,
    /// The operation conflicts with the current running state.
    Conflict,
    /// A snapshot export is already active; retrying later may succeed.
    Busy,
    /// The recorder itself failed.
    Internal,
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDuration(_) | Self::InvalidSize(_) => ErrorKind::InvalidInput,
            Self::AlreadyRunning | Self::NotRunning => ErrorKind::Conflict,
            Self::SnapshotInProgress => ErrorKind::Busy,
            Self::Recorder(_) | Self::WriteFailed(_) => ErrorKind::Internal,
        }
    }

    /// Only a concurrent snapshot export is transient.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Busy
    }
}

impl From<UnitError> for ControlError {
    fn from(err: UnitError) -> Self {
        match err {
            UnitError::InvalidDuration(literal) => Self::InvalidDuration(literal),
            UnitError::InvalidSize(literal) => Self::InvalidSize(literal),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid input"),
            Self::Conflict => write!(f, "conflicting state"),
            Self::Busy => write!(f, "resource busy"),
            Self::Internal => write!(f, "internal failure"),
        }
    }
}
