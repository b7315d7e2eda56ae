//! Recorder capability.
//!
//! The control service never samples anything itself. It delegates to a
//! [`Recorder`], a continuously-overwriting buffer of recent trace events that
//! can be exported on demand. Implementations live outside this crate (the
//! server ships an in-process ring recorder); tests use doubles.
//!
//! # Calling Convention
//!
//! The service serializes calls: `start`, `stop`, `set_period` and `set_size`
//! are only invoked under an exclusive lock, while `enabled` and
//! `write_snapshot` may be invoked concurrently from several readers. An
//! implementation must therefore make `write_snapshot` safe against itself and
//! report [`RecorderError::SnapshotActive`] when a second export overlaps the
//! first, instead of interleaving output.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Error reported by a [`Recorder`].
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("recorder is already enabled")]
    AlreadyEnabled,
    #[error("recorder is not enabled")]
    NotEnabled,
    #[error("cannot allocate a {requested} byte buffer")]
    Allocation { requested: usize },
    #[error("snapshot already active")]
    SnapshotActive,
    #[error("I/O operation failed: {0}")]
    Io(#[from] io::Error),
}

/// A flight recorder: a bounded ring of recent trace events.
pub trait Recorder: Send + Sync {
    /// Whether the recorder is currently capturing.
    fn enabled(&self) -> bool;

    /// Begin capturing with the most recently set period and size.
    fn start(&mut self) -> Result<(), RecorderError>;

    /// Stop capturing.
    fn stop(&mut self) -> Result<(), RecorderError>;

    /// Approximate time span the ring should represent.
    fn set_period(&mut self, period: Duration);

    /// Approximate upper bound on buffered bytes. Takes precedence over the period.
    fn set_size(&mut self, size: usize);

    /// Export the current buffer contents, returning the number of bytes written.
    fn write_snapshot(&self, sink: &mut dyn io::Write) -> Result<u64, RecorderError>;
}
