//! Control service: concurrency-safe state wrapper around a [`Recorder`].
//!
//! The service owns one recorder and the desired [`RecorderConfig`]. All state
//! lives behind a single read/write lock:
//!
//! | Operation  | Lock      | Fails with                                        |
//! |------------|-----------|---------------------------------------------------|
//! | `status`   | shared    | never                                             |
//! | `start`    | exclusive | `AlreadyRunning`, `Recorder`                      |
//! | `stop`     | exclusive | `NotRunning`, `Recorder`                          |
//! | `update`   | exclusive | never                                             |
//! | `snapshot` | shared    | `NotRunning`, `SnapshotInProgress`, `WriteFailed` |
//!
//! Running state is not stored here; it is read from [`Recorder::enabled`].

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ConfigUpdate, RecorderConfig, StatusView};
use crate::error::ControlError;
use crate::recorder::{Recorder, RecorderError};

struct ServiceInner<R> {
    recorder: R,
    config: RecorderConfig,
}

/// Remote-controllable front end for a flight recorder.
///
/// Construct one per process and share it by handle (`Arc<ControlService<_>>`).
pub struct ControlService<R: Recorder> {
    inner: RwLock<ServiceInner<R>>,
}

impl<R: Recorder> ControlService<R> {
    /// Wrap `recorder` with the default configuration.
    pub fn new(recorder: R) -> Self {
        Self::with_config(recorder, RecorderConfig::default())
    }

    pub fn with_config(recorder: R, config: RecorderConfig) -> Self {
        Self {
            inner: RwLock::new(ServiceInner { recorder, config }),
        }
    }

    // Every mutation leaves the guarded state consistent before calling into
    // the recorder, so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, ServiceInner<R>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ServiceInner<R>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusView {
        let inner = self.read();
        StatusView {
            enabled: inner.recorder.enabled(),
            period: inner.config.period,
            size: inner.config.size,
        }
    }

    pub fn config(&self) -> RecorderConfig {
        self.read().config
    }

    pub fn is_running(&self) -> bool {
        self.read().recorder.enabled()
    }

    /// Push the desired configuration into the recorder and start it.
    pub fn start(&self) -> Result<(), ControlError> {
        let mut guard = self.write();
        let inner = &mut *guard;

        if inner.recorder.enabled() {
            return Err(ControlError::AlreadyRunning);
        }

        inner.recorder.set_period(inner.config.period);
        inner.recorder.set_size(inner.config.size);
        inner.recorder.start().map_err(ControlError::Recorder)
    }

    pub fn stop(&self) -> Result<(), ControlError> {
        let mut inner = self.write();

        if !inner.recorder.enabled() {
            return Err(ControlError::NotRunning);
        }

        inner.recorder.stop().map_err(ControlError::Recorder)
    }

    /// Store the present fields; while running, also apply them live.
    ///
    /// Values are not validated here: decoding of the wire representation has
    /// already rejected anything that is not a duration or a byte count.
    pub fn update(&self, update: ConfigUpdate) {
        let mut guard = self.write();
        let inner = &mut *guard;

        update.apply_to(&mut inner.config);

        if inner.recorder.enabled() {
            if let Some(period) = update.period {
                inner.recorder.set_period(period);
            }
            if let Some(size) = update.size {
                inner.recorder.set_size(size);
            }
        }
    }

    /// Export the recorder's buffer into memory.
    pub fn snapshot(&self) -> Result<Vec<u8>, ControlError> {
        let inner = self.read();

        if !inner.recorder.enabled() {
            return Err(ControlError::NotRunning);
        }

        let mut buf = Vec::new();
        match inner.recorder.write_snapshot(&mut buf) {
            Ok(_) => Ok(buf),
            Err(RecorderError::SnapshotActive) => Err(ControlError::SnapshotInProgress),
            Err(e) => Err(ControlError::WriteFailed(e)),
        }
    }
}
