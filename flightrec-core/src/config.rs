//! Recorder configuration model.

use std::time::Duration;

use crate::units::MB;

/// Default time span represented by the ring.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Default ring size in bytes (64MB).
pub const DEFAULT_SIZE: usize = 64 * MB;

/// Desired recorder configuration.
///
/// This is what the caller wants in effect; it is pushed into the recorder on
/// every start and, while running, on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    pub period: Duration,
    pub size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            size: DEFAULT_SIZE,
        }
    }
}

/// Partial configuration change. `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub period: Option<Duration>,
    pub size: Option<usize>,
}

impl ConfigUpdate {
    pub fn period(period: Duration) -> Self {
        Self {
            period: Some(period),
            size: None,
        }
    }

    pub fn size(size: usize) -> Self {
        Self {
            period: None,
            size: Some(size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.period.is_none() && self.size.is_none()
    }

    /// Apply the present fields to `config`.
    pub fn apply_to(&self, config: &mut RecorderConfig) {
        if let Some(period) = self.period {
            config.period = period;
        }
        if let Some(size) = self.size {
            config.size = size;
        }
    }
}

/// Point-in-time view of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub enabled: bool,
    pub period: Duration,
    pub size: usize,
}

impl StatusView {
    pub fn config(&self) -> RecorderConfig {
        RecorderConfig {
            period: self.period,
            size: self.size,
        }
    }
}
