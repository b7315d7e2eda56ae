//! # Flightrec Core
//!
//! Platform-independent control service for a flight recorder: a bounded,
//! continuously-overwriting ring of recent trace events that can be exported
//! on demand.
//!
//! This crate contains the state machine, configuration model, wire codecs and
//! error taxonomy with **zero I/O dependencies**. The recorder itself is
//! abstracted through the [`Recorder`] trait; transports (HTTP, CLI) live in
//! `flightrec-server`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  flightrec-core (no tokio/async/logging deps)            │
//! │  ├── service/  (ControlService: RwLock + state rules)    │
//! │  ├── config/   (RecorderConfig, ConfigUpdate)            │
//! │  ├── units/    (duration + byte-size codecs)             │
//! │  ├── api/      (JSON wire types)                         │
//! │  └── Recorder  (abstracts the sampling engine)           │
//! └──────────────────────────────────────────────────────────┘
//!                          ▲
//!             ┌────────────┴────────────┐
//!             │  flightrec-server       │
//!             │  (RingRecorder, axum)   │
//!             └─────────────────────────┘
//! ```
//!
//! ## State Rules
//!
//! | From    | Operation  | To      | Error when illegal |
//! |---------|------------|---------|--------------------|
//! | Stopped | `start`    | Running | `AlreadyRunning`   |
//! | Running | `stop`     | Stopped | `NotRunning`       |
//! | any     | `update`   | same    | never              |
//! | Running | `snapshot` | Running | `NotRunning`       |
//!
//! ## Example
//!
//! ```rust,ignore
//! use flightrec_core::{ConfigUpdate, ControlService};
//! use std::time::Duration;
//!
//! let service = ControlService::new(my_recorder);
//! service.start()?;
//! service.update(ConfigUpdate::period(Duration::from_secs(2)));
//! let trace = service.snapshot()?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod recorder;
pub mod service;
pub mod units;

pub use api::{ErrorResponse, StatusResponse, UpdateRequest};
pub use config::{ConfigUpdate, RecorderConfig, StatusView, DEFAULT_PERIOD, DEFAULT_SIZE};
pub use error::{ControlError, ErrorKind};
pub use recorder::{Recorder, RecorderError};
pub use service::ControlService;
pub use units::{format_duration, format_size, parse_duration, parse_size, UnitError};
