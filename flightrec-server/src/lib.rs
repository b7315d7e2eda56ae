//! # Flightrec Server
//!
//! HTTP front end for a flight recorder running inside this process.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   flightrec-server                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │ REST API    │   │ TeeLogger    │   │ Client (CLI) │  │
//! │  │ (axum)      │   │ (env_logger) │   │ (reqwest)    │  │
//! │  └──────┬──────┘   └──────┬───────┘   └──────────────┘  │
//! │         │                 │ EventSink                   │
//! │         ▼                 ▼                             │
//! │  ┌──────────────────┐  ┌──────────────────────────────┐ │
//! │  │ ControlService   │─▶│ RingRecorder                 │ │
//! │  │ (flightrec-core) │  │ VecDeque<TraceEvent> + flags │ │
//! │  └──────────────────┘  └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## REST API
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET {prefix}/status` | Running state and configuration |
//! | `POST {prefix}/start` | Start recording |
//! | `POST {prefix}/stop` | Stop recording |
//! | `POST {prefix}/update` | Change period and/or size |
//! | `GET {prefix}/snapshot` | Download the buffered trace |
//! | `GET /health` | Liveness probe |
//!
//! The prefix defaults to `/recorder`.
//!
//! ## Example: Starting the Server
//!
//! ```rust,no_run
//! use clap::Parser;
//! use flightrec_core::ControlService;
//! use flightrec_server::{ring::RingRecorder, web::Web, Cli};
//! use std::{sync::Arc, time::Duration};
//! use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = Cli::parse_from(["flightrec-server", "-p", "9000"]);
//!     let service = Arc::new(ControlService::with_config(RingRecorder::new(), args.config()));
//!
//!     Toplevel::new(|s| async move {
//!         let web = Web::new(service, &args);
//!         s.start(SubsystemBuilder::new("Webserver", |subsys| web.run(subsys)));
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use clap::Parser;
use flightrec_core::{parse_duration, parse_size, RecorderConfig};

pub mod client;
pub mod logging;
pub mod ring;
pub mod web;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Address the server binds to when none is given.
pub const DEFAULT_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_PREFIX: &str = "/recorder";

#[derive(Parser, Clone, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Address for webserver
    #[arg(short, long, default_value_t = DEFAULT_ADDRESS)]
    pub address: IpAddr,

    /// Port for webserver
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path under which the control endpoints are mounted
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Initial recording period, e.g. "1s" or "500ms"
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub period: Duration,

    /// Initial buffer size, e.g. "64MB"
    #[arg(long, default_value = "64MB", value_parser = parse_size)]
    pub size: usize,

    /// Start recording immediately
    #[arg(long, default_value_t = false)]
    pub start: bool,
}

impl Cli {
    /// Recorder configuration requested on the command line.
    pub fn config(&self) -> RecorderConfig {
        RecorderConfig {
            period: self.period,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Cli::parse_from(["flightrec-server"]);
        assert_eq!(args.address, DEFAULT_ADDRESS);
        assert_eq!(args.port, 8083);
        assert_eq!(args.prefix, "/recorder");
        assert_eq!(args.config(), RecorderConfig::default());
        assert!(!args.start);
    }

    #[test]
    fn test_cli_recorder_options() {
        let args = Cli::parse_from([
            "flightrec-server",
            "--period",
            "250ms",
            "--size",
            "8MB",
            "--start",
            "-p",
            "9000",
        ]);
        assert_eq!(args.period, Duration::from_millis(250));
        assert_eq!(args.size, 8 * 1024 * 1024);
        assert_eq!(args.port, 9000);
        assert!(args.start);
    }

    #[test]
    fn test_cli_rejects_bad_units() {
        assert!(Cli::try_parse_from(["flightrec-server", "--period", "2x"]).is_err());
        assert!(Cli::try_parse_from(["flightrec-server", "--size", "lots"]).is_err());
    }
}
