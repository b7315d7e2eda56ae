use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use flightrec_core::{format_duration, format_size, ControlError, ControlService};
use flightrec_server::{logging::init_logging, ring::RingRecorder, web::Web, Cli, VERSION};
use log::{info, warn};
use miette::{IntoDiagnostic, Result};
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let recorder = RingRecorder::new();
    init_logging(&args.verbose, recorder.sink()).into_diagnostic()?;

    info!("flightrec-server {}", VERSION);

    let service = Arc::new(ControlService::with_config(recorder, args.config()));
    if args.start {
        service.start().into_diagnostic()?;
        info!(
            "Flight recorder started (period {}, size {})",
            format_duration(args.period),
            format_size(args.size)
        );
    }

    let web = Web::new(service.clone(), &args);
    let result = Toplevel::new(|s| async move {
        s.start(SubsystemBuilder::new("Webserver", |subsys| web.run(subsys)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(1000))
    .await;

    match service.stop() {
        Ok(()) => info!("Flight recorder stopped"),
        Err(ControlError::NotRunning) => {}
        Err(e) => warn!("Failed to stop flight recorder: {}", e),
    }

    result.into_diagnostic()
}
