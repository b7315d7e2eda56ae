//! Command line control for a running flightrec-server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use env_logger::Env;
use flightrec_core::{format_duration, format_size, ConfigUpdate, UpdateRequest};
use flightrec_server::client::{Client, DEFAULT_URL};
use log::{debug, warn};
use miette::{IntoDiagnostic, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Control a running flight recorder")]
struct Args {
    #[clap(flatten)]
    verbose: Verbosity<WarnLevel>,

    /// Base URL of the recorder endpoints, including the prefix
    #[arg(short, long, default_value = DEFAULT_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show running state and configuration
    Status,
    /// Start recording
    Start,
    /// Stop recording
    Stop,
    /// Save the buffered trace to a file
    Snapshot {
        /// Output file, defaults to snapshot_<unix-seconds>.trace
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Change the period and/or size
    Update {
        /// New period, e.g. "2s"
        #[arg(long)]
        period: Option<String>,
        /// New buffer size, e.g. "128MB" or a byte count
        #[arg(long)]
        size: Option<String>,
    },
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(format!("snapshot_{}.trace", chrono::Utc::now().timestamp()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_env(Env::default())
        .init();

    let client = Client::new(&args.url).into_diagnostic()?;
    debug!("Using {}", client.base_url());

    match args.command {
        Command::Status => {
            let status = client.status().await.into_diagnostic()?;
            println!("Flight Recorder Status:");
            println!("  Enabled: {}", status.enabled);
            println!("  Period: {}", format_duration(status.period));
            println!("  Size: {} ({} bytes)", format_size(status.size), status.size);
        }
        Command::Start => {
            client.start().await.into_diagnostic()?;
            println!("Flight recorder started successfully!");
        }
        Command::Stop => {
            client.stop().await.into_diagnostic()?;
            println!("Flight recorder stopped successfully!");
        }
        Command::Snapshot { output } => {
            let path = output.unwrap_or_else(default_snapshot_path);
            match client.save_snapshot(&path).await {
                Ok(len) => println!("Snapshot saved to {} ({} bytes)", path.display(), len),
                Err(e) => {
                    if e.is_retryable() {
                        warn!("Another snapshot is being written, try again shortly");
                    }
                    return Err(e).into_diagnostic();
                }
            }
        }
        Command::Update { period, size } => {
            let request = UpdateRequest::parse(period.as_deref(), size.as_deref()).into_diagnostic()?;
            if ConfigUpdate::from(request).is_empty() {
                miette::bail!("Nothing to update, pass --period and/or --size");
            }
            client.update(&request).await.into_diagnostic()?;
            println!("Flight recorder configuration updated successfully!");
        }
    }

    Ok(())
}
