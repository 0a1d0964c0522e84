use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use srtf_manager::config::{ListFormat, ManagerConfig, RuntimeArgMode};
use srtf_manager::frontend::spawn_stdin_forwarder;
use srtf_manager::manager::Manager;
use srtf_manager::process::UnixProcessControl;
use srtf_manager::scheduler::SystemClock;
use srtf_manager::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "srtf-manager")]
#[command(version)]
#[command(about = "A process manager with shortest-remaining-time-first scheduling")]
struct Args {
    /// Capacity of the process table
    #[arg(long, default_value = "64")]
    max_slots: usize,

    /// Control loop poll interval in milliseconds
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Also pass the runtime hint to the program as its last argument
    #[arg(long)]
    forward_runtime_arg: bool,

    /// Output format for `list`
    #[arg(long, short = 'o', default_value = "table")]
    list_format: OutputFormat,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "srtf_manager=debug")
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl From<OutputFormat> for ListFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => ListFormat::Table,
            OutputFormat::Json => ListFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with operator output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let runtime_arg = if args.forward_runtime_arg {
        RuntimeArgMode::Forward
    } else {
        RuntimeArgMode::Strip
    };
    let config = ManagerConfig::new()
        .with_max_slots(args.max_slots)
        .with_poll_interval_ms(args.poll_interval_ms)
        .with_runtime_arg(runtime_arg)
        .with_list_format(args.list_format.into());

    tracing::info!(?config, "Starting process manager");

    let shutdown = install_shutdown_handler()?;
    let (tx, rx) = mpsc::channel(32);
    spawn_stdin_forwarder(tx)?;

    let manager = Manager::new(
        config,
        Box::new(UnixProcessControl::new()),
        Box::new(SystemClock),
    );
    manager.run(rx, shutdown).await?;

    Ok(())
}
