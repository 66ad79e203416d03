//! cmdlog Server Binary
//!
//! TCP command log that replays the most recent commands to every client.

use clap::Parser;
use cmdlog::config::{BackendKind, ServerConfig};
use cmdlog::server::{LogServer, TerminationSignals};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cmdlog-server")]
#[command(about = "TCP command log with a bounded ring of recent commands")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Backing file for the file backend
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Number of commands the ring retains
    #[arg(long)]
    capacity: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Also send logs to the systemd journal
    #[cfg(feature = "journald")]
    #[arg(long)]
    journald: bool,
}

fn init_tracing(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::new(if args.verbose {
        "cmdlog=debug,info"
    } else {
        "cmdlog=info,warn,error"
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

    #[cfg(feature = "journald")]
    if args.journald {
        registry.with(tracing_journald::layer()?).try_init()?;
        return Ok(());
    }

    registry.try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    info!("Starting cmdlog server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(file) = args.file {
        config.storage.file_path = file;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(capacity) = args.capacity {
        config.storage.capacity = capacity;
    }

    config.validate()?;

    info!("Listen address: {}", config.listen_address());
    info!("Backend: {}", config.storage.backend);
    match config.storage.backend {
        BackendKind::Ring => info!("Ring capacity: {} commands", config.storage.capacity),
        BackendKind::File => info!("Backing file: {}", config.storage.file_path.display()),
    }

    let mut signals = match TerminationSignals::register() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let server = match LogServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let trigger = server.shutdown_trigger();
    tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Caught {}, shutting down", name);
        trigger.shutdown();
    });

    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("cmdlog server stopped");
    Ok(())
}
