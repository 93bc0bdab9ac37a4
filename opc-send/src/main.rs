//! opc-send entry point.
//!
//! ```text
//! opc-send                          Run with opc-send.toml (or defaults)
//! opc-send --config <path>          Load a custom config TOML
//! opc-send --server host:port       Override the server address
//! opc-send --transport tcp          Override the transport
//! opc-send --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use opc_send::config::{SenderConfig, Transport};
use opc_send::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "opc-send", about = "Stream frames to an Open Pixel Control server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "opc-send.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Server address, `host` or `host:port`.
    #[arg(short, long)]
    server: Option<String>,

    /// Wire transport.
    #[arg(short, long, value_enum)]
    transport: Option<Transport>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // A malformed file is fatal; only a missing one falls back to defaults.
    let found = cli.config.exists();
    let mut config = SenderConfig::load(&cli.config)?;
    if let Some(server) = cli.server {
        config.network.server = server;
    }
    if let Some(transport) = cli.transport {
        config.network.transport = transport;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("opc-send v{}", env!("CARGO_PKG_VERSION"));
    if !found {
        info!("no config at {}; using defaults", cli.config.display());
    }
    info!("server: {} ({:?})", config.network.server, config.network.transport);
    info!("frame: {}x{} @ {} fps", config.frame.width, config.frame.height, config.fps());
    info!("backpressure: {:?}", config.backpressure);

    let service = SenderService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
