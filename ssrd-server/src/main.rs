//! SSRD host — entry point.
//!
//! ```text
//! ssrd-server                     Serve with defaults
//! ssrd-server --config <path>     Use custom config TOML
//! ssrd-server --listen 0.0.0.0:1998
//! ssrd-server --gen-config        Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ssrd_server::config::ServerConfig;
use ssrd_server::server::Server;
use ssrd_server::testsrc::TestPattern;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ssrd-server", about = "SSRD remote desktop host")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ssrd-server.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:1998
    #[arg(short, long)]
    listen: Option<String>,

    /// Authorized-keys directory (overrides config).
    #[arg(short, long)]
    keys: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(listen) = cli.listen {
        config.network.listen_addr = listen;
    }
    if let Some(keys) = cli.keys {
        config.auth.authorized_keys_dir = keys;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ssrd-server v{}", env!("CARGO_PKG_VERSION"));
    info!("trust store: {}", config.auth.authorized_keys_dir);

    // ── 1. Capture feed ─────────────────────────────────────────
    //
    // A real capture backend publishes into `media_tx`. Without one,
    // the synthetic test pattern keeps the stream path exercised.

    let (media_tx, media_rx) = mpsc::channel(64);

    if config.stream.test_source {
        info!("no capture backend wired; streaming the test pattern");
        TestPattern {
            width: config.stream.width,
            height: config.stream.height,
            fps: config.stream.fps,
            sample_rate: config.stream.sample_rate,
            channels: config.stream.channels,
        }
        .spawn(media_tx.clone());
    }

    // ── 2. Input seam ───────────────────────────────────────────
    //
    // The injection backend consumes this channel. Until one is
    // wired, events are drained and traced so sessions never stall.

    let (input_tx, mut input_rx) = mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(event) = input_rx.recv().await {
            debug!(?event, "input event");
        }
    });

    // ── 3. Serve ────────────────────────────────────────────────

    let server = Server::new(config);
    server.run(media_rx, input_tx).await?;

    Ok(())
}
