//! SSRD viewer — entry point.
//!
//! ```text
//! ssrd-client --host 192.168.1.10           Connect on the default port
//! ssrd-client -H 192.168.1.10 -p 1998 -i ~/.ssrd/private.pem
//! ssrd-client --config <path>               Use custom config TOML
//! ssrd-client --gen-config                  Dump default config and exit
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ssrd_core::auth::prove_possession;
use ssrd_core::media::{PcmF32, RawRgb};
use ssrd_core::{Connection, Identity, StreamPlayer};

use ssrd_client::client::{self, SessionEnd};
use ssrd_client::config::ClientConfig;
use ssrd_client::present::{self, HeadlessSink};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ssrd-client", about = "SSRD remote desktop viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ssrd-client.toml")]
    config: PathBuf,

    /// Server host or IP (overrides config). Example: 192.168.1.10
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port (used with --host).
    #[arg(short, long, default_value_t = 1998)]
    port: u16,

    /// Identity file (private-key PEM, overrides config).
    #[arg(short, long)]
    identity: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.server_addr = format!("{host}:{}", cli.port);
    }
    if let Some(identity) = cli.identity {
        config.auth.identity = identity;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ssrd-client v{}", env!("CARGO_PKG_VERSION"));

    let identity = Identity::from_pem_file(Path::new(&config.auth.identity))?;

    // ── 1. Playback engine + output backends ────────────────────

    let player = Arc::new(StreamPlayer::new(config.playback.player_config()));
    let running = Arc::new(AtomicBool::new(true));

    let audio_thread = present::spawn_null_output(
        player.renderer().expect("renderer taken once"),
        config.playback.sample_rate,
        config.playback.channels,
        Arc::clone(&running),
    );

    let (dims_tx, dims_rx) = watch::channel((0u32, 0u32));

    let presentation = tokio::spawn({
        let player = Arc::clone(&player);
        let running = Arc::clone(&running);
        async move {
            let mut sink = HeadlessSink::new();
            present::run_presentation(
                player,
                &mut sink,
                dims_rx,
                running,
                Duration::from_millis(16),
            )
            .await;
            info!("presented {} frames", sink.frames());
        }
    });

    // A GUI backend publishes into `input_tx`; headless runs keep the
    // channel open and simply never send.
    let (input_tx, mut input_rx) = mpsc::channel(256);

    // ── 2. Connect / reconnect loop ─────────────────────────────

    let timeout = Duration::from_millis(config.network.connect_timeout_ms);
    let retry_delay = Duration::from_millis(config.network.reconnect_delay_ms);

    loop {
        info!("connecting to {}", config.network.server_addr);

        let connect = tokio::time::timeout(
            timeout,
            Connection::connect(&config.network.server_addr),
        );

        let mut conn = match connect.await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!("connect failed: {e}; retrying in {retry_delay:?}");
                tokio::time::sleep(retry_delay).await;
                continue;
            }
            Err(_) => {
                warn!("connect timed out; retrying in {retry_delay:?}");
                continue;
            }
        };

        if let Err(e) = prove_possession(&mut conn, &identity).await {
            // Our key was not accepted; retrying cannot help.
            error!("authentication failed: {e}");
            break;
        }
        info!("secure session established");

        let mut video = RawRgb::new();
        let mut audio = PcmF32::new();
        let end = client::run(
            conn,
            &player,
            &mut video,
            &mut audio,
            &mut input_rx,
            &dims_tx,
        )
        .await;

        // Whatever buffered is stale now; the next session anchors a
        // fresh timeline.
        player.reset();

        match end {
            Ok(SessionEnd::Ended) => {
                info!("session ended");
                break;
            }
            Ok(SessionEnd::ConnectionLost) => {
                warn!("session lost; reconnecting in {retry_delay:?}");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                error!("session error: {e}; reconnecting in {retry_delay:?}");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }

    // ── 3. Shutdown ─────────────────────────────────────────────
    //
    // The audio thread owns the renderer; joining it guarantees no
    // callback is in flight before teardown completes.

    drop(input_tx);
    running.store(false, Ordering::SeqCst);
    let _ = presentation.await;
    let _ = audio_thread.join();

    Ok(())
}
