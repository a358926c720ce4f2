//! Accept loop: listen, authenticate, serve, resume listening.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use ssrd_core::auth::verify_peer;
use ssrd_core::{CaptureEvent, Connection, Event, KeyStore, SsrdError};

use crate::config::ServerConfig;
use crate::session::{self, SessionEnd};

/// The SSRD host.
///
/// Serves one viewer at a time, exactly like the session model it
/// exposes: accept, handshake, stream, and when the session ends —
/// however it ends — go back to listening. A failed handshake closes
/// that client and nothing else.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind and serve forever (or until the listener itself fails).
    ///
    /// `media` carries capture events into whichever session is
    /// active; `input` receives the authenticated viewer's input
    /// events for the injection backend.
    pub async fn run(
        &self,
        mut media: mpsc::Receiver<CaptureEvent>,
        input: mpsc::Sender<Event>,
    ) -> Result<(), SsrdError> {
        let listener = TcpListener::bind(&self.config.network.listen_addr).await?;
        info!("listening on {}", self.config.network.listen_addr);

        let keys = KeyStore::new(&self.config.auth.authorized_keys_dir);

        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "client connected");

            let mut conn = match Connection::accepted(stream) {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(%peer, "could not prepare connection: {e}");
                    continue;
                }
            };

            // The trust store is re-scanned inside every handshake, so
            // key files added or deleted since the last accept are
            // already in effect here.
            if let Err(e) = verify_peer(&mut conn, &keys).await {
                warn!(%peer, "handshake failed: {e}");
                continue;
            }

            match session::run(conn, &mut media, input.clone()).await {
                Ok(SessionEnd::Ended) => info!(%peer, "session ended"),
                Ok(SessionEnd::ConnectionLost) => info!(%peer, "connection lost"),
                Err(e) => error!(%peer, "session error: {e}"),
            }
            info!("resuming listening");
        }
    }
}
