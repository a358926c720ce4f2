//! One authenticated client session.
//!
//! Multiplexes two flows over the session connection: outbound capture
//! events (video, audio, resize) and inbound client events. Inbound
//! input lands on a single-consumer channel — the injection backend
//! decides what a key press means, this loop only routes it.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{info, warn};

use ssrd_core::{CaptureEvent, Connection, Event, SsrdError};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent `end-session`, or the capture side shut down.
    Ended,
    /// The peer disconnected or the link failed.
    ConnectionLost,
}

/// Drive one session to completion.
///
/// The capture receiver is borrowed, not consumed: the next session
/// reuses the same capture feed after this one ends.
pub async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    conn: Connection<S>,
    media: &mut mpsc::Receiver<CaptureEvent>,
    input: mpsc::Sender<Event>,
) -> Result<SessionEnd, SsrdError> {
    let (mut tx, mut rx) = conn.into_split();

    loop {
        tokio::select! {
            capture = media.recv() => {
                let Some(capture) = capture else {
                    // Capture backend is gone; end the session cleanly.
                    tx.send(Event::EndSession.encode()).await?;
                    return Ok(SessionEnd::Ended);
                };

                let event = match capture {
                    CaptureEvent::Video { data, pts_ns } => Event::StreamVideo { pts_ns, data },
                    CaptureEvent::Audio { data, pts_ns } => Event::StreamAudio { pts_ns, data },
                    CaptureEvent::Resize { width, height } => Event::Resize { width, height },
                };

                if let Err(e) = tx.send(event.encode()).await {
                    warn!("send failed: {e}");
                    return Ok(SessionEnd::ConnectionLost);
                }
            }

            message = rx.recv() => {
                let message = match message {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        info!("client disconnected");
                        return Ok(SessionEnd::ConnectionLost);
                    }
                    Err(e) => {
                        warn!("receive failed: {e}");
                        return Ok(SessionEnd::ConnectionLost);
                    }
                };

                match Event::decode(&message) {
                    Ok(Event::EndSession) => {
                        info!("client ended session");
                        return Ok(SessionEnd::Ended);
                    }
                    Ok(event) if event.is_input() => input.send(event).await?,
                    Ok(event) => warn!("ignoring {} from client", event.tag()),
                    Err(SsrdError::UnknownEvent(tag)) => {
                        warn!(%tag, "skipping unknown event");
                    }
                    // Malformed traffic after authentication is a
                    // protocol violation; drop the client.
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
