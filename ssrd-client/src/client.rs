//! The viewer's stream session.
//!
//! After the handshake, one loop owns the connection: inbound events
//! feed the decoders and the playback engine, outbound input events
//! are drained from a channel and sent to the host. The presentation
//! loop never touches the connection — it polls the engine.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use ssrd_core::media::{AudioDecoder, VideoDecoder};
use ssrd_core::{Connection, Event, SsrdError, StreamPlayer};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The host sent `end-session`, or our input side shut down.
    Ended,
    /// The host disconnected or the link failed.
    ConnectionLost,
}

/// Drive one authenticated stream session to completion.
///
/// `input` is borrowed so the reconnect loop can reuse the same input
/// feed across sessions. `dims` publishes the host's capture
/// dimensions for the presentation side.
pub async fn run<S: AsyncRead + AsyncWrite + Unpin>(
    conn: Connection<S>,
    player: &StreamPlayer,
    video: &mut dyn VideoDecoder,
    audio: &mut dyn AudioDecoder,
    input: &mut mpsc::Receiver<Event>,
    dims: &watch::Sender<(u32, u32)>,
) -> Result<SessionEnd, SsrdError> {
    let (mut tx, mut rx) = conn.into_split();

    loop {
        tokio::select! {
            event = input.recv() => {
                let Some(event) = event else {
                    // Input side is gone: leave the session politely.
                    tx.send(Event::EndSession.encode()).await?;
                    return Ok(SessionEnd::Ended);
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
                        info!("host disconnected");
                        return Ok(SessionEnd::ConnectionLost);
                    }
                    Err(e) => {
                        warn!("receive failed: {e}");
                        return Ok(SessionEnd::ConnectionLost);
                    }
                };

                match Event::decode(&message) {
                    Ok(Event::Resize { width, height }) => {
                        info!(width, height, "stream resized");
                        if let Err(e) = video.initialize(width, height) {
                            warn!("decoder re-init failed: {e}");
                        }
                        let _ = dims.send((width, height));
                    }
                    Ok(Event::StreamVideo { pts_ns, data }) => {
                        match video.decode(&data) {
                            Ok(frame) => player.submit_video(frame.data, pts_ns),
                            // Bad chunk: drop it, keep the stream.
                            Err(e) => warn!("dropping video chunk: {e}"),
                        }
                    }
                    Ok(Event::StreamAudio { pts_ns, data }) => {
                        match audio.decode(&data) {
                            Ok(samples) => player.submit_audio(&samples, pts_ns),
                            // Bad chunk: submit nothing; the renderer
                            // underruns into silence for its duration.
                            Err(e) => warn!("substituting silence: {e}"),
                        }
                    }
                    Ok(Event::EndSession) => {
                        info!("host ended session");
                        return Ok(SessionEnd::Ended);
                    }
                    Ok(event) => warn!("ignoring {} from host", event.tag()),
                    Err(SsrdError::UnknownEvent(tag)) => {
                        warn!(%tag, "skipping unknown event");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::duplex;

    use ssrd_core::media::{AudioEncoder, PcmF32, RawRgb};
    use ssrd_core::{PlaybackState, PlayerConfig};

    fn player() -> StreamPlayer {
        StreamPlayer::new(PlayerConfig {
            sample_rate: 48_000,
            channels: 1,
            pre_roll: Duration::from_millis(100),
            ..PlayerConfig::default()
        })
    }

    fn pcm_chunk(ms: u64) -> Bytes {
        let samples = vec![0.25f32; (48 * ms) as usize];
        PcmF32::new().encode(&samples).unwrap().into()
    }

    #[tokio::test]
    async fn stream_session_buffers_then_plays() {
        let (host, viewer) = duplex(1024 * 1024);
        let player = player();
        let (dims_tx, dims_rx) = watch::channel((0, 0));
        let (_input_tx, mut input_rx) = mpsc::channel(4);

        let mut host = Connection::new(host);

        let session = async {
            let mut video = RawRgb::new();
            let mut audio = PcmF32::new();
            run(
                Connection::new(viewer),
                &player,
                &mut video,
                &mut audio,
                &mut input_rx,
                &dims_tx,
            )
            .await
        };

        let feed = async {
            host.send(
                Event::Resize {
                    width: 4,
                    height: 2,
                }
                .encode(),
            )
            .await
            .unwrap();

            // 0..90 ms: buffering. 100 ms crosses the pre-roll.
            for t in (0..=100).step_by(10) {
                host.send(
                    Event::StreamAudio {
                        pts_ns: t * 1_000_000,
                        data: pcm_chunk(10),
                    }
                    .encode(),
                )
                .await
                .unwrap();
            }

            host.send(
                Event::StreamVideo {
                    pts_ns: 0,
                    data: Bytes::from(vec![7u8; 4 * 2 * 3]),
                }
                .encode(),
            )
            .await
            .unwrap();

            host.send(Event::EndSession.encode()).await.unwrap();
        };

        let (result, ()) = tokio::join!(session, feed);
        assert_eq!(result.unwrap(), SessionEnd::Ended);

        assert_eq!(*dims_rx.borrow(), (4, 2));
        assert_eq!(player.state(), PlaybackState::Playing);

        // The decoded frame is due immediately at the clock origin.
        let frame = player.next_frame().expect("frame");
        assert_eq!(frame.data.len(), 4 * 2 * 3);
    }

    #[tokio::test]
    async fn input_events_flow_back_to_the_host() {
        let (host, viewer) = duplex(64 * 1024);
        let player = player();
        let (dims_tx, _dims_rx) = watch::channel((0, 0));
        let (input_tx, mut input_rx) = mpsc::channel(4);

        let session = tokio::spawn(async move {
            let mut video = RawRgb::new();
            let mut audio = PcmF32::new();
            run(
                Connection::new(viewer),
                &player,
                &mut video,
                &mut audio,
                &mut input_rx,
                &dims_tx,
            )
            .await
        });

        input_tx
            .send(Event::MouseMove { x: 0.5, y: 0.5 })
            .await
            .unwrap();

        let mut host = Connection::new(host);
        let message = host.recv().await.unwrap().expect("input message");
        assert_eq!(
            Event::decode(&message).unwrap(),
            Event::MouseMove { x: 0.5, y: 0.5 }
        );

        // Closing the input feed ends the session politely.
        drop(input_tx);
        let message = host.recv().await.unwrap().expect("end-session");
        assert_eq!(Event::decode(&message).unwrap(), Event::EndSession);
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Ended);
    }

    #[tokio::test]
    async fn corrupt_media_chunks_do_not_end_the_session() {
        let (host, viewer) = duplex(64 * 1024);
        let player = player();
        let (dims_tx, _dims_rx) = watch::channel((0, 0));
        let (_input_tx, mut input_rx) = mpsc::channel(4);

        let mut host = Connection::new(host);

        let session = async {
            let mut video = RawRgb::new();
            let mut audio = PcmF32::new();
            run(
                Connection::new(viewer),
                &player,
                &mut video,
                &mut audio,
                &mut input_rx,
                &dims_tx,
            )
            .await
        };

        let feed = async {
            // Wrong-size video for a 4x2 surface, ragged audio bytes.
            host.send(
                Event::Resize {
                    width: 4,
                    height: 2,
                }
                .encode(),
            )
            .await
            .unwrap();
            host.send(
                Event::StreamVideo {
                    pts_ns: 1,
                    data: Bytes::from_static(&[1, 2, 3]),
                }
                .encode(),
            )
            .await
            .unwrap();
            host.send(
                Event::StreamAudio {
                    pts_ns: 2,
                    data: Bytes::from_static(&[9, 9, 9]),
                }
                .encode(),
            )
            .await
            .unwrap();
            host.send(Event::EndSession.encode()).await.unwrap();
        };

        let (result, ()) = tokio::join!(session, feed);
        assert_eq!(result.unwrap(), SessionEnd::Ended);
        assert_eq!(player.stats().frames_presented, 0);
    }
}
