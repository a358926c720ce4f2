//! Reliable message transport over one connection-oriented byte stream.
//!
//! Every message travels as a `u32` network-order length prefix followed
//! by that many payload bytes. No magic number, no version byte. The
//! codec guarantees atomic whole-message delivery regardless of how the
//! OS fragments reads and writes; partial I/O is absorbed by the framing
//! layer buffering until a complete frame is available.
//!
//! ## Wire format
//!
//! ```text
//! length:   u32  (4, network byte order)
//! payload:  [u8] (length bytes)
//! ```
//!
//! Orderly peer shutdown between frames surfaces as `recv() -> Ok(None)`;
//! shutdown in the middle of a frame is a connection error. A closed
//! connection is discarded, never reused.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::error::SsrdError;

/// Size of the length prefix on the wire.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default ceiling on a single frame's payload.
///
/// The protocol itself imposes no limit; this guard exists so a
/// corrupted or hostile length prefix cannot demand an unbounded
/// allocation. Embedders with different needs set their own via
/// [`FrameCodec::with_max_frame`].
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

// ── FrameCodec ───────────────────────────────────────────────────

/// Length-prefixed frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

impl FrameCodec {
    /// Codec with the default frame ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the maximum accepted payload size.
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = SsrdError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, SsrdError> {
        if src.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes(src[..LEN_PREFIX_SIZE].try_into().unwrap()) as usize;
        if len > self.max_frame {
            return Err(SsrdError::FrameTooLarge {
                size: len,
                max: self.max_frame,
            });
        }

        if src.len() < LEN_PREFIX_SIZE + len {
            // Reserve what the rest of the frame needs and wait.
            src.reserve(LEN_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, SsrdError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(SsrdError::ClosedMidMessage {
                buffered: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = SsrdError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), SsrdError> {
        if item.len() > u32::MAX as usize {
            return Err(SsrdError::FrameTooLarge {
                size: item.len(),
                max: u32::MAX as usize,
            });
        }
        dst.reserve(LEN_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Connection ───────────────────────────────────────────────────

/// A framed duplex connection to a single peer.
///
/// Generic over the underlying stream so tests can run over
/// `tokio::io::duplex`; production code uses [`TcpStream`].
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    framed: Framed<S, FrameCodec>,
}

impl Connection<TcpStream> {
    /// Connect to `addr` and disable Nagle's algorithm.
    pub async fn connect(addr: &str) -> Result<Self, SsrdError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Wrap an accepted stream, disabling Nagle's algorithm.
    pub fn accepted(stream: TcpStream) -> Result<Self, SsrdError> {
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wrap an established stream with the default codec.
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::default()),
        }
    }

    /// Wrap an established stream with an explicit codec (frame ceiling).
    pub fn with_codec(stream: S, codec: FrameCodec) -> Self {
        Self {
            framed: Framed::new(stream, codec),
        }
    }

    /// Send one whole message. Blocks until the OS has accepted every
    /// byte or the connection fails.
    pub async fn send(&mut self, message: Bytes) -> Result<(), SsrdError> {
        self.framed.send(message).await
    }

    /// Receive the next whole message.
    ///
    /// Returns `Ok(None)` on orderly peer shutdown between messages.
    /// Shutdown mid-message, or any I/O failure, is an error and the
    /// connection must be discarded.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, SsrdError> {
        self.framed.next().await.transpose()
    }

    /// Split into independent send/receive halves for concurrent
    /// session pumps.
    pub fn into_split(self) -> (MessageSender<S>, MessageReceiver<S>) {
        let (sink, stream) = self.framed.split();
        (MessageSender { sink }, MessageReceiver { stream })
    }
}

/// Send half of a split [`Connection`].
pub struct MessageSender<S> {
    sink: SplitSink<Framed<S, FrameCodec>, Bytes>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageSender<S> {
    /// See [`Connection::send`].
    pub async fn send(&mut self, message: Bytes) -> Result<(), SsrdError> {
        self.sink.send(message).await
    }
}

/// Receive half of a split [`Connection`].
pub struct MessageReceiver<S> {
    stream: SplitStream<Framed<S, FrameCodec>>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageReceiver<S> {
    /// See [`Connection::recv`].
    pub async fn recv(&mut self) -> Result<Option<Bytes>, SsrdError> {
        self.stream.next().await.transpose()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{duplex, AsyncWriteExt, DuplexStream, ReadBuf};

    fn pair() -> (Connection<DuplexStream>, Connection<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        (Connection::new(a), Connection::new(b))
    }

    #[tokio::test]
    async fn roundtrip_various_sizes() {
        // Sequential send-then-recv needs the in-memory pipe to buffer the
        // whole frame; size it above the largest payload tested below.
        let (a, b) = duplex(2 * 1024 * 1024);
        let (mut tx, mut rx) = (Connection::new(a), Connection::new(b));

        for size in [0usize, 1, 3, 255, 4096, 65_537, 1_000_000] {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let expected = Bytes::from(payload);
            tx.send(expected.clone()).await.unwrap();
            let got = rx.recv().await.unwrap().expect("frame");
            assert_eq!(got, expected, "size {size}");
        }
    }

    #[tokio::test]
    async fn preserves_send_order() {
        let (mut tx, mut rx) = pair();
        for i in 0u32..20 {
            tx.send(Bytes::copy_from_slice(&i.to_be_bytes())).await.unwrap();
        }
        for i in 0u32..20 {
            let got = rx.recv().await.unwrap().unwrap();
            assert_eq!(got.as_ref(), i.to_be_bytes());
        }
    }

    #[tokio::test]
    async fn orderly_shutdown_yields_none() {
        let (tx, mut rx) = pair();
        drop(tx);
        assert!(rx.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shutdown_mid_message_is_error() {
        let (a, b) = duplex(1024);
        let mut rx = Connection::new(b);

        // Length prefix announcing 10 bytes, then only 3, then EOF.
        let mut a = a;
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        match rx.recv().await {
            Err(SsrdError::ClosedMidMessage { buffered }) => assert_eq!(buffered, 7),
            other => panic!("expected ClosedMidMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (a, b) = duplex(1024);
        let mut tx = Connection::new(a);
        let mut rx = Connection::with_codec(b, FrameCodec::with_max_frame(16));

        tx.send(Bytes::from(vec![0u8; 17])).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Err(SsrdError::FrameTooLarge { size: 17, max: 16 })
        ));
    }

    // ── One-byte-at-a-time stream (partial I/O resilience) ───────

    /// Wrapper that services at most one byte per read or write poll.
    struct OneByte<S>(S);

    impl<S: AsyncRead + Unpin> AsyncRead for OneByte<S> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let mut byte = [0u8; 1];
            let mut one = ReadBuf::new(&mut byte);
            match Pin::new(&mut self.0).poll_read(cx, &mut one) {
                Poll::Ready(Ok(())) => {
                    buf.put_slice(one.filled());
                    Poll::Ready(Ok(()))
                }
                other => other,
            }
        }
    }

    impl<S: AsyncWrite + Unpin> AsyncWrite for OneByte<S> {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(1);
            Pin::new(&mut self.0).poll_write(cx, &buf[..n])
        }

        fn poll_flush(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn one_byte_transport_delivers_whole_messages() {
        let (a, b) = duplex(64 * 1024);
        let mut tx = Connection::new(OneByte(a));
        let mut rx = Connection::new(OneByte(b));

        let payload = Bytes::from((0..=255u8).collect::<Vec<u8>>());

        let expected = payload.clone();
        let sender = tokio::spawn(async move {
            tx.send(payload).await.unwrap();
        });

        let got = rx.recv().await.unwrap().expect("frame");
        assert_eq!(got, expected);
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn split_halves_run_concurrently() {
        let (a, b) = pair();
        let (mut a_tx, mut a_rx) = a.into_split();
        let (mut b_tx, mut b_rx) = b.into_split();

        let echo = tokio::spawn(async move {
            for _ in 0..10 {
                let msg = b_rx.recv().await.unwrap().expect("frame");
                b_tx.send(msg).await.unwrap();
            }
        });

        for i in 0u8..10 {
            a_tx.send(Bytes::from(vec![i; 8])).await.unwrap();
            let back = a_rx.recv().await.unwrap().unwrap();
            assert_eq!(back.as_ref(), &[i; 8][..]);
        }

        echo.await.unwrap();
    }
}
