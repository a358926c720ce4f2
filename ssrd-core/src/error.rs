//! Domain-specific error types for the SSRD protocol.
//!
//! All fallible operations return `Result<T, SsrdError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the SSRD protocol.
#[derive(Debug, Error)]
pub enum SsrdError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the stream between a length prefix and the end
    /// of its payload.
    #[error("connection closed mid-message ({buffered} bytes buffered)")]
    ClosedMidMessage { buffered: usize },

    /// A frame announced a payload larger than the configured ceiling.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Field Codec Errors ───────────────────────────────────────
    /// A field index past the end of the message was requested.
    #[error("field {index} out of range: message holds {available} fields")]
    FieldOutOfRange { index: usize, available: usize },

    /// A length prefix or field payload ran past the end of the buffer.
    #[error("truncated field at byte offset {offset}")]
    TruncatedField { offset: usize },

    /// A typed accessor found a field of the wrong width.
    #[error("field {index} holds {actual} bytes, expected {expected}")]
    FieldSizeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The first field named an event type this peer does not know.
    #[error("unknown event type {0:?}")]
    UnknownEvent(String),

    // ── Authentication Errors ────────────────────────────────────
    /// The handshake failed. Always terminates the connection; a fresh
    /// handshake is required on the next accepted connection.
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    /// A key file could not be loaded or parsed.
    #[error("key file {path}: {reason}")]
    Key { path: String, reason: String },

    // ── Collaborator Errors ──────────────────────────────────────
    /// A media codec rejected a chunk. The chunk is dropped (video) or
    /// replaced with silence (audio); the connection survives.
    #[error("codec error: {0}")]
    Codec(String),

    /// The audio output device failed to initialize.
    #[error("audio device error: {0}")]
    Device(String),

    // ── Plumbing ─────────────────────────────────────────────────
    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SsrdError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SsrdError::ChannelClosed
    }
}
