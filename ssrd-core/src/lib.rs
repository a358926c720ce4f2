//! # ssrd-core
//!
//! Protocol and playback core for SSRD, a secure remote-desktop
//! streaming system.
//!
//! This crate contains:
//! - **Transport**: `FrameCodec` + `Connection` — whole-message
//!   delivery over one TCP stream via `tokio_util` framing
//! - **Payload**: `PayloadBuilder` / `Fields` — self-describing
//!   length-prefixed field sequences
//! - **Event**: the typed message sum-type multiplexed over one
//!   connection (input, stream data, session control)
//! - **Auth**: challenge–response proof-of-possession against a
//!   revocable directory of authorized keys
//! - **Player**: the audio-anchored A/V synchronization engine
//! - **Media**: collaborator traits for capture, codecs, and
//!   presentation, plus raw passthrough codecs
//! - **Error**: `SsrdError` — typed, `thiserror`-based error hierarchy

pub mod auth;
pub mod error;
pub mod event;
pub mod media;
pub mod payload;
pub mod player;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use auth::{Identity, KeyStore, CHALLENGE_SIZE};
pub use error::SsrdError;
pub use event::Event;
pub use media::{CaptureEvent, RgbFrame};
pub use payload::{Fields, PayloadBuilder};
pub use player::{AudioRenderer, PlaybackState, PlayerConfig, PlayerStats, StreamPlayer, VideoFrame};
pub use transport::{Connection, FrameCodec, MessageReceiver, MessageSender};
