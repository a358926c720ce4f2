//! Typed wire messages.
//!
//! Every session message is one [`Event`], encoded with the field
//! codec. Field 0 is a UTF-8 type tag; the remaining fields are
//! positional per tag. The sum-type replaces per-event callback
//! wiring: both peers decode into `Event` values and push them onto a
//! single-consumer channel, decoupling "what happened" from "who
//! handles it".

use bytes::Bytes;

use crate::error::SsrdError;
use crate::payload::{Fields, PayloadBuilder};

/// One session message, in either direction.
///
/// Mouse coordinates are normalized to `0..1` so the host can map them
/// onto whatever resolution it is currently capturing.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The host's capture surface changed dimensions.
    Resize { width: u32, height: u32 },
    /// Keyboard key transition.
    Key { key: i32, action: i32, mods: i32 },
    /// Pointer moved to a normalized position.
    MouseMove { x: f64, y: f64 },
    /// Mouse button transition.
    MouseButton { button: i32, action: i32, mods: i32 },
    /// Scroll wheel ticks.
    MouseScroll { dx: i32, dy: i32 },
    /// One encoded video frame with its capture timestamp.
    StreamVideo { pts_ns: u64, data: Bytes },
    /// One encoded audio chunk with its capture timestamp.
    StreamAudio { pts_ns: u64, data: Bytes },
    /// Orderly end of the remote session.
    EndSession,
}

impl Event {
    /// The wire tag carried in field 0.
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Resize { .. } => "resize",
            Event::Key { .. } => "key",
            Event::MouseMove { .. } => "mouse-move",
            Event::MouseButton { .. } => "mouse-button",
            Event::MouseScroll { .. } => "mouse-scroll",
            Event::StreamVideo { .. } => "stream-video",
            Event::StreamAudio { .. } => "stream-audio",
            Event::EndSession => "end-session",
        }
    }

    /// True for the input events a host forwards to its injection seam.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Event::Key { .. }
                | Event::MouseMove { .. }
                | Event::MouseButton { .. }
                | Event::MouseScroll { .. }
        )
    }

    /// Encode into one transport message.
    pub fn encode(&self) -> Bytes {
        let mut b = PayloadBuilder::new();
        b.push_str(self.tag());

        match self {
            Event::Resize { width, height } => {
                b.push_u32(*width).push_u32(*height);
            }
            Event::Key { key, action, mods } => {
                b.push_i32(*key).push_i32(*action).push_i32(*mods);
            }
            Event::MouseMove { x, y } => {
                b.push_f64(*x).push_f64(*y);
            }
            Event::MouseButton {
                button,
                action,
                mods,
            } => {
                b.push_i32(*button).push_i32(*action).push_i32(*mods);
            }
            Event::MouseScroll { dx, dy } => {
                b.push_i32(*dx).push_i32(*dy);
            }
            Event::StreamVideo { pts_ns, data } => {
                b.push_u64(*pts_ns).push_bytes(data);
            }
            Event::StreamAudio { pts_ns, data } => {
                b.push_u64(*pts_ns).push_bytes(data);
            }
            Event::EndSession => {}
        }

        b.finish()
    }

    /// Decode one received transport message.
    ///
    /// A tag this peer does not recognize fails with
    /// [`SsrdError::UnknownEvent`]; session loops log and skip those
    /// rather than tearing the connection down.
    pub fn decode(message: &[u8]) -> Result<Event, SsrdError> {
        let f = Fields::new(message);

        let event = match f.str_at(0)? {
            "resize" => Event::Resize {
                width: f.u32_at(1)?,
                height: f.u32_at(2)?,
            },
            "key" => Event::Key {
                key: f.i32_at(1)?,
                action: f.i32_at(2)?,
                mods: f.i32_at(3)?,
            },
            "mouse-move" => Event::MouseMove {
                x: f.f64_at(1)?,
                y: f.f64_at(2)?,
            },
            "mouse-button" => Event::MouseButton {
                button: f.i32_at(1)?,
                action: f.i32_at(2)?,
                mods: f.i32_at(3)?,
            },
            "mouse-scroll" => Event::MouseScroll {
                dx: f.i32_at(1)?,
                dy: f.i32_at(2)?,
            },
            "stream-video" => Event::StreamVideo {
                pts_ns: f.u64_at(1)?,
                data: Bytes::copy_from_slice(f.raw(2)?),
            },
            "stream-audio" => Event::StreamAudio {
                pts_ns: f.u64_at(1)?,
                data: Bytes::copy_from_slice(f.raw(2)?),
            },
            "end-session" => Event::EndSession,
            other => return Err(SsrdError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }
}

// ── Tests ────────────────────────────────────────────────────────
