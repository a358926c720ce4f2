//! Collaborator interfaces for the media subsystems.
//!
//! Capture, encode/decode, rendering, and input injection live outside
//! this crate; sessions talk to them through these traits and through
//! [`CaptureEvent`] channels. Codec failures are contained: a bad
//! video chunk is dropped, bad audio becomes silence — neither tears
//! the connection down.
//!
//! [`RawRgb`] and [`PcmF32`] are the passthrough codecs: no
//! compression, bytes carried verbatim. They are what the loopback
//! test source and the integration tests stream with, and they are
//! serviceable on a LAN.

use bytes::Bytes;

use crate::error::SsrdError;

/// One decoded RGB frame (3 bytes per pixel, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

// ── Codec seams ──────────────────────────────────────────────────

/// Encodes captured RGB frames for the wire.
pub trait VideoEncoder: Send {
    fn initialize(&mut self, width: u32, height: u32) -> Result<(), SsrdError>;
    fn encode(&mut self, frame: &RgbFrame) -> Result<Vec<u8>, SsrdError>;
}

/// Decodes wire bytes back into RGB frames.
///
/// `initialize` is re-invoked on every `resize` event; `decode`
/// interprets subsequent chunks at those dimensions.
pub trait VideoDecoder: Send {
    fn initialize(&mut self, width: u32, height: u32) -> Result<(), SsrdError>;
    fn decode(&mut self, data: &[u8]) -> Result<RgbFrame, SsrdError>;
}

/// Encodes interleaved `f32` samples for the wire.
pub trait AudioEncoder: Send {
    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, SsrdError>;
}

/// Decodes wire bytes back into interleaved `f32` samples.
pub trait AudioDecoder: Send {
    fn decode(&mut self, data: &[u8]) -> Result<Vec<f32>, SsrdError>;
}

/// Rate conversion between a stream's sample rate and the output
/// device's. Implementations live with the codec backends.
pub trait Resampler: Send {
    fn resample(&mut self, samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32>;
}

/// Receives presentable frames from the presentation loop.
pub trait PresentationSink: Send {
    fn present(&mut self, frame: &RgbFrame);
}

// ── Capture seam ─────────────────────────────────────────────────

/// What a capture backend delivers into a host session, already
/// encoded for the wire.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Encoded video frame with its capture timestamp.
    Video { data: Bytes, pts_ns: u64 },
    /// Encoded audio chunk with its capture timestamp.
    Audio { data: Bytes, pts_ns: u64 },
    /// The capture surface changed dimensions.
    Resize { width: u32, height: u32 },
}

// ── Passthrough codecs ───────────────────────────────────────────

/// Identity video codec: raw RGB24 carried verbatim.
#[derive(Debug, Default)]
pub struct RawRgb {
    width: u32,
    height: u32,
}

impl RawRgb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dimensions used by both trait impls. Inherent so call
    /// sites holding a concrete `RawRgb` need no disambiguation.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), SsrdError> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl VideoEncoder for RawRgb {
    fn initialize(&mut self, width: u32, height: u32) -> Result<(), SsrdError> {
        RawRgb::initialize(self, width, height)
    }

    fn encode(&mut self, frame: &RgbFrame) -> Result<Vec<u8>, SsrdError> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.data.len() != expected {
            return Err(SsrdError::Codec(format!(
                "rgb frame is {} bytes, {}x{} needs {expected}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }
        Ok(frame.data.to_vec())
    }
}

impl VideoDecoder for RawRgb {
    fn initialize(&mut self, width: u32, height: u32) -> Result<(), SsrdError> {
        RawRgb::initialize(self, width, height)
    }

    fn decode(&mut self, data: &[u8]) -> Result<RgbFrame, SsrdError> {
        if self.width == 0 || self.height == 0 {
            return Err(SsrdError::Codec(
                "raw decoder used before a resize arrived".into(),
            ));
        }
        if data.len() != self.expected_len() {
            return Err(SsrdError::Codec(format!(
                "chunk is {} bytes, {}x{} needs {}",
                data.len(),
                self.width,
                self.height,
                self.expected_len()
            )));
        }
        Ok(RgbFrame {
            width: self.width,
            height: self.height,
            data: Bytes::copy_from_slice(data),
        })
    }
}

/// Identity audio codec: little-endian `f32` PCM carried verbatim.
#[derive(Debug, Default)]
pub struct PcmF32;

impl PcmF32 {
    pub fn new() -> Self {
        Self
    }
}

impl AudioEncoder for PcmF32 {
    fn encode(&mut self, samples: &[f32]) -> Result<Vec<u8>, SsrdError> {
        let mut out = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(out)
    }
}

impl AudioDecoder for PcmF32 {
    fn decode(&mut self, data: &[u8]) -> Result<Vec<f32>, SsrdError> {
        if data.len() % 4 != 0 {
            return Err(SsrdError::Codec(format!(
                "pcm chunk of {} bytes is not a whole number of samples",
                data.len()
            )));
        }
        Ok(data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────
