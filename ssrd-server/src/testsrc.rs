//! Synthetic capture source: a moving gradient and a sine tone.
//!
//! Stands in for the platform capture backend during loopback
//! diagnostics — the video is a scrolling RGB gradient, the audio a
//! 440 Hz tone, both stamped with capture timestamps and encoded with
//! the passthrough codecs. Latency and sync behavior measured against
//! this source transfer directly to a real backend.

use std::f32::consts::TAU;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ssrd_core::media::{AudioEncoder, PcmF32, RawRgb, VideoEncoder};
use ssrd_core::{CaptureEvent, RgbFrame};

/// Test-pattern generator settings.
#[derive(Debug, Clone)]
pub struct TestPattern {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for TestPattern {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl TestPattern {
    /// Start generating into `tx`. Stops when every receiver is gone.
    pub fn spawn(self, tx: mpsc::Sender<CaptureEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(
                width = self.width,
                height = self.height,
                fps = self.fps,
                "test pattern running"
            );

            let mut video = RawRgb::new();
            if let Err(e) = video.initialize(self.width, self.height) {
                warn!("test pattern video init failed: {e}");
                return;
            }
            let mut audio = PcmF32::new();

            if tx
                .send(CaptureEvent::Resize {
                    width: self.width,
                    height: self.height,
                })
                .await
                .is_err()
            {
                return;
            }

            let fps = self.fps.max(1);
            let start = Instant::now();
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_micros(1_000_000 / fps as u64));
            let samples_per_tick = (self.sample_rate / fps) as usize * self.channels as usize;
            let mut frame_index: u64 = 0;
            let mut phase: f32 = 0.0;
            let phase_step = TAU * 440.0 / self.sample_rate as f32;

            loop {
                ticker.tick().await;
                let pts_ns = start.elapsed().as_nanos() as u64;

                // Video: horizontal gradient scrolling one pixel per frame.
                let frame = self.gradient_frame(frame_index);
                let encoded = match video.encode(&frame) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("dropping test frame: {e}");
                        continue;
                    }
                };
                if tx
                    .send(CaptureEvent::Video {
                        data: encoded.into(),
                        pts_ns,
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                // Audio: one frame-interval of the tone.
                let mut samples = Vec::with_capacity(samples_per_tick);
                for _ in 0..samples_per_tick / self.channels as usize {
                    let value = 0.2 * phase.sin();
                    phase = (phase + phase_step) % TAU;
                    for _ in 0..self.channels {
                        samples.push(value);
                    }
                }
                let encoded = match audio.encode(&samples) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("dropping test audio: {e}");
                        continue;
                    }
                };
                if tx
                    .send(CaptureEvent::Audio {
                        data: encoded.into(),
                        pts_ns,
                    })
                    .await
                    .is_err()
                {
                    return;
                }

                frame_index += 1;
            }
        })
    }

    fn gradient_frame(&self, frame_index: u64) -> RgbFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (frame_index % self.width as u64) as usize;
        let mut data = vec![0u8; w * h * 3];

        for y in 0..h {
            let g = (y * 255 / h.max(1)) as u8;
            for x in 0..w {
                let r = (((x + shift) % w) * 255 / w.max(1)) as u8;
                let i = (y * w + x) * 3;
                data[i] = r;
                data[i + 1] = g;
                data[i + 2] = 128;
            }
        }

        RgbFrame {
            width: self.width,
            height: self.height,
            data: data.into(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
