//! Presentation side: the display-paced frame loop and the headless
//! output backends.
//!
//! The loop polls the engine once per display interval — the engine
//! decides which frame, if any, is due against the audio clock. A GUI
//! backend supplies a real [`PresentationSink`]; the headless sink
//! logs throughput instead, which is all a latency soak test needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

use ssrd_core::media::PresentationSink;
use ssrd_core::{AudioRenderer, RgbFrame, StreamPlayer};

/// Poll the engine once per `interval` and hand due frames to `sink`.
///
/// Runs until `running` is cleared. Frames arriving before the first
/// `resize` (dimensions still zero) are skipped.
pub async fn run_presentation(
    player: Arc<StreamPlayer>,
    sink: &mut dyn PresentationSink,
    dims: watch::Receiver<(u32, u32)>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;

        let Some(frame) = player.next_frame() else {
            continue;
        };

        let (width, height) = *dims.borrow();
        if width == 0 || height == 0 {
            debug!("frame before first resize; skipping");
            continue;
        }

        sink.present(&RgbFrame {
            width,
            height,
            data: frame.data,
        });
    }
}

// ── Headless backends ────────────────────────────────────────────

/// Sink that counts frames and logs throughput periodically.
pub struct HeadlessSink {
    frames: u64,
    window_start: Instant,
    window_frames: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            window_frames: 0,
        }
    }

    /// Total frames presented.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for HeadlessSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for HeadlessSink {
    fn present(&mut self, frame: &RgbFrame) {
        self.frames += 1;
        self.window_frames += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(2) {
            let fps = self.window_frames as f64 / elapsed.as_secs_f64();
            info!(
                fps = format_args!("{fps:.1}"),
                width = frame.width,
                height = frame.height,
                "presenting"
            );
            self.window_start = Instant::now();
            self.window_frames = 0;
        }
    }
}

/// Drive the renderer at the stream's own real-time cadence with no
/// audible output.
///
/// Stands in for the audio device: a thread wakes every 10 ms and
/// pulls one chunk, exactly the pacing a hardware callback would
/// impose. The thread owns the renderer, so dropping the device after
/// `running` is cleared cannot race a live callback.
pub fn spawn_null_output(
    mut renderer: AudioRenderer,
    sample_rate: u32,
    channels: u16,
    running: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let chunk = Duration::from_millis(10);
        let frames = (sample_rate / 100) as usize;
        let mut buf = vec![0.0f32; frames * channels as usize];

        while running.load(Ordering::SeqCst) {
            renderer.render(&mut buf);
            std::thread::sleep(chunk);
        }
    })
}

// ── Tests ────────────────────────────────────────────────────────
