//! Audio-anchored A/V synchronization playback engine.
//!
//! Reconciles two independently paced, independently jittered media
//! tracks into one coherent presentation timeline. Audio is the
//! anchor: decoded samples flow through a lock-free ring into the
//! hardware callback, and the amount of audio actually emitted defines
//! the playback clock. Video is the elastic track — buffered frames
//! are presented, held back, or dropped against that clock.
//!
//! ```text
//!  Idle ──► Buffering ──► Playing
//! ```
//!
//! The state advances monotonically per session; only [`StreamPlayer::reset`]
//! returns it to `Idle`. Audio underruns are perceptually worse than
//! dropped video, so audio is never throttled to accommodate video.

mod queue;
mod ring;

pub use queue::{VideoFrame, VideoQueue};

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace};

const NANOS_PER_SEC: u64 = 1_000_000_000;

// ── Configuration ────────────────────────────────────────────────

/// Playback engine tuning.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Sample rate of the decoded audio track.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Initial buffering delay absorbing network jitter.
    pub pre_roll: Duration,
    /// A head frame older than `clock - max_lateness` is dropped.
    pub max_lateness: Duration,
    /// A head frame within `clock + early_tolerance` is presented.
    pub early_tolerance: Duration,
    /// Video queue bound; overflow evicts the oldest frame.
    pub queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            pre_roll: Duration::from_millis(100),
            max_lateness: Duration::from_millis(30),
            early_tolerance: Duration::from_millis(5),
            queue_capacity: 120,
        }
    }
}

// ── State ────────────────────────────────────────────────────────

/// Playback progression for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    /// No audio submitted yet.
    Idle = 0,
    /// Filling the pre-roll window; clock pinned to the threshold.
    Buffering = 1,
    /// Audio is being emitted; the clock runs on frames played.
    Playing = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PlaybackState::Idle,
            1 => PlaybackState::Buffering,
            _ => PlaybackState::Playing,
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Audio frames emitted by the callback since playback started.
    pub frames_emitted: u64,
    /// Samples dropped because the ring was full.
    pub samples_dropped: u64,
    /// Video frames dropped for arriving too late.
    pub frames_dropped_late: u64,
    /// Video frames evicted by queue overflow.
    pub frames_dropped_overflow: u64,
    /// Video frames handed to the presentation loop.
    pub frames_presented: u64,
}

// ── Renderer side ────────────────────────────────────────────────

/// State shared between the player and the real-time renderer.
struct RenderShared {
    playing: AtomicBool,
    flush: AtomicBool,
    frames_emitted: AtomicU64,
}

/// The real-time callback half of the engine.
///
/// Obtained once via [`StreamPlayer::renderer`] and handed to the
/// audio output device. [`render`](AudioRenderer::render) is the only
/// method the device thread may call.
pub struct AudioRenderer {
    consumer: ring::Consumer,
    shared: Arc<RenderShared>,
    channels: usize,
}

impl AudioRenderer {
    /// Fill `out` with interleaved samples.
    ///
    /// Called from the device's own thread at its own cadence. Never
    /// blocks, never allocates, never takes a lock: available samples
    /// are drained from the ring and the remainder is zero-filled on
    /// underrun. Frames emitted while playing accumulate into the
    /// playback clock — silence included, so the clock keeps the
    /// device's real-time pace through network stalls.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.shared.flush.swap(false, Ordering::AcqRel) {
            self.consumer.clear();
        }

        if !self.shared.playing.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }

        let read = self.consumer.pop_slice(out);
        out[read..].fill(0.0);

        self.shared
            .frames_emitted
            .fetch_add((out.len() / self.channels) as u64, Ordering::AcqRel);
    }
}

// ── StreamPlayer ─────────────────────────────────────────────────

/// The submission/presentation half of the engine.
///
/// Shareable across the decode path (submissions) and the
/// presentation loop (`next_frame`); every method takes `&self`.
pub struct StreamPlayer {
    config: PlayerConfig,
    pre_roll_ns: u64,
    max_lateness_ns: u64,
    early_tolerance_ns: u64,

    state: AtomicU8,
    stream_start_ns: AtomicU64,
    playback_threshold_ns: AtomicU64,

    /// Producer half of the audio ring. Only the decode path pushes;
    /// the mutex is uncontended and exists to keep `&self` methods.
    producer: Mutex<ring::Producer>,
    renderer: Mutex<Option<AudioRenderer>>,
    shared: Arc<RenderShared>,

    queue: VideoQueue,
    samples_dropped: AtomicU64,
    frames_dropped_late: AtomicU64,
    frames_presented: AtomicU64,
}

impl StreamPlayer {
    /// Build an engine for one session.
    ///
    /// The ring holds one second of audio plus the pre-roll window.
    pub fn new(config: PlayerConfig) -> Self {
        let samples_per_sec = config.sample_rate as usize * config.channels as usize;
        let pre_roll_samples =
            (samples_per_sec as f64 * config.pre_roll.as_secs_f64()) as usize;
        let (producer, consumer) = ring::audio_ring(samples_per_sec + pre_roll_samples);

        let shared = Arc::new(RenderShared {
            playing: AtomicBool::new(false),
            flush: AtomicBool::new(false),
            frames_emitted: AtomicU64::new(0),
        });

        let renderer = AudioRenderer {
            consumer,
            shared: Arc::clone(&shared),
            channels: config.channels as usize,
        };

        Self {
            pre_roll_ns: config.pre_roll.as_nanos() as u64,
            max_lateness_ns: config.max_lateness.as_nanos() as u64,
            early_tolerance_ns: config.early_tolerance.as_nanos() as u64,
            queue: VideoQueue::new(config.queue_capacity),
            config,
            state: AtomicU8::new(PlaybackState::Idle as u8),
            stream_start_ns: AtomicU64::new(0),
            playback_threshold_ns: AtomicU64::new(0),
            producer: Mutex::new(producer),
            renderer: Mutex::new(Some(renderer)),
            shared,
            samples_dropped: AtomicU64::new(0),
            frames_dropped_late: AtomicU64::new(0),
            frames_presented: AtomicU64::new(0),
        }
    }

    /// Take the real-time callback half. Yields `Some` exactly once.
    pub fn renderer(&self) -> Option<AudioRenderer> {
        self.renderer.lock().unwrap().take()
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Submit decoded interleaved audio with its capture timestamp.
    ///
    /// The first submission anchors the timeline: `stream_start` is
    /// recorded and playback is scheduled for `stream_start +
    /// pre_roll`. Samples that do not fit the ring are dropped — the
    /// producer never blocks and never overwrites unread data.
    pub fn submit_audio(&self, samples: &[f32], pts_ns: u64) {
        if self.state() == PlaybackState::Idle {
            self.stream_start_ns.store(pts_ns, Ordering::Release);
            self.playback_threshold_ns
                .store(pts_ns + self.pre_roll_ns, Ordering::Release);
            self.state
                .store(PlaybackState::Buffering as u8, Ordering::Release);
            debug!(
                stream_start_ns = pts_ns,
                pre_roll_ms = self.config.pre_roll.as_millis() as u64,
                "buffering"
            );
        }

        let pushed = self.producer.lock().unwrap().push_slice(samples);
        if pushed < samples.len() {
            let dropped = (samples.len() - pushed) as u64;
            self.samples_dropped.fetch_add(dropped, Ordering::Relaxed);
            trace!(dropped, "audio ring full");
        }

        if self.state() == PlaybackState::Buffering
            && pts_ns >= self.playback_threshold_ns.load(Ordering::Acquire)
        {
            self.state
                .store(PlaybackState::Playing as u8, Ordering::Release);
            self.shared.playing.store(true, Ordering::Release);
            info!("playback started");
        }
    }

    /// Submit a decoded video frame with its capture timestamp.
    pub fn submit_video(&self, data: Bytes, pts_ns: u64) {
        self.queue.push(VideoFrame { pts_ns, data });
    }

    /// The audio-derived presentation clock, in stream nanoseconds.
    ///
    /// While buffering this is pinned to the playback threshold; while
    /// playing it advances with the frames the callback has emitted.
    /// Meaningless while `Idle`.
    pub fn audio_clock_ns(&self) -> u64 {
        match self.state() {
            PlaybackState::Idle => 0,
            PlaybackState::Buffering => self.playback_threshold_ns.load(Ordering::Acquire),
            PlaybackState::Playing => {
                let frames = self.shared.frames_emitted.load(Ordering::Acquire);
                let elapsed =
                    frames as u128 * NANOS_PER_SEC as u128 / self.config.sample_rate as u128;
                self.stream_start_ns.load(Ordering::Acquire) + elapsed as u64
            }
        }
    }

    /// Decide which buffered frame, if any, to present right now.
    ///
    /// `None` until playback starts. Otherwise the head of the queue
    /// is dropped while it trails the clock by more than the lateness
    /// bound, then the (new) head is returned iff it is due within the
    /// early tolerance. At most one frame per call; a returned frame
    /// is never returned again.
    pub fn next_frame(&self) -> Option<VideoFrame> {
        if self.state() != PlaybackState::Playing {
            return None;
        }

        let clock = self.audio_clock_ns();
        let cutoff = clock.saturating_sub(self.max_lateness_ns);

        let late = self.queue.drop_older_than(cutoff);
        if late > 0 {
            self.frames_dropped_late.fetch_add(late, Ordering::Relaxed);
            trace!(late, clock_ns = clock, "dropped late frames");
        }

        let frame = self.queue.pop_due(clock + self.early_tolerance_ns);
        if frame.is_some() {
            self.frames_presented.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Drop all buffered state at session end and return to `Idle`.
    ///
    /// The ring is flushed from the consumer side at the renderer's
    /// next call, so this is safe while the device callback is live.
    /// Tearing the device itself down must still be sequenced after
    /// the callback has returned — that ordering belongs to the
    /// embedder owning the device.
    pub fn reset(&self) {
        self.shared.playing.store(false, Ordering::Release);
        self.shared.flush.store(true, Ordering::Release);
        self.shared.frames_emitted.store(0, Ordering::Release);
        self.queue.clear();
        self.stream_start_ns.store(0, Ordering::Release);
        self.playback_threshold_ns.store(0, Ordering::Release);
        self.state.store(PlaybackState::Idle as u8, Ordering::Release);
        debug!("player reset");
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            frames_emitted: self.shared.frames_emitted.load(Ordering::Acquire),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            frames_dropped_late: self.frames_dropped_late.load(Ordering::Relaxed),
            frames_dropped_overflow: self.queue.overflow_dropped(),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
        }
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    /// Mono 1 kHz-per-sample config so clock math is easy to follow:
    /// 48 samples = 1 ms of audio.
    fn test_config() -> PlayerConfig {
        PlayerConfig {
            sample_rate: 48_000,
            channels: 1,
            pre_roll: Duration::from_millis(100),
            max_lateness: Duration::from_millis(30),
            early_tolerance: Duration::from_millis(5),
            queue_capacity: 16,
        }
    }

    fn chunk_ms(ms: u64) -> Vec<f32> {
        vec![0.1; (48 * ms) as usize]
    }

    /// Advance the playback clock by `ms` via the renderer.
    fn advance(renderer: &mut AudioRenderer, ms: u64) {
        let mut out = vec![0.0f32; (48 * ms) as usize];
        renderer.render(&mut out);
    }

    #[test]
    fn idle_until_first_audio() {
        let player = StreamPlayer::new(test_config());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.next_frame().is_none());

        player.submit_audio(&chunk_ms(10), 0);
        assert_eq!(player.state(), PlaybackState::Buffering);
    }

    #[test]
    fn renderer_taken_exactly_once() {
        let player = StreamPlayer::new(test_config());
        assert!(player.renderer().is_some());
        assert!(player.renderer().is_none());
    }

    #[test]
    fn buffering_clock_is_pinned_to_threshold() {
        let player = StreamPlayer::new(test_config());
        player.submit_audio(&chunk_ms(10), 50 * MS);
        assert_eq!(player.state(), PlaybackState::Buffering);
        assert_eq!(player.audio_clock_ns(), 150 * MS);
    }

    #[test]
    fn pre_roll_gates_playback_and_admission() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();

        // Video arrives at 0, 33, 66 ms while audio buffers.
        player.submit_video(Bytes::from_static(b"f0"), 0);
        player.submit_video(Bytes::from_static(b"f1"), 33 * MS);
        player.submit_video(Bytes::from_static(b"f2"), 66 * MS);

        // Audio at 0, 10, ..., 90 ms: still buffering, no frames out.
        for t in (0..100).step_by(10) {
            player.submit_audio(&chunk_ms(10), t * MS);
            assert!(player.next_frame().is_none(), "frame released at t={t}ms");
        }
        assert_eq!(player.state(), PlaybackState::Buffering);

        // The 100 ms submission crosses the threshold.
        player.submit_audio(&chunk_ms(10), 100 * MS);
        assert_eq!(player.state(), PlaybackState::Playing);

        // Clock starts at stream_start: only the first frame is due.
        let first = player.next_frame().expect("first frame due");
        assert_eq!(first.pts_ns, 0);
        assert!(player.next_frame().is_none(), "f1 is not due yet");

        // Advance the clock to 33 ms: the second frame becomes due —
        // once.
        advance(&mut renderer, 33);
        let second = player.next_frame().expect("second frame due");
        assert_eq!(second.pts_ns, 33 * MS);
        assert!(player.next_frame().is_none());
    }

    #[test]
    fn early_tolerance_admits_slightly_future_frames() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();
        player.submit_audio(&chunk_ms(10), 0);
        player.submit_audio(&chunk_ms(10), 100 * MS);
        assert_eq!(player.state(), PlaybackState::Playing);

        advance(&mut renderer, 30);

        // Clock is 30 ms; a frame at 34 ms is within the 5 ms
        // tolerance, one at 36 ms is not.
        player.submit_video(Bytes::from_static(b"soon"), 34 * MS);
        assert!(player.next_frame().is_some());

        player.submit_video(Bytes::from_static(b"later"), 36 * MS);
        assert!(player.next_frame().is_none());
    }

    #[test]
    fn late_frames_are_dropped_unseen() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();
        player.submit_audio(&chunk_ms(10), 0);
        player.submit_audio(&chunk_ms(10), 100 * MS);

        // Run the clock out to 100 ms.
        advance(&mut renderer, 100);

        // 50 ms is more than 30 ms behind the clock: dropped, and a
        // due frame behind it surfaces instead.
        player.submit_video(Bytes::from_static(b"stale"), 50 * MS);
        player.submit_video(Bytes::from_static(b"fresh"), 95 * MS);

        let frame = player.next_frame().expect("fresh frame");
        assert_eq!(frame.pts_ns, 95 * MS);
        assert_eq!(player.stats().frames_dropped_late, 1);
    }

    #[test]
    fn underrun_emits_silence_and_advances_clock() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();
        player.submit_audio(&chunk_ms(10), 0);
        player.submit_audio(&chunk_ms(10), 100 * MS);

        // Drain far more than was submitted.
        let mut out = vec![1.0f32; 48 * 50];
        renderer.render(&mut out);

        // The 20 ms of real audio came out first; the rest is silence.
        assert!(out[48 * 20..].iter().all(|&s| s == 0.0));
        // The clock still advanced by the full 50 ms.
        assert_eq!(player.audio_clock_ns(), 50 * MS);
    }

    #[test]
    fn renderer_is_silent_before_playback_starts() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();
        player.submit_audio(&chunk_ms(10), 0);

        let mut out = vec![1.0f32; 480];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(player.stats().frames_emitted, 0);
    }

    #[test]
    fn ring_overflow_drops_and_counts() {
        let player = StreamPlayer::new(test_config());

        // Ring holds 1 s + 100 ms of mono audio. Submit double that.
        let capacity = 48_000 + 4_800;
        player.submit_audio(&vec![0.5; capacity * 2], 0);
        assert_eq!(player.stats().samples_dropped, capacity as u64);

        // What was kept is the unread prefix, uncorrupted.
        player.submit_audio(&[0.5; 480], 100 * MS);
        let mut renderer = player.renderer().unwrap();
        let mut out = vec![0.0f32; 128];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn reset_returns_to_idle_and_rebuffers() {
        let player = StreamPlayer::new(test_config());
        let mut renderer = player.renderer().unwrap();
        player.submit_audio(&chunk_ms(10), 0);
        player.submit_audio(&chunk_ms(10), 100 * MS);
        player.submit_video(Bytes::from_static(b"f"), 0);
        advance(&mut renderer, 20);
        assert_eq!(player.state(), PlaybackState::Playing);

        player.reset();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.next_frame().is_none());
        assert_eq!(player.stats().frames_emitted, 0);

        // The renderer flushes stale samples and goes silent.
        let mut out = vec![1.0f32; 64];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        // A new stream anchors its own timeline.
        player.submit_audio(&chunk_ms(10), 900 * MS);
        assert_eq!(player.state(), PlaybackState::Buffering);
        assert_eq!(player.audio_clock_ns(), 1_000 * MS);
    }

    #[test]
    fn video_overflow_keeps_freshest_frames() {
        let config = PlayerConfig {
            queue_capacity: 4,
            ..test_config()
        };
        let player = StreamPlayer::new(config);

        for i in 0..6u64 {
            player.submit_video(Bytes::from_static(b"x"), i * 33 * MS);
        }
        assert_eq!(player.stats().frames_dropped_overflow, 2);
    }
}
