//! Viewer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ssrd_core::PlayerConfig;

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Identity settings.
    pub auth: AuthConfig,
    /// Playback engine tuning.
    pub playback: PlaybackConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server address (IP:port).
    pub server_addr: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Delay before reconnecting after a lost session.
    pub reconnect_delay_ms: u64,
}

/// Identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path to the private-key PEM file proving this viewer's identity.
    pub identity: String,
}

/// Playback engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Audio sample rate of the incoming stream.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Pre-roll buffering before playback starts.
    pub pre_roll_ms: u64,
    /// Video frames older than this fall behind the audio clock and
    /// are dropped.
    pub max_lateness_ms: u64,
    /// Video frames at most this far ahead are presented.
    pub early_tolerance_ms: u64,
    /// Video queue bound in frames.
    pub queue_frames: usize,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:1998".into(),
            connect_timeout_ms: 5000,
            reconnect_delay_ms: 2000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let identity = std::env::var("HOME")
            .map(|home| format!("{home}/.ssrd/private.pem"))
            .unwrap_or_else(|_| ".ssrd/private.pem".into());
        Self { identity }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            pre_roll_ms: 100,
            max_lateness_ms: 30,
            early_tolerance_ms: 5,
            queue_frames: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl PlaybackConfig {
    /// Translate into the engine's configuration.
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            pre_roll: Duration::from_millis(self.pre_roll_ms),
            max_lateness: Duration::from_millis(self.max_lateness_ms),
            early_tolerance: Duration::from_millis(self.early_tolerance_ms),
            queue_capacity: self.queue_frames,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
