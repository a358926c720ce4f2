//! Host configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Trust store settings.
    pub auth: AuthConfig,
    /// Stream settings.
    pub stream: StreamConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address and port to listen on.
    pub listen_addr: String,
}

/// Trust store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Directory of authorized public-key PEM files. Deleting a file
    /// revokes that peer before the next handshake.
    pub authorized_keys_dir: String,
}

/// Stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Audio sample rate delivered to clients.
    pub sample_rate: u32,
    /// Interleaved audio channel count.
    pub channels: u16,
    /// Run the synthetic test-pattern source when no capture backend
    /// is wired in.
    pub test_source: bool,
    /// Test-pattern width.
    pub width: u32,
    /// Test-pattern height.
    pub height: u32,
    /// Test-pattern frame rate.
    pub fps: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:1998".into(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let dir = std::env::var("HOME")
            .map(|home| format!("{home}/.ssrd/authorized"))
            .unwrap_or_else(|_| ".ssrd/authorized".into());
        Self {
            authorized_keys_dir: dir,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            test_source: true,
            width: 640,
            height: 480,
            fps: 30,
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

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
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
