//! Configuration for the sender.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use opc_core::{BackpressurePolicy, FrameEncoder, GridLayout, Rgb, SampleGrid};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Where to send frames.
    pub network: NetworkConfig,
    /// Frame size, rate and source.
    pub frame: FrameConfig,
    /// LED-to-pixel mapping.
    pub grid: GridLayout,
    /// When to drop frames instead of queueing them.
    pub backpressure: BackpressurePolicy,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `host` or `host:port` of the OPC server.
    pub server: String,
    /// Wire transport.
    pub transport: Transport,
    /// Delay before reopening a closed connection; 0 disables reconnects.
    pub reconnect_ms: u64,
}

/// How packets reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// One binary WebSocket message per packet.
    Ws,
    /// Length-framed OPC over raw TCP.
    Tcp,
}

/// Frame configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frames per second.
    pub fps: u8,
    /// Source frame width in pixels.
    pub width: u32,
    /// Source frame height in pixels.
    pub height: u32,
    /// Where frames come from.
    pub source: SourceKind,
    /// Test card drawn by the `pattern` source.
    pub pattern: Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A static built-in test card.
    Pattern,
    /// Raw RGBA frames of `width * height * 4` bytes on stdin.
    Stdin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Pattern {
    /// Eight vertical bars: white, yellow, cyan, green, magenta, red, blue, black.
    ColorBars,
    /// One colour everywhere.
    Solid { r: u8, g: u8, b: u8 },
}

impl Pattern {
    pub fn solid(colour: Rgb) -> Self {
        Pattern::Solid {
            r: colour.r,
            g: colour.g,
            b: colour.b,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", opc_core::DEFAULT_PORT),
            transport: Transport::Ws,
            reconnect_ms: 2000,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 32,
            height: 32,
            source: SourceKind::Pattern,
            pattern: Pattern::ColorBars,
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

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; one that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the frame encoder, validating the grid against the frame size
    /// and, for TCP, against the header's 16-bit length field.
    pub fn encoder(&self) -> opc_core::Result<FrameEncoder> {
        let grid = SampleGrid::from_layout(&self.grid)?;
        if self.network.transport == Transport::Tcp {
            grid.check_stream_length()?;
        }
        Ok(FrameEncoder::for_frame(grid, self.frame.width, self.frame.height)?
            .with_policy(self.backpressure))
    }

    /// Tick rate, clamped to 1..=120 fps.
    pub fn fps(&self) -> u8 {
        self.frame.fps.clamp(1, 120)
    }
}

// ── Tests ────────────────────────────────────────────────────────
