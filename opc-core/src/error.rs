//! Domain-specific error types for OPC encoding and transport.
//!
//! The per-frame path (`FrameEncoder::encode_and_send`) never returns an
//! error; everything here is raised either while parsing wire bytes or
//! while validating configuration at setup time.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = OpcError> = std::result::Result<T, E>;

/// The canonical error type for the OPC core.
#[derive(Debug, Error)]
pub enum OpcError {
    // ── Wire Errors ──────────────────────────────────────────────
    /// A header field could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// A command byte did not map to a known command.
    #[error("unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// The buffer is shorter or longer than its header announces.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    /// The payload exceeds what a 16-bit length field can carry.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Configuration Errors ─────────────────────────────────────
    /// A sample grid must contain at least one point.
    #[error("sample grid is empty")]
    EmptyGrid,

    /// A fractional sample position was negative or not finite.
    #[error("invalid sample position ({x}, {y}) at index {index}")]
    InvalidPosition { index: usize, x: f64, y: f64 },

    /// A grid point lies outside the frame it will be sampled from.
    #[error("sample {index} at ({x}, {y}) is outside a {width}x{height} frame")]
    SampleOutOfBounds {
        index: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// A pixel buffer is smaller than its declared dimensions.
    #[error("frame buffer too small: need {needed} bytes, got {actual}")]
    FrameTooSmall { needed: usize, actual: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for OpcError {
    fn from(s: String) -> Self {
        OpcError::Other(s)
    }
}

impl From<&str> for OpcError {
    fn from(s: &str) -> Self {
        OpcError::Other(s.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for OpcError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        OpcError::WebSocket(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = OpcError::SampleOutOfBounds {
            index: 7,
            x: 40,
            y: 2,
            width: 32,
            height: 32,
        };
        let text = e.to_string();
        assert!(text.contains("sample 7"));
        assert!(text.contains("32x32"));

        let e = OpcError::PayloadTooLarge {
            size: 70000,
            max: 65535,
        };
        assert!(e.to_string().contains("70000"));
    }

    #[test]
    fn from_string() {
        let e: OpcError = "something broke".into();
        assert!(matches!(e, OpcError::Other(_)));
    }

    #[test]
    fn from_websocket_error() {
        let e: OpcError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(e, OpcError::WebSocket(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: OpcError = io_err.into();
        assert!(matches!(e, OpcError::Connection(_)));
    }
}
