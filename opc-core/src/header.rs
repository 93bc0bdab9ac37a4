use crate::error::{OpcError, Result};
use crate::message::Command;

/// Size of an OPC header on the wire.
pub const HEADER_LENGTH: usize = 4;

/// Largest payload a 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

pub type OpcHeaderBytes = [u8; HEADER_LENGTH];

/// The four-byte OPC header: channel, command, big-endian length.
///
/// fcserver's WebSocket interface treats the length bytes as reserved,
/// so frames produced by the encoder carry `length == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpcHeader {
    channel: u8,
    command: Command,
    length: u16,
}

impl OpcHeader {
    pub fn new(channel: u8, command: Command, length: u16) -> Self {
        Self {
            channel,
            command,
            length,
        }
    }

    /// "Set Pixel Colors" on `channel` with the length left reserved.
    pub fn set_pixel_colors(channel: u8) -> Self {
        Self::new(channel, Command::SetPixelColors, 0)
    }

    pub fn to_bytes(&self) -> OpcHeaderBytes {
        let [hi, lo] = self.length.to_be_bytes();
        [self.channel, self.command.into(), hi, lo]
    }

    pub fn from_bytes(bytes: OpcHeaderBytes) -> Result<Self> {
        let command = Command::try_from(bytes[1])?;
        Ok(Self {
            channel: bytes[0],
            command,
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    /// Parse the header at the front of `bytes`.
    pub fn peek(bytes: &[u8]) -> Result<Self> {
        let head: OpcHeaderBytes = bytes
            .get(..HEADER_LENGTH)
            .and_then(|h| h.try_into().ok())
            .ok_or(OpcError::InvalidHeader("fewer than 4 bytes"))?;
        Self::from_bytes(head)
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    /// Same header with the length field stamped.
    pub fn with_length(mut self, length: u16) -> Self {
        self.length = length;
        self
    }

    /// `true` when every header byte is zero.
    pub fn is_zeroed(&self) -> bool {
        self.to_bytes() == [0; HEADER_LENGTH]
    }
}
