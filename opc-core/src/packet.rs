use std::fmt::Debug;

use bytes::Bytes;

use crate::error::{OpcError, Result};
use crate::frame::Rgb;
use crate::header::{HEADER_LENGTH, MAX_PAYLOAD_SIZE, OpcHeader};
use crate::message::Command;

/// Bytes per pixel in a "Set Pixel Colors" payload.
pub const BYTES_PER_PIXEL: usize = 3;

/// Wire length of a pixel packet carrying `pixel_count` pixels.
pub const fn packet_len(pixel_count: usize) -> usize {
    HEADER_LENGTH + BYTES_PER_PIXEL * pixel_count
}

/// A complete OPC message held in one contiguous buffer so it can be
/// handed to a transport without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    header: OpcHeader,
    buf: Vec<u8>,
}

impl Packet {
    /// Channel-0 "Set Pixel Colors" packet of `pixel_count` black pixels
    /// with an all-zero header.
    pub fn with_pixel_count(pixel_count: usize) -> Self {
        let header = OpcHeader::set_pixel_colors(0);
        let mut buf = vec![0u8; packet_len(pixel_count)];
        buf[..HEADER_LENGTH].copy_from_slice(&header.to_bytes());
        Self { header, buf }
    }

    /// Build a packet around an arbitrary payload.
    pub fn new(header: OpcHeader, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(OpcError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let mut buf = Vec::with_capacity(HEADER_LENGTH + payload.len());
        buf.extend_from_slice(&header.to_bytes());
        buf.extend_from_slice(payload);
        Ok(Self { header, buf })
    }

    /// Parse a single OPC message.
    ///
    /// A zero length field is read as "reserved" and the payload runs to
    /// the end of `bytes`; otherwise the field must match exactly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = OpcHeader::peek(bytes)?;
        let payload_len = bytes.len() - HEADER_LENGTH;

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(OpcError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if header.length() != 0 && header.length() as usize != payload_len {
            return Err(OpcError::InvalidPacketLength {
                expected: HEADER_LENGTH + header.length() as usize,
                actual: bytes.len(),
            });
        }
        if header.command() == Command::SetPixelColors && payload_len % BYTES_PER_PIXEL != 0 {
            return Err(OpcError::InvalidHeader(
                "pixel payload is not a whole number of RGB triples",
            ));
        }

        Ok(Self {
            header,
            buf: bytes.to_vec(),
        })
    }

    pub fn header(&self) -> &OpcHeader {
        &self.header
    }

    /// Total wire length including the header.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    pub fn pixel_count(&self) -> usize {
        self.payload().len() / BYTES_PER_PIXEL
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_LENGTH..]
    }

    /// Mutable view of the pixel payload, `[R, G, B]` per pixel.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_LENGTH..]
    }

    /// Colour of pixel `index`, if present.
    pub fn pixel(&self, index: usize) -> Option<Rgb> {
        let start = index.checked_mul(BYTES_PER_PIXEL)?;
        let rgb = self.payload().get(start..start + BYTES_PER_PIXEL)?;
        Some(Rgb::new(rgb[0], rgb[1], rgb[2]))
    }

    pub fn pixels(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.payload()
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

impl Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header)
            .field("pixels", &self.pixel_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_packet_has_expected_length_and_zero_header() {
        let packet = Packet::with_pixel_count(1024);
        assert_eq!(packet.len(), 4 + 3 * 1024);
        assert_eq!(&packet.as_bytes()[..4], &[0, 0, 0, 0]);
        assert_eq!(packet.pixel_count(), 1024);
        assert!(packet.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn pixel_accessors() {
        let mut packet = Packet::with_pixel_count(2);
        packet.pixels_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(packet.pixel(1), Some(Rgb::new(4, 5, 6)));
        assert_eq!(packet.pixel(2), None);
        assert_eq!(packet.pixels().count(), 2);
    }

    #[test]
    fn from_bytes_accepts_reserved_length() {
        let bytes = [0, 0, 0, 0, 9, 8, 7];
        let packet = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(packet.pixel(0), Some(Rgb::new(9, 8, 7)));
    }

    #[test]
    fn from_bytes_checks_explicit_length() {
        let bytes = [0, 0, 0, 6, 9, 8, 7];
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(OpcError::InvalidPacketLength {
                expected: 10,
                actual: 7
            })
        ));
    }

    #[test]
    fn from_bytes_rejects_partial_pixel() {
        assert!(Packet::from_bytes(&[0, 0, 0, 0, 1, 2]).is_err());
    }

    #[test]
    fn sysex_payload_may_be_any_length() {
        let packet = Packet::from_bytes(&[0, 0xFF, 0, 2, 0x00, 0x01]).unwrap();
        assert_eq!(packet.header().command(), Command::SystemExclusive);
        assert_eq!(packet.payload(), &[0x00, 0x01]);
    }

    #[test]
    fn new_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(Packet::new(OpcHeader::set_pixel_colors(0), &payload).is_err());
    }
}
