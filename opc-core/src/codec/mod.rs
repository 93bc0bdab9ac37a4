use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::OpcError;
use crate::header::{HEADER_LENGTH, MAX_PAYLOAD_SIZE, OpcHeader};
use crate::packet::Packet;

/// How the header's length bytes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthMode {
    /// Leave the packet untouched (length reserved, message-framed links).
    #[default]
    Reserved,
    /// Stamp the big-endian payload length (byte-stream links).
    Explicit,
}

/// `tokio_util` codec for OPC messages on a byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpcCodec {
    mode: LengthMode,
}

impl OpcCodec {
    pub fn new(mode: LengthMode) -> Self {
        Self { mode }
    }

    /// Codec for standard OPC over TCP.
    pub fn stream() -> Self {
        Self::new(LengthMode::Explicit)
    }

    pub fn mode(&self) -> LengthMode {
        self.mode
    }
}

impl tokio_util::codec::Decoder for OpcCodec {
    type Item = Packet;
    type Error = OpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }

        let header = OpcHeader::peek(src)?;
        let frame_len = HEADER_LENGTH + header.length() as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        Packet::from_bytes(&frame).map(Some)
    }
}

impl tokio_util::codec::Encoder<Bytes> for OpcCodec {
    type Error = OpcError;

    /// `item` is a complete packet, header included.
    fn encode(&mut self, mut item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self.mode {
            LengthMode::Reserved => dst.extend_from_slice(&item),
            LengthMode::Explicit => {
                let header = OpcHeader::peek(&item)?;
                let payload_len = item.len() - HEADER_LENGTH;
                let length = u16::try_from(payload_len).map_err(|_| OpcError::PayloadTooLarge {
                    size: payload_len,
                    max: MAX_PAYLOAD_SIZE,
                })?;
                item.advance(HEADER_LENGTH);

                dst.reserve(HEADER_LENGTH + payload_len);
                dst.put_slice(&header.with_length(length).to_bytes());
                dst.put(item);
            }
        }
        Ok(())
    }
}

impl tokio_util::codec::Encoder<Packet> for OpcCodec {
    type Error = OpcError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        tokio_util::codec::Encoder::<Bytes>::encode(self, item.into_bytes(), dst)
    }
}
