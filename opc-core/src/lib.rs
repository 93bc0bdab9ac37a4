//! # opc-core
//!
//! Samples rendered frames down to LED resolution and ships them to an
//! Open Pixel Control server without ever blocking the render loop.
//!
//! This crate contains:
//! - **Wire types**: `OpcHeader`, `Command`, `Packet`
//! - **Codec**: `OpcCodec` for framed OPC over a byte stream via `tokio_util`
//! - **Frames**: the `FrameSource` trait and the owned `RgbaFrame`
//! - **Grid**: `SampleGrid`, the fixed LED-to-pixel mapping
//! - **Encoder**: `FrameEncoder::encode_and_send`, guarded by a `BackpressurePolicy`
//! - **Connections**: the `OutputConnection` seam plus `WsConnection` and `TcpConnection`
//! - **Error**: typed `OpcError` built on `thiserror`

pub mod codec;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod grid;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod policy;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{LengthMode, OpcCodec};
pub use connection::{OutputConnection, ReadyState};
pub use encoder::{EncoderStats, FrameEncoder, SendOutcome};
pub use error::{OpcError, Result};
pub use frame::{FrameSource, PixelFormat, Rgb, Rgba, RgbaFrame};
pub use grid::{FitAxis, GridLayout, SampleGrid, SamplePoint};
pub use header::{HEADER_LENGTH, MAX_PAYLOAD_SIZE, OpcHeader};
pub use message::Command;
pub use network::{ConnectionInfo, DEFAULT_PORT, TcpConnection, WsConnection};
pub use packet::{Packet, packet_len};
pub use policy::BackpressurePolicy;
