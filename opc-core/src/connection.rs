//! The connection seam the encoder transmits through.
//!
//! The encoder only reads state and hands over finished packets; opening,
//! closing and reconnecting belong to whoever owns the connection.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Observable lifecycle of an output connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadyState {
    /// Connect in progress; sends are dropped.
    #[default]
    Connecting,
    /// Ready to accept packets.
    Open,
    /// Terminal. Sends are dropped.
    Closed,
}

impl ReadyState {
    pub fn is_open(self) -> bool {
        self == ReadyState::Open
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Connecting => write!(f, "connecting"),
            ReadyState::Open => write!(f, "open"),
            ReadyState::Closed => write!(f, "closed"),
        }
    }
}

/// A live byte-stream connection to an OPC server.
pub trait OutputConnection {
    fn state(&self) -> ReadyState;

    /// Bytes accepted by [`send_binary`](Self::send_binary) but not yet
    /// handed to the socket. Advisory only.
    fn unflushed_bytes(&self) -> usize;

    /// Queue one binary message. Never blocks and never reports failure;
    /// a broken link shows up as a later `Closed` state.
    fn send_binary(&self, packet: Bytes);
}

impl<C: OutputConnection + ?Sized> OutputConnection for &C {
    fn state(&self) -> ReadyState {
        (**self).state()
    }

    fn unflushed_bytes(&self) -> usize {
        (**self).unflushed_bytes()
    }

    fn send_binary(&self, packet: Bytes) {
        (**self).send_binary(packet)
    }
}

impl<C: OutputConnection + ?Sized> OutputConnection for Arc<C> {
    fn state(&self) -> ReadyState {
        (**self).state()
    }

    fn unflushed_bytes(&self) -> usize {
        (**self).unflushed_bytes()
    }

    fn send_binary(&self, packet: Bytes) {
        (**self).send_binary(packet)
    }
}
