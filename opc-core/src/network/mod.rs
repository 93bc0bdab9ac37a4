//! Concrete output connections.
//!
//! Both flavours queue packets on an unbounded channel drained by a
//! background writer task, and report the queued-but-unwritten byte
//! count through [`OutputConnection::unflushed_bytes`](crate::OutputConnection::unflushed_bytes).

mod connection;
mod tcp;
mod ws;

pub use connection::{ConnectionInfo, DEFAULT_PORT};
pub use tcp::TcpConnection;
pub use ws::WsConnection;
