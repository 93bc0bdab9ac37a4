//! Raw OPC over TCP.
//!
//! A byte stream has no message boundaries, so packets are written
//! through [`OpcCodec::stream`], which fills in the header length.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use super::connection::{ConnectionInfo, LinkState, Outbound, pump};
use crate::codec::OpcCodec;
use crate::connection::{OutputConnection, ReadyState};

/// A TCP client handle. Behaves like [`WsConnection`](super::WsConnection).
#[derive(Debug)]
pub struct TcpConnection {
    link: Arc<LinkState>,
    outbound: Outbound,
    task: JoinHandle<()>,
}

impl TcpConnection {
    pub fn open(info: &ConnectionInfo) -> Self {
        let addr = info.to_string();
        let link = Arc::new(LinkState::new());
        let (outbound, rx) = Outbound::channel();
        let task_link = Arc::clone(&link);
        let task = tokio::spawn(async move {
            match TcpStream::connect(addr.as_str()).await {
                Ok(stream) => run(stream, addr, task_link, rx).await,
                Err(e) => {
                    warn!(%addr, "tcp connect failed: {e}");
                    task_link.mark_closed();
                }
            }
        });
        Self {
            link,
            outbound,
            task,
        }
    }

    /// Wrap a stream that is already connected; starts out `Open`.
    pub fn from_stream(stream: TcpStream) -> Self {
        let addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".into());
        let link = Arc::new(LinkState::new());
        let (outbound, rx) = Outbound::channel();
        link.mark_open();
        let task = tokio::spawn(run(stream, addr, Arc::clone(&link), rx));
        Self {
            link,
            outbound,
            task,
        }
    }

    pub async fn ready(&self) -> ReadyState {
        self.link.settled().await
    }

    pub fn bytes_sent(&self) -> u64 {
        self.link.bytes_sent()
    }

    pub fn close(&self) {
        if self.link.mark_closed() {
            info!("tcp connection closed locally");
        }
        self.task.abort();
    }
}

impl OutputConnection for TcpConnection {
    fn state(&self) -> ReadyState {
        self.link.state()
    }

    fn unflushed_bytes(&self) -> usize {
        self.link.unflushed()
    }

    fn send_binary(&self, packet: Bytes) {
        self.outbound.send(&self.link, packet);
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    stream: TcpStream,
    addr: String,
    link: Arc<LinkState>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("set_nodelay failed: {e}");
    }
    // No-op for `from_stream`, which opens the link up front.
    link.mark_open();
    if !link.state().is_open() {
        return;
    }
    info!(%addr, "tcp connection open");

    let (sink, mut incoming) = Framed::new(stream, OpcCodec::stream()).split::<Bytes>();

    // Servers do not normally talk back; this only notices EOF.
    let reader = async {
        while let Some(frame) = incoming.next().await {
            if let Err(e) = frame {
                warn!("tcp read error: {e}");
                break;
            }
        }
    };
    let writer = pump(sink, &mut rx, &link, |packet: Bytes| packet);

    tokio::select! {
        _ = reader => {}
        _ = writer => {}
    }

    if link.mark_closed() {
        info!(%addr, "tcp connection closed");
    }
}
