//! WebSocket connection to fcserver.
//!
//! fcserver accepts OPC packets as binary WebSocket messages with the
//! header's length bytes reserved, so packets go out exactly as the
//! encoder built them. Text messages from the server (JSON replies) are
//! read and ignored.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::connection::{ConnectionInfo, LinkState, Outbound, pump};
use crate::connection::{OutputConnection, ReadyState};

/// A WebSocket client handle.
///
/// [`open`](Self::open) returns immediately in `Connecting`; the
/// handshake runs on a background task. Must be created inside a tokio
/// runtime.
#[derive(Debug)]
pub struct WsConnection {
    link: Arc<LinkState>,
    outbound: Outbound,
    task: JoinHandle<()>,
}

impl WsConnection {
    pub fn open(info: &ConnectionInfo) -> Self {
        Self::open_url(info.ws_url())
    }

    pub fn open_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let link = Arc::new(LinkState::new());
        let (outbound, rx) = Outbound::channel();
        let task = tokio::spawn(run(url, Arc::clone(&link), rx));
        Self {
            link,
            outbound,
            task,
        }
    }

    /// Wait for the handshake to finish (or fail).
    pub async fn ready(&self) -> ReadyState {
        self.link.settled().await
    }

    /// Total bytes written to the socket.
    pub fn bytes_sent(&self) -> u64 {
        self.link.bytes_sent()
    }

    pub fn close(&self) {
        if self.link.mark_closed() {
            info!("websocket closed locally");
        }
        self.task.abort();
    }
}

impl OutputConnection for WsConnection {
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

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(url: String, link: Arc<LinkState>, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(%url, "websocket connect failed: {e}");
            link.mark_closed();
            return;
        }
    };

    if !link.mark_open() {
        // Closed locally while the handshake was in flight.
        return;
    }
    info!(%url, "websocket open");

    let (sink, mut incoming) = ws.split();

    let reader = async {
        while let Some(msg) = incoming.next().await {
            match msg {
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server sent close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("websocket read error: {e}");
                    break;
                }
            }
        }
    };
    let writer = pump(sink, &mut rx, &link, Message::Binary);

    tokio::select! {
        _ = reader => {}
        _ = writer => {}
    }

    if link.mark_closed() {
        info!(%url, "websocket closed");
    }
}
