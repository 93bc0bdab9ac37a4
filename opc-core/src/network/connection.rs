//! Plumbing shared by the concrete connections: ready-state tracking,
//! the unflushed byte counter and the background writer loop.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use futures::{Sink, SinkExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::connection::ReadyState;
use crate::error::OpcError;

/// fcserver's default listening port.
pub const DEFAULT_PORT: u16 = 7890;

// ── LinkState ────────────────────────────────────────────────────

/// State shared between a connection handle and its background tasks.
#[derive(Debug)]
pub(crate) struct LinkState {
    state: watch::Sender<ReadyState>,
    unflushed: AtomicUsize,
    bytes_sent: AtomicU64,
}

impl LinkState {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(ReadyState::Connecting),
            unflushed: AtomicUsize::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> ReadyState {
        *self.state.borrow()
    }

    /// `Connecting -> Open`. A link that already closed stays closed.
    pub(crate) fn mark_open(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == ReadyState::Connecting {
                *s = ReadyState::Open;
                true
            } else {
                false
            }
        })
    }

    /// Any state `-> Closed`. Queued bytes are forgotten.
    pub(crate) fn mark_closed(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s != ReadyState::Closed {
                *s = ReadyState::Closed;
                true
            } else {
                false
            }
        });
        self.unflushed.store(0, Ordering::Release);
        changed
    }

    /// Resolves once the link has left `Connecting`.
    pub(crate) async fn settled(&self) -> ReadyState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s != ReadyState::Connecting).await {
            Ok(state) => *state,
            Err(_) => ReadyState::Closed,
        }
    }

    pub(crate) fn unflushed(&self) -> usize {
        self.unflushed.load(Ordering::Acquire)
    }

    pub(crate) fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    fn queued(&self, len: usize) {
        self.unflushed.fetch_add(len, Ordering::AcqRel);
    }

    /// `len` bytes left the queue; `delivered` says whether they reached
    /// the socket.
    fn flushed(&self, len: usize, delivered: bool) {
        if delivered {
            self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
        }
        // Saturating: `mark_closed` may already have reset the counter.
        let _ = self
            .unflushed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(len))
            });
    }
}

// ── Outbound ─────────────────────────────────────────────────────

/// Non-blocking producer side of a connection.
#[derive(Debug)]
pub(crate) struct Outbound {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl Outbound {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `packet` if the link is open; drop it silently otherwise.
    pub(crate) fn send(&self, link: &LinkState, packet: Bytes) {
        if !link.state().is_open() {
            return;
        }
        let len = packet.len();
        link.queued(len);
        if self.tx.send(packet).is_err() {
            link.flushed(len, false);
            link.mark_closed();
        }
    }
}

/// Drain `rx` into `sink` until the channel or the sink fails.
///
/// Each packet's bytes stay counted as unflushed until the sink has
/// accepted and flushed them.
pub(crate) async fn pump<S, T, F>(
    mut sink: S,
    rx: &mut mpsc::UnboundedReceiver<Bytes>,
    link: &LinkState,
    wrap: F,
) -> Result<(), OpcError>
where
    S: Sink<T> + Unpin,
    S::Error: Into<OpcError>,
    F: Fn(Bytes) -> T,
{
    while let Some(packet) = rx.recv().await {
        let len = packet.len();
        let result = sink.send(wrap(packet)).await;
        link.flushed(len, result.is_ok());
        if let Err(e) = result {
            let e = e.into();
            warn!("write error: {e}");
            return Err(e);
        }
    }
    debug!("outbound channel closed");
    Ok(())
}

// ── ConnectionInfo ───────────────────────────────────────────────

/// Address of an OPC server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of fcserver's WebSocket endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ConnectionInfo {
    type Err = OpcError;

    /// `host` or `host:port`; the port defaults to 7890.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OpcError::Other("empty server address".into()));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| OpcError::Other(format!("invalid port in {s:?}")))?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(OpcError::Other(format!("missing host in {s:?}"))),
            None => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}
