//! Sender service core logic.
//!
//! Opens a connection to the OPC server, then ticks at the configured
//! frame rate, encoding the latest frame and handing it to the
//! connection. A closed connection is reopened after a delay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use opc_core::{
    ConnectionInfo, FrameEncoder, OutputConnection, ReadyState, TcpConnection, WsConnection,
};

use crate::config::{SenderConfig, Transport};
use crate::feed::FrameFeed;
use crate::meter::RateMeter;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

// ── Link ─────────────────────────────────────────────────────────

/// Either transport behind one handle.
enum Link {
    Ws(WsConnection),
    Tcp(TcpConnection),
}

impl Link {
    fn open(transport: Transport, info: &ConnectionInfo) -> Self {
        match transport {
            Transport::Ws => Link::Ws(WsConnection::open(info)),
            Transport::Tcp => Link::Tcp(TcpConnection::open(info)),
        }
    }

    fn bytes_sent(&self) -> u64 {
        match self {
            Link::Ws(c) => c.bytes_sent(),
            Link::Tcp(c) => c.bytes_sent(),
        }
    }

    fn close(&self) {
        match self {
            Link::Ws(c) => c.close(),
            Link::Tcp(c) => c.close(),
        }
    }
}

impl OutputConnection for Link {
    fn state(&self) -> ReadyState {
        match self {
            Link::Ws(c) => c.state(),
            Link::Tcp(c) => c.state(),
        }
    }

    fn unflushed_bytes(&self) -> usize {
        match self {
            Link::Ws(c) => c.unflushed_bytes(),
            Link::Tcp(c) => c.unflushed_bytes(),
        }
    }

    fn send_binary(&self, packet: Bytes) {
        match self {
            Link::Ws(c) => c.send_binary(packet),
            Link::Tcp(c) => c.send_binary(packet),
        }
    }
}

// ── SenderService ────────────────────────────────────────────────

/// Why [`SenderService::drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveEnd {
    /// The stop handle was cleared.
    Stopped,
    /// The connection reached `Closed`.
    ConnectionClosed,
    /// A piped frame source hit end of input.
    SourceEnded,
}

/// The top-level sender.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until stopped, the frame source ends, or a connection closes
    /// with reconnects disabled.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let info: ConnectionInfo = self.config.network.server.parse()?;
        let transport = self.config.network.transport;
        let mut encoder = self.config.encoder()?;
        let mut feed = FrameFeed::from_config(&self.config.frame);
        let mut meter = RateMeter::new();
        let reconnect = Duration::from_millis(self.config.network.reconnect_ms);

        while self.is_running() {
            info!(server = %info, ?transport, "connecting");
            let link = Link::open(transport, &info);
            let end = self
                .drive(&link, &mut feed, &mut encoder, &mut meter)
                .await;
            info!(?end, bytes_sent = link.bytes_sent(), "link finished");
            link.close();

            match end {
                DriveEnd::Stopped | DriveEnd::SourceEnded => break,
                DriveEnd::ConnectionClosed if reconnect.is_zero() => {
                    warn!("connection closed and reconnects are disabled");
                    break;
                }
                DriveEnd::ConnectionClosed => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(reconnect) => {}
                _ = Self::wait_for_stop(&self.running) => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        let stats = encoder.stats();
        info!(
            sent = stats.sent,
            skipped_not_open = stats.skipped_not_open,
            skipped_backpressure = stats.skipped_backpressure,
            "sender stopped"
        );
        Ok(())
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tick loop for one connection. Never waits on the connection: a
    /// tick that finds it connecting or backlogged just skips the frame.
    pub async fn drive<C: OutputConnection>(
        &self,
        conn: &C,
        feed: &mut FrameFeed,
        encoder: &mut FrameEncoder,
        meter: &mut RateMeter,
    ) -> DriveEnd {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.fps()));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_report = Instant::now();

        loop {
            ticker.tick().await;

            if !self.is_running() {
                return DriveEnd::Stopped;
            }
            if conn.state() == ReadyState::Closed {
                return DriveEnd::ConnectionClosed;
            }

            let outcome = feed
                .latest()
                .map(|frame| encoder.encode_and_send(frame, conn));
            if outcome.is_some_and(|o| o.is_sent()) {
                meter.record(encoder.packet_len());
            }
            if feed.is_finished() {
                return DriveEnd::SourceEnded;
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                let stats = encoder.stats();
                info!(
                    state = %conn.state(),
                    sent = stats.sent,
                    skipped_not_open = stats.skipped_not_open,
                    skipped_backpressure = stats.skipped_backpressure,
                    bytes_per_sec = meter.bytes_per_sec(),
                    total_bytes = meter.total_bytes(),
                    "sender status"
                );
                last_report = Instant::now();
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::io::Cursor;

    use opc_core::GridLayout;

    use crate::config::Pattern;
    use crate::feed::PipedFrames;

    /// Open until it has taken `close_after` packets.
    struct CountingConnection {
        state: Cell<ReadyState>,
        sent: RefCell<Vec<Bytes>>,
        close_after: usize,
    }

    impl CountingConnection {
        fn new(close_after: usize) -> Self {
            Self {
                state: Cell::new(ReadyState::Open),
                sent: RefCell::new(Vec::new()),
                close_after,
            }
        }
    }

    impl OutputConnection for CountingConnection {
        fn state(&self) -> ReadyState {
            self.state.get()
        }

        fn unflushed_bytes(&self) -> usize {
            0
        }

        fn send_binary(&self, packet: Bytes) {
            let mut sent = self.sent.borrow_mut();
            sent.push(packet);
            if sent.len() >= self.close_after {
                self.state.set(ReadyState::Closed);
            }
        }
    }

    fn fast_config() -> SenderConfig {
        let mut cfg = SenderConfig::default();
        cfg.frame.fps = 120;
        cfg
    }

    #[test]
    fn new_service_is_not_running() {
        let svc = SenderService::new(SenderConfig::default());
        assert!(!svc.is_running());
    }

    #[test]
    fn stop_handle_shares_flag() {
        let svc = SenderService::new(SenderConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!handle.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drive_sends_until_connection_closes() {
        let mut cfg = fast_config();
        cfg.frame.pattern = Pattern::Solid { r: 9, g: 8, b: 7 };
        let svc = SenderService::new(cfg.clone());
        svc.stop_handle().store(true, Ordering::SeqCst);

        let conn = CountingConnection::new(3);
        let mut feed = FrameFeed::from_config(&cfg.frame);
        let mut encoder = cfg.encoder().unwrap();
        let mut meter = RateMeter::with_window(Duration::from_secs(60));

        let end = tokio::time::timeout(
            Duration::from_secs(5),
            svc.drive(&conn, &mut feed, &mut encoder, &mut meter),
        )
        .await
        .expect("drive never returned");

        assert_eq!(end, DriveEnd::ConnectionClosed);
        let sent = conn.sent.borrow();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].len(), 3076);
        assert_eq!(&sent[0][..7], &[0, 0, 0, 0, 9, 8, 7]);
        assert_eq!(encoder.stats().sent, 3);
        assert_eq!(meter.sample_count(), 3);
    }

    #[tokio::test]
    async fn drive_returns_when_stopped() {
        let cfg = fast_config();
        let svc = SenderService::new(cfg.clone());

        let conn = CountingConnection::new(usize::MAX);
        let mut feed = FrameFeed::from_config(&cfg.frame);
        let mut encoder = cfg.encoder().unwrap();
        let mut meter = RateMeter::new();

        let end = svc.drive(&conn, &mut feed, &mut encoder, &mut meter).await;
        assert_eq!(end, DriveEnd::Stopped);
        assert!(conn.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn drive_ends_with_piped_source() {
        let mut cfg = fast_config();
        cfg.frame.width = 1;
        cfg.frame.height = 1;
        cfg.grid = GridLayout::Matrix { cols: 1, rows: 1 };
        let svc = SenderService::new(cfg.clone());
        svc.stop_handle().store(true, Ordering::SeqCst);

        let conn = CountingConnection::new(usize::MAX);
        let mut feed = FrameFeed::Piped(PipedFrames::spawn(Cursor::new(vec![5, 6, 7, 255]), 1, 1));
        let mut encoder = cfg.encoder().unwrap();
        let mut meter = RateMeter::new();

        let end = tokio::time::timeout(
            Duration::from_secs(5),
            svc.drive(&conn, &mut feed, &mut encoder, &mut meter),
        )
        .await
        .expect("drive never returned");

        assert_eq!(end, DriveEnd::SourceEnded);
        let sent = conn.sent.borrow();
        assert!(!sent.is_empty());
        assert_eq!(&sent[sent.len() - 1][..], &[0, 0, 0, 0, 5, 6, 7]);
    }
}
