//! Frame encoder: samples a rendered frame through a [`SampleGrid`] and
//! sends the result as one OPC packet.
//!
//! Each call to [`encode_and_send`](FrameEncoder::encode_and_send) is a
//! single synchronous pass over the grid:
//!
//! - **Not open**: nothing is built; the call returns immediately.
//! - **Backlogged**: the connection still holds more unflushed bytes than
//!   the [`BackpressurePolicy`] allows, so the frame is dropped.
//! - **Otherwise**: a `4 + 3*N` byte packet is filled in grid order and
//!   handed to the connection exactly once.

use std::fmt;

use tracing::{debug, trace};

use crate::connection::OutputConnection;
use crate::error::Result;
use crate::frame::{FrameSource, Rgba};
use crate::grid::{SampleGrid, SamplePoint};
use crate::packet::{BYTES_PER_PIXEL, Packet};
use crate::policy::BackpressurePolicy;

// ── SendOutcome ──────────────────────────────────────────────────

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOutcome {
    /// A packet was handed to the connection.
    Sent,
    /// The connection was not open.
    NotOpen,
    /// The connection's backlog exceeded the policy allowance.
    Backpressure,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::Sent => write!(f, "sent"),
            SendOutcome::NotOpen => write!(f, "not open"),
            SendOutcome::Backpressure => write!(f, "backpressure"),
        }
    }
}

// ── EncoderStats ─────────────────────────────────────────────────

/// Running frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderStats {
    pub sent: u64,
    pub skipped_not_open: u64,
    pub skipped_backpressure: u64,
}

impl EncoderStats {
    pub fn total(&self) -> u64 {
        self.sent + self.skipped_not_open + self.skipped_backpressure
    }

    fn record(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Sent => self.sent += 1,
            SendOutcome::NotOpen => self.skipped_not_open += 1,
            SendOutcome::Backpressure => self.skipped_backpressure += 1,
        }
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Reusable sampler bound to one grid.
///
/// Create it once at setup and call it from the render loop every frame.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    grid: SampleGrid,
    policy: BackpressurePolicy,
    stats: EncoderStats,
    last_outcome: Option<SendOutcome>,
}

impl FrameEncoder {
    pub fn new(grid: SampleGrid) -> Self {
        Self {
            grid,
            policy: BackpressurePolicy::default(),
            stats: EncoderStats::default(),
            last_outcome: None,
        }
    }

    /// Like [`new`](Self::new), but fails if any grid point falls outside a
    /// `width × height` frame.
    pub fn for_frame(grid: SampleGrid, width: u32, height: u32) -> Result<Self> {
        grid.validate(width, height)?;
        Ok(Self::new(grid))
    }

    pub fn with_policy(mut self, policy: BackpressurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Length of every packet this encoder produces.
    pub fn packet_len(&self) -> usize {
        self.grid.packet_len()
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Sample `frame` into a fresh packet without sending it.
    pub fn encode<F: FrameSource + ?Sized>(&self, frame: &F) -> Packet {
        let mut packet = Packet::with_pixel_count(self.grid.len());
        let (width, height) = (frame.width(), frame.height());

        for (dst, point) in packet
            .pixels_mut()
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(self.grid.iter())
        {
            let c = sample(frame, *point, width, height).rgb();
            dst.copy_from_slice(&[c.r, c.g, c.b]);
        }
        packet
    }

    /// Encode `frame` and send it over `conn`, unless the connection is
    /// not open or is backlogged.
    pub fn encode_and_send<F, C>(&mut self, frame: &F, conn: &C) -> SendOutcome
    where
        F: FrameSource + ?Sized,
        C: OutputConnection + ?Sized,
    {
        let outcome = self.try_send(frame, conn);
        self.stats.record(outcome);

        if self.last_outcome != Some(outcome) {
            debug!(%outcome, previous = ?self.last_outcome, "frame outcome changed");
            self.last_outcome = Some(outcome);
        }
        outcome
    }

    fn try_send<F, C>(&self, frame: &F, conn: &C) -> SendOutcome
    where
        F: FrameSource + ?Sized,
        C: OutputConnection + ?Sized,
    {
        let state = conn.state();
        if !state.is_open() {
            trace!(%state, "connection not open, frame skipped");
            return SendOutcome::NotOpen;
        }

        let packet_len = self.packet_len();
        let unflushed = conn.unflushed_bytes();
        if self.policy.should_skip(unflushed, packet_len) {
            trace!(unflushed, packet_len, "connection backlogged, frame skipped");
            return SendOutcome::Backpressure;
        }

        let packet = self.encode(frame);
        conn.send_binary(packet.into_bytes());
        trace!(packet_len, "frame sent");
        SendOutcome::Sent
    }
}

/// Nearest pixel at `point`. Points outside the frame break the grid
/// contract; debug builds assert, release builds clamp to the edge.
fn sample<F: FrameSource + ?Sized>(frame: &F, point: SamplePoint, width: u32, height: u32) -> Rgba {
    debug_assert!(
        point.x < width && point.y < height,
        "sample ({}, {}) outside {width}x{height} frame",
        point.x,
        point.y,
    );
    if width == 0 || height == 0 {
        return Rgba::default();
    }
    frame.pixel(point.x.min(width - 1), point.y.min(height - 1))
}

// ── Tests ────────────────────────────────────────────────────────
