//! Backpressure policy: when to drop a frame instead of queueing it.

use serde::{Deserialize, Serialize};

/// Decides whether a connection's outbound backlog is too large to
/// accept another packet.
///
/// Skipped frames are never queued or retried; the next tick's frame
/// supersedes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "limit", rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Skip while more than one packet's worth of bytes is unflushed.
    #[default]
    PacketLength,
    /// Skip while more than `n` packets' worth of bytes is unflushed.
    Frames(usize),
    /// Skip while more than this many bytes are unflushed.
    Bytes(usize),
    /// Always send.
    Disabled,
}

impl BackpressurePolicy {
    /// Largest backlog that still admits a packet of `packet_len` bytes,
    /// or `None` when the policy never skips.
    pub fn allowance(&self, packet_len: usize) -> Option<usize> {
        match *self {
            BackpressurePolicy::PacketLength => Some(packet_len),
            BackpressurePolicy::Frames(n) => Some(packet_len.saturating_mul(n)),
            BackpressurePolicy::Bytes(limit) => Some(limit),
            BackpressurePolicy::Disabled => None,
        }
    }

    /// `true` when a packet of `packet_len` bytes should be dropped.
    pub fn should_skip(&self, unflushed: usize, packet_len: usize) -> bool {
        self.allowance(packet_len)
            .is_some_and(|allowed| unflushed > allowed)
    }
}
