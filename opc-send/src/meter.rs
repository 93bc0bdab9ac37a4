//! Outgoing throughput for the periodic status line.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bytes per second averaged over a fixed trailing window.
///
/// The rate is the bytes of every send inside `(now - window, now]`
/// divided by the window length, so a lone packet reads as that packet
/// spread over the window and an idle link decays to zero.
pub struct RateMeter {
    window: Duration,
    sends: VecDeque<(Instant, usize)>,
    lifetime_bytes: u64,
}

impl RateMeter {
    /// A meter averaging over the last second.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            sends: VecDeque::new(),
            lifetime_bytes: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one packet of `len` bytes leaving now.
    pub fn record(&mut self, len: usize) {
        self.record_at(Instant::now(), len);
    }

    pub fn record_at(&mut self, at: Instant, len: usize) {
        self.sends.push_back((at, len));
        self.lifetime_bytes += len as u64;
        while self
            .sends
            .front()
            .is_some_and(|&(sent, _)| at.saturating_duration_since(sent) >= self.window)
        {
            self.sends.pop_front();
        }
    }

    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec_at(Instant::now())
    }

    pub fn bytes_per_sec_at(&self, now: Instant) -> u64 {
        let in_window: u64 = self
            .sends
            .iter()
            .rev()
            .take_while(|&&(sent, _)| now.saturating_duration_since(sent) < self.window)
            .map(|&(_, len)| len as u64)
            .sum();
        (in_window as f64 / self.window.as_secs_f64()) as u64
    }

    /// Sends still held for the current window.
    pub fn sample_count(&self) -> usize {
        self.sends.len()
    }

    /// Every byte recorded since the meter was created.
    pub fn total_bytes(&self) -> u64 {
        self.lifetime_bytes
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: usize = 3076;

    #[test]
    fn idle_meter_reads_zero() {
        assert_eq!(RateMeter::new().bytes_per_sec(), 0);
    }

    #[test]
    fn steady_stream_matches_true_rate() {
        // 10 packets a second for three seconds.
        let mut meter = RateMeter::new();
        let start = Instant::now();
        for i in 0..30 {
            meter.record_at(start + Duration::from_millis(100 * i), PACKET);
        }
        let last = start + Duration::from_millis(2900);
        assert_eq!(meter.bytes_per_sec_at(last), 10 * PACKET as u64);
        assert_eq!(meter.sample_count(), 10);
        assert_eq!(meter.total_bytes(), 30 * PACKET as u64);
    }

    #[test]
    fn single_packet_is_spread_over_the_window() {
        let mut meter = RateMeter::new();
        let at = Instant::now();
        meter.record_at(at, PACKET);
        assert_eq!(meter.bytes_per_sec_at(at), PACKET as u64);
    }

    #[test]
    fn sparse_packets_average_over_a_long_window() {
        let mut meter = RateMeter::with_window(Duration::from_secs(5));
        let start = Instant::now();
        meter.record_at(start, PACKET);
        meter.record_at(start + Duration::from_secs(1), PACKET);
        // 6152 bytes across five seconds.
        assert_eq!(meter.bytes_per_sec_at(start + Duration::from_secs(1)), 1230);
    }

    #[test]
    fn rate_decays_once_sends_stop() {
        let mut meter = RateMeter::new();
        let at = Instant::now();
        meter.record_at(at, PACKET);
        assert_eq!(meter.bytes_per_sec_at(at + Duration::from_secs(2)), 0);
        assert_eq!(meter.total_bytes(), PACKET as u64);
    }
}
