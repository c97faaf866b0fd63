//! Round-trip latency tracking.
//!
//! The sync engine does not care how latency is estimated; it only needs
//! the current RTT (to report back to the server) and a one-way forward
//! delay (to age remote positions). [`LatencyTracker`] is that contract,
//! and [`PingService`] is the default smoothing implementation.

use std::time::{SystemTime, UNIX_EPOCH};

/// Weight of the previous average in the RTT moving average.
pub const PING_MOVING_AVERAGE_WEIGHT: f64 = 0.85;

/// One round-trip observation taken from an inbound ping block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    /// Our own send timestamp, echoed back by the server (epoch seconds).
    pub sent_at: f64,
    /// The server's RTT estimate for its side of the link.
    pub server_rtt: f64,
}

/// Produces an RTT estimate and a forward delay from round-trip samples.
///
/// `now` is passed in rather than read from the clock so implementations
/// stay deterministic under test.
pub trait LatencyTracker: Send + Sync + 'static {
    /// Folds one sample observed at `now` (epoch seconds) into the estimate.
    fn receive_sample(&mut self, sample: LatencySample, now: f64);

    /// The most recent round-trip time in seconds (0 before any sample).
    fn rtt(&self) -> f64;

    /// Estimated one-way server → client delay in seconds.
    fn forward_delay(&self) -> f64;
}

/// Exponentially smoothed RTT with an asymmetry correction for the
/// forward delay.
///
/// The forward delay is half the average RTT, plus however much longer
/// our last round trip took than the server's. That surplus is assumed
/// to sit on the server → client leg.
#[derive(Debug, Clone, Default)]
pub struct PingService {
    rtt: f64,
    avg_rtt: f64,
    forward_delay: f64,
}

impl PingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The smoothed RTT.
    pub fn average_rtt(&self) -> f64 {
        self.avg_rtt
    }
}

impl LatencyTracker for PingService {
    fn receive_sample(&mut self, sample: LatencySample, now: f64) {
        if sample.sent_at <= 0.0 {
            return;
        }
        let rtt = now - sample.sent_at;
        if rtt < 0.0 || sample.server_rtt < 0.0 {
            tracing::debug!(rtt, server_rtt = sample.server_rtt, "discarding negative latency sample");
            return;
        }

        self.rtt = rtt;
        if self.avg_rtt == 0.0 {
            self.avg_rtt = rtt;
        }
        self.avg_rtt = self.avg_rtt * PING_MOVING_AVERAGE_WEIGHT
            + rtt * (1.0 - PING_MOVING_AVERAGE_WEIGHT);

        self.forward_delay = if sample.server_rtt < rtt {
            self.avg_rtt / 2.0 + (rtt - sample.server_rtt)
        } else {
            self.avg_rtt / 2.0
        };
    }

    fn rtt(&self) -> f64 {
        self.rtt
    }

    fn forward_delay(&self) -> f64 {
        self.forward_delay
    }
}

/// Current wall-clock time in epoch seconds, the unit every ping field uses.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
