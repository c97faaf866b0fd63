//! Playback state and flow-control counters: the data the reconciliation
//! engine owns.

use cowatch_protocol::IgnoringOnTheFly;

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// The local player's view of playback.
///
/// `position` only moves backwards on an applied seek; while unpaused the
/// host keeps advancing it through time updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Current position in seconds.
    pub position: f64,
    /// Whether playback is paused.
    pub paused: bool,
    /// A local seek that has not been announced to the server yet.
    pub pending_seek: bool,
}

/// A fresh client starts at zero, paused, with nothing to announce.
impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position: 0.0,
            paused: true,
            pending_seek: false,
        }
    }
}

// ---------------------------------------------------------------------------
// FlowControlCounters
// ---------------------------------------------------------------------------

/// The "ignoring on the fly" counter pair.
///
/// ```text
///   (0, 0) ──local change──→ (1, 0) ──server claims n──→ (0, n)
///     ↑                        │                           │
///     └──── server echoes ─────┘                           │
///     └──────────── n echoed back once ────────────────────┘
/// ```
///
/// - `client > 0`: we changed state and the server has not acknowledged
///   it yet. Our playstate is withheld so we don't keep overwriting
///   the group with a change it may already be reconciling.
/// - `server > 0`: the server declared an in-flight change of its own. We
///   echo the counter back exactly once as our acknowledgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowControlCounters {
    pub client: u32,
    pub server: u32,
}

impl FlowControlCounters {
    /// Both counters at zero: state changes broadcast freely.
    pub fn is_steady(&self) -> bool {
        self.client == 0 && self.server == 0
    }

    /// Our playstate is withheld while we wait for an ack, unless the
    /// server has claimed an overlapping change itself.
    pub fn suppresses_playstate(&self) -> bool {
        self.client > 0 && self.server == 0
    }

    /// Builds the outbound counter block and consumes the server counter.
    ///
    /// Returns `None` when both counters are zero (zero is never sent).
    pub(crate) fn take_outbound(&mut self) -> Option<IgnoringOnTheFly> {
        if self.is_steady() {
            return None;
        }
        let block = IgnoringOnTheFly {
            client: (self.client > 0).then_some(self.client),
            server: (self.server > 0).then_some(self.server),
        };
        // The server counter is acknowledged by echoing it once.
        self.server = 0;
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_default_is_paused_at_zero() {
        let p = PlaybackState::default();
        assert_eq!(p.position, 0.0);
        assert!(p.paused);
        assert!(!p.pending_seek);
    }

    #[test]
    fn test_counters_steady_state() {
        let c = FlowControlCounters::default();
        assert!(c.is_steady());
        assert!(!c.suppresses_playstate());
    }

    #[test]
    fn test_client_pending_suppresses_playstate() {
        let c = FlowControlCounters { client: 1, server: 0 };
        assert!(c.suppresses_playstate());
    }

    #[test]
    fn test_server_claim_lifts_suppression() {
        let c = FlowControlCounters { client: 1, server: 2 };
        assert!(!c.suppresses_playstate());
    }

    #[test]
    fn test_take_outbound_steady_is_none() {
        let mut c = FlowControlCounters::default();
        assert_eq!(c.take_outbound(), None);
    }

    #[test]
    fn test_take_outbound_echoes_server_once() {
        let mut c = FlowControlCounters { client: 0, server: 3 };

        let first = c.take_outbound().unwrap();
        assert_eq!(first.server, Some(3));
        assert_eq!(first.client, None);

        assert_eq!(c.server, 0);
        assert_eq!(c.take_outbound(), None);
    }

    #[test]
    fn test_take_outbound_keeps_client_until_acked() {
        let mut c = FlowControlCounters { client: 2, server: 0 };

        assert_eq!(c.take_outbound().unwrap().client, Some(2));
        assert_eq!(c.take_outbound().unwrap().client, Some(2));
        assert_eq!(c.client, 2);
    }
}
