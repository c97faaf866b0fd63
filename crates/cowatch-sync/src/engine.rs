//! The reconciliation engine.
//!
//! Folds local host actions and remote State updates into one
//! [`PlaybackState`], decides which remote changes to apply, and builds the
//! State report sent back after every inbound frame.
//!
//! # Echo suppression
//!
//! A local change bumps the client counter on the next report and from then
//! on our playstate is withheld until the server acknowledges it (either by
//! echoing the counter or by claiming a server counter). Without this, the
//! server's broadcast of our own seek would come back and fight the local
//! player.

use cowatch_protocol::{ClientState, IgnoringOnTheFly, PingBlock, Playstate, ServerState};

use crate::error::SyncError;
use crate::state::{FlowControlCounters, PlaybackState};

/// A playback change the host player should perform.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Jump to `position` (seconds).
    Seek { position: f64, set_by: String },
    Pause { set_by: String },
    Unpause { set_by: String },
}

/// The parts of an inbound State that the engine reconciles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteState {
    pub playstate: Option<Playstate>,
    /// Who caused the playstate.
    pub set_by: Option<String>,
    pub ignoring: Option<IgnoringOnTheFly>,
}

impl From<&ServerState> for RemoteState {
    fn from(state: &ServerState) -> Self {
        Self {
            playstate: state.playstate.clone(),
            set_by: state.set_by().map(str::to_owned),
            ignoring: state.ignoring_on_the_fly,
        }
    }
}

/// Latency values the report carries but the engine does not own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutboundLatency {
    /// The server's last `latencyCalculation` stamp, echoed back.
    pub latency_calculation: Option<f64>,
    /// Our current RTT estimate.
    pub client_rtt: f64,
}

/// Owns playback state and the flow-control handshake for one session.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    local_user: String,
    playback: PlaybackState,
    counters: FlowControlCounters,
    /// A local change happened since the last report.
    state_changed: bool,
    /// Armed until the first remote update from someone else is applied.
    first_update_pending: bool,
    server_position: f64,
    ready: bool,
}

impl ReconciliationEngine {
    /// Creates an engine for `local_user`. Updates attributed to this name
    /// are treated as our own echoes.
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
            playback: PlaybackState::default(),
            counters: FlowControlCounters::default(),
            state_changed: false,
            first_update_pending: true,
            server_position: 0.0,
            ready: false,
        }
    }

    /// Replaces the local identity (the server may assign a different name
    /// during the handshake).
    pub fn set_local_user(&mut self, local_user: impl Into<String>) {
        self.local_user = local_user.into();
    }

    // -----------------------------------------------------------------------
    // Local changes
    // -----------------------------------------------------------------------

    /// Records a seek made by the local user.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPosition`] for NaN, infinite, or negative
    /// positions.
    pub fn apply_local_seek(&mut self, position: f64) -> Result<(), SyncError> {
        validate_position(position)?;
        self.playback.position = position;
        self.playback.pending_seek = true;
        self.state_changed = true;
        tracing::debug!(position, "local seek");
        Ok(())
    }

    /// Records a pause or unpause made by the local user.
    ///
    /// Returns `true` if this was an unpause while not yet ready. The
    /// engine then counts itself ready and the caller must announce it.
    pub fn apply_local_pause(&mut self, paused: bool) -> bool {
        self.playback.paused = paused;
        self.state_changed = true;
        tracing::debug!(paused, "local pause change");

        if !paused && !self.ready {
            self.ready = true;
            return true;
        }
        false
    }

    /// Host time update. Not a state change: nothing is announced.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPosition`] for NaN, infinite, or negative
    /// positions.
    pub fn set_position(&mut self, position: f64) -> Result<(), SyncError> {
        validate_position(position)?;
        self.playback.position = position;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Remote changes
    // -----------------------------------------------------------------------

    /// Reconciles an inbound State, returning the changes the host player
    /// should perform (a seek always comes before a pause change).
    pub fn on_remote_state(&mut self, remote: RemoteState) -> Vec<PlaybackEvent> {
        if let Some(ignoring) = remote.ignoring {
            self.apply_ignoring(ignoring);
        }

        let mut events = Vec::new();
        let Some(playstate) = remote.playstate else {
            return events;
        };
        self.server_position = playstate.position;

        let Some(set_by) = remote.set_by else {
            return events;
        };
        if set_by == self.local_user {
            tracing::trace!(%set_by, "ignoring own echo");
            return events;
        }

        let first_update = self.first_update_pending;
        let remote_seek = playstate.do_seek.unwrap_or(false) && !self.playback.pending_seek;
        if first_update || remote_seek {
            self.first_update_pending = false;
            self.playback.position = playstate.position;
            tracing::debug!(position = playstate.position, %set_by, first_update, "applying remote seek");
            events.push(PlaybackEvent::Seek {
                position: playstate.position,
                set_by: set_by.clone(),
            });
        }

        if first_update || playstate.paused != self.playback.paused {
            self.playback.paused = playstate.paused;
            tracing::debug!(paused = playstate.paused, %set_by, "applying remote pause state");
            events.push(if playstate.paused {
                PlaybackEvent::Pause { set_by }
            } else {
                PlaybackEvent::Unpause { set_by }
            });
        }

        events
    }

    fn apply_ignoring(&mut self, ignoring: IgnoringOnTheFly) {
        if let Some(server) = ignoring.server() {
            // The server claimed an in-flight change; ours is superseded.
            self.counters.server = server;
            self.counters.client = 0;
            self.state_changed = false;
            tracing::debug!(server, "server flow-control claim");
        } else if let Some(client) = ignoring.client() {
            if client == self.counters.client {
                self.counters.client = 0;
                tracing::debug!(client, "local change acknowledged");
            }
        }
    }

    /// Ages the last reported server position by one forward delay.
    pub fn advance_server_position(&mut self, forward_delay: f64) {
        if !self.playback.paused {
            self.server_position += forward_delay;
        }
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Builds the State report for the server and advances the handshake.
    ///
    /// `now` is the send time in epoch seconds.
    pub fn build_outbound_report(&mut self, latency: OutboundLatency, now: f64) -> ClientState {
        let playstate = if self.counters.suppresses_playstate() {
            None
        } else {
            let do_seek = std::mem::take(&mut self.playback.pending_seek);
            Some(Playstate {
                position: self.playback.position,
                paused: self.playback.paused,
                do_seek: do_seek.then_some(true),
                set_by: None,
            })
        };

        if self.state_changed {
            self.counters.client += 1;
            self.state_changed = false;
        }

        ClientState {
            playstate,
            ping: PingBlock {
                latency_calculation: latency.latency_calculation,
                client_latency_calculation: Some(now),
                client_rtt: Some(latency.client_rtt),
                server_rtt: None,
            },
            ignoring_on_the_fly: self.counters.take_outbound(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn counters(&self) -> FlowControlCounters {
        self.counters
    }

    /// The last reported server position, aged by forward delay.
    pub fn server_position(&self) -> f64 {
        self.server_position
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Starts the handshake over for a new connection.
    ///
    /// Position and pause state survive; counters, the pending seek, and
    /// the change marker do not, and the first-update guard re-arms.
    pub fn reset_flow_control(&mut self) {
        self.counters = FlowControlCounters::default();
        self.state_changed = false;
        self.playback.pending_seek = false;
        self.first_update_pending = true;
    }
}

fn validate_position(position: f64) -> Result<(), SyncError> {
    if !position.is_finite() || position < 0.0 {
        return Err(SyncError::InvalidPosition(position));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latency() -> OutboundLatency {
        OutboundLatency {
            latency_calculation: Some(10.0),
            client_rtt: 0.05,
        }
    }

    fn remote(position: f64, paused: bool, do_seek: bool, set_by: &str) -> RemoteState {
        RemoteState {
            playstate: Some(Playstate {
                position,
                paused,
                do_seek: do_seek.then_some(true),
                set_by: Some(set_by.into()),
            }),
            set_by: Some(set_by.into()),
            ignoring: None,
        }
    }

    fn ignoring(client: Option<u32>, server: Option<u32>) -> RemoteState {
        RemoteState {
            ignoring: Some(IgnoringOnTheFly { client, server }),
            ..RemoteState::default()
        }
    }

    /// An engine that has already taken its first remote update.
    fn settled() -> ReconciliationEngine {
        let mut engine = ReconciliationEngine::new("alice");
        engine.on_remote_state(remote(0.0, true, false, "bob"));
        engine
    }

    // --- Local changes ---

    #[test]
    fn test_local_seek_rejects_invalid_positions() {
        let mut engine = ReconciliationEngine::new("alice");
        assert!(matches!(
            engine.apply_local_seek(f64::NAN),
            Err(SyncError::InvalidPosition(_))
        ));
        assert!(engine.apply_local_seek(-1.0).is_err());
        assert!(engine.set_position(f64::INFINITY).is_err());
        assert_eq!(engine.playback().position, 0.0);
    }

    #[test]
    fn test_first_unpause_requests_ready() {
        let mut engine = ReconciliationEngine::new("alice");
        assert!(engine.apply_local_pause(false));
        assert!(engine.is_ready());
        // Already ready: no second announcement.
        assert!(!engine.apply_local_pause(true));
        assert!(!engine.apply_local_pause(false));
    }

    #[test]
    fn test_time_update_is_not_a_state_change() {
        let mut engine = ReconciliationEngine::new("alice");
        engine.set_position(12.5).unwrap();

        let report = engine.build_outbound_report(latency(), 100.0);
        assert_eq!(report.playstate.unwrap().position, 12.5);
        assert_eq!(report.ignoring_on_the_fly, None);
        assert!(engine.counters().is_steady());
    }

    // --- Reporting and echo suppression ---

    #[test]
    fn test_seek_is_reported_once_then_suppressed() {
        let mut engine = settled();
        engine.apply_local_seek(30.0).unwrap();

        let first = engine.build_outbound_report(latency(), 100.0);
        let playstate = first.playstate.expect("first report carries playstate");
        assert_eq!(playstate.position, 30.0);
        assert_eq!(playstate.do_seek, Some(true));
        assert_eq!(first.ignoring_on_the_fly.unwrap().client, Some(1));

        let second = engine.build_outbound_report(latency(), 101.0);
        assert!(second.playstate.is_none(), "unacked change must be withheld");
        assert_eq!(second.ignoring_on_the_fly.unwrap().client, Some(1));
    }

    #[test]
    fn test_server_claim_clears_pending_change() {
        let mut engine = settled();
        engine.apply_local_pause(false);
        engine.build_outbound_report(latency(), 100.0);
        assert_eq!(engine.counters().client, 1);

        engine.on_remote_state(ignoring(None, Some(4)));
        assert_eq!(engine.counters(), FlowControlCounters { client: 0, server: 4 });

        let report = engine.build_outbound_report(latency(), 101.0);
        assert!(report.playstate.is_some());
        assert_eq!(
            report.ignoring_on_the_fly,
            Some(IgnoringOnTheFly {
                client: None,
                server: Some(4)
            })
        );

        // Server counter echoed once, then steady.
        let report = engine.build_outbound_report(latency(), 102.0);
        assert_eq!(report.ignoring_on_the_fly, None);
        assert!(engine.counters().is_steady());
    }

    #[test]
    fn test_server_claim_drops_unreported_change() {
        let mut engine = settled();
        engine.apply_local_seek(5.0).unwrap();
        engine.on_remote_state(ignoring(None, Some(1)));

        let report = engine.build_outbound_report(latency(), 100.0);
        let block = report.ignoring_on_the_fly.unwrap();
        assert_eq!(block.client, None);
        assert_eq!(block.server, Some(1));
    }

    #[test]
    fn test_echoed_client_counter_acknowledges() {
        let mut engine = settled();
        engine.apply_local_seek(8.0).unwrap();
        engine.build_outbound_report(latency(), 100.0);

        // A stale counter does not count as an ack.
        engine.on_remote_state(ignoring(Some(7), None));
        assert_eq!(engine.counters().client, 1);

        engine.on_remote_state(ignoring(Some(1), None));
        assert!(engine.counters().is_steady());
        assert!(engine.build_outbound_report(latency(), 101.0).playstate.is_some());
    }

    #[test]
    fn test_report_carries_ping_block() {
        let mut engine = ReconciliationEngine::new("alice");
        let report = engine.build_outbound_report(latency(), 123.5);

        assert_eq!(report.ping.latency_calculation, Some(10.0));
        assert_eq!(report.ping.client_latency_calculation, Some(123.5));
        assert_eq!(report.ping.client_rtt, Some(0.05));
        assert_eq!(report.ping.server_rtt, None);
    }

    // --- Remote changes ---

    #[test]
    fn test_first_remote_update_is_applied() {
        let mut engine = ReconciliationEngine::new("alice");
        let events = engine.on_remote_state(remote(42.0, true, true, "bob"));

        assert_eq!(
            events,
            vec![
                PlaybackEvent::Seek {
                    position: 42.0,
                    set_by: "bob".into()
                },
                PlaybackEvent::Pause {
                    set_by: "bob".into()
                },
            ]
        );
        assert_eq!(engine.playback().position, 42.0);
    }

    #[test]
    fn test_plain_update_after_first_is_not_a_seek() {
        let mut engine = settled();
        let events = engine.on_remote_state(remote(50.0, true, false, "bob"));
        assert!(events.is_empty());
        assert_eq!(engine.playback().position, 0.0);
        assert_eq!(engine.server_position(), 50.0);
    }

    #[test]
    fn test_remote_seek_applied_after_first_update() {
        let mut engine = settled();
        let events = engine.on_remote_state(remote(77.0, true, true, "bob"));

        assert_eq!(
            events,
            vec![PlaybackEvent::Seek {
                position: 77.0,
                set_by: "bob".into()
            }]
        );
        assert_eq!(engine.playback().position, 77.0);
        assert!(!engine.playback().pending_seek);
    }

    #[test]
    fn test_remote_seek_applied_once_local_seek_reported() {
        let mut engine = settled();
        engine.apply_local_seek(10.0).unwrap();
        engine.build_outbound_report(latency(), 100.0);

        let events = engine.on_remote_state(remote(90.0, true, true, "bob"));
        assert_eq!(
            events,
            vec![PlaybackEvent::Seek {
                position: 90.0,
                set_by: "bob".into()
            }]
        );
        assert_eq!(engine.playback().position, 90.0);
    }

    #[test]
    fn test_remote_seek_ignored_while_local_seek_pending() {
        let mut engine = settled();
        engine.apply_local_seek(10.0).unwrap();

        let events = engine.on_remote_state(remote(90.0, true, true, "bob"));
        assert!(events.is_empty());
        assert_eq!(engine.playback().position, 10.0);
    }

    #[test]
    fn test_remote_unpause_is_applied() {
        let mut engine = settled();
        let events = engine.on_remote_state(remote(3.0, false, false, "carol"));
        assert_eq!(
            events,
            vec![PlaybackEvent::Unpause {
                set_by: "carol".into()
            }]
        );
        assert!(!engine.playback().paused);
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let mut engine = ReconciliationEngine::new("alice");
        let events = engine.on_remote_state(remote(99.0, false, true, "alice"));

        assert!(events.is_empty());
        assert!(engine.playback().paused);
        assert_eq!(engine.server_position(), 99.0);
    }

    #[test]
    fn test_position_extrapolated_by_forward_delay() {
        let mut engine = settled();
        engine.on_remote_state(remote(10.0, false, false, "bob"));
        engine.advance_server_position(2.0);
        assert_eq!(engine.server_position(), 12.0);

        engine.on_remote_state(remote(20.0, true, false, "bob"));
        engine.advance_server_position(2.0);
        assert_eq!(engine.server_position(), 20.0);
    }

    #[test]
    fn test_reset_rearms_first_update() {
        let mut engine = settled();
        engine.apply_local_seek(4.0).unwrap();
        engine.build_outbound_report(latency(), 100.0);

        engine.reset_flow_control();
        assert!(engine.counters().is_steady());
        assert!(!engine.playback().pending_seek);
        assert_eq!(engine.playback().position, 4.0);

        let events = engine.on_remote_state(remote(7.0, true, false, "bob"));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_remote_state_from_server_state() {
        let state: ServerState = serde_json::from_value(serde_json::json!({
            "playstate": {"position": 42.0, "paused": true, "doSeek": true},
            "setBy": "bob",
            "ignoringOnTheFly": {"server": 2}
        }))
        .unwrap();

        let remote = RemoteState::from(&state);
        assert_eq!(remote.set_by.as_deref(), Some("bob"));
        assert_eq!(remote.ignoring.unwrap().server, Some(2));
    }
}
