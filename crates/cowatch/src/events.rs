//! Session events and the sinks that receive them.

use cowatch_roster::{Roster, RosterEvent};
use cowatch_sync::PlaybackEvent;
use tokio::sync::mpsc;

/// Something the embedding application should react to.
///
/// Events caused by one inbound frame are published in dispatch order
/// (Error, Hello, Set, List, State, Chat).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed. Carries a human-readable banner.
    Connected(String),
    /// The server reported an error.
    Error(String),
    Joined { user: String, room: String },
    Left { user: String, room: String },
    Moved { user: String, room: String },
    RosterUpdated(Roster),
    /// The local player should jump to `position`.
    Seek { position: f64, set_by: String },
    Pause { set_by: String },
    Unpause { set_by: String },
    Chat { user: String, message: String },
}

impl From<RosterEvent> for SessionEvent {
    fn from(event: RosterEvent) -> Self {
        match event {
            RosterEvent::Joined { user, room } => Self::Joined { user, room },
            RosterEvent::Left { user, room } => Self::Left { user, room },
            RosterEvent::Moved { user, room } => Self::Moved { user, room },
            RosterEvent::Updated(roster) => Self::RosterUpdated(roster),
        }
    }
}

impl From<PlaybackEvent> for SessionEvent {
    fn from(event: PlaybackEvent) -> Self {
        match event {
            PlaybackEvent::Seek { position, set_by } => Self::Seek { position, set_by },
            PlaybackEvent::Pause { set_by } => Self::Pause { set_by },
            PlaybackEvent::Unpause { set_by } => Self::Unpause { set_by },
        }
    }
}

/// Receives session events. Publishing is fire-and-forget.
pub trait EventSink: Send + 'static {
    fn publish(&mut self, event: SessionEvent);
}

/// Forwards events to a channel; a dropped receiver silently discards them.
impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn publish(&mut self, event: SessionEvent) {
        if self.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Records events in order. Handy for tests and replay.
impl EventSink for Vec<SessionEvent> {
    fn publish(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// Adapts a closure into an [`EventSink`].
///
/// ```rust
/// use cowatch::{EventSink, FnSink, SessionEvent};
///
/// let mut sink = FnSink(|event: SessionEvent| println!("{event:?}"));
/// sink.publish(SessionEvent::Error("boom".into()));
/// ```
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: FnMut(SessionEvent) + Send + 'static,
{
    fn publish(&mut self, event: SessionEvent) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_roster_event_conversion() {
        let event: SessionEvent = RosterEvent::Moved {
            user: "bob".into(),
            room: "lobby".into(),
        }
        .into();
        assert_eq!(
            event,
            SessionEvent::Moved {
                user: "bob".into(),
                room: "lobby".into()
            }
        );
    }

    #[test]
    fn test_playback_event_conversion() {
        let event: SessionEvent = PlaybackEvent::Seek {
            position: 4.0,
            set_by: "bob".into(),
        }
        .into();
        assert!(matches!(event, SessionEvent::Seek { position, .. } if position == 4.0));
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
        drop(rx);
        tx.publish(SessionEvent::Error("nobody listening".into()));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (mut tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        tx.publish(SessionEvent::Connected("hi".into()));
        assert_eq!(rx.recv().await, Some(SessionEvent::Connected("hi".into())));
    }

    #[test]
    fn test_fn_sink_calls_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = Arc::clone(&seen);
        let mut sink = FnSink(move |event: SessionEvent| seen_in_sink.lock().unwrap().push(event));

        sink.publish(SessionEvent::Pause {
            set_by: "bob".into(),
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
