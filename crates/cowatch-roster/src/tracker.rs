//! Roster tracker: applies List snapshots and Set diffs.

use cowatch_protocol::{ListSnapshot, ReadyUpdate, ServerSet, UserUpdate};

use crate::{Roster, RosterError, UserRecord};

/// A change to the roster, in the order it should be published.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterEvent {
    Joined { user: String, room: String },
    Left { user: String, room: String },
    /// An already-known user switched rooms.
    Moved { user: String, room: String },
    /// The roster after the change. Always the last event of a batch.
    Updated(Roster),
}

/// Keeps the client's view of every participant.
///
/// Every mutating call returns the events it caused, ending with exactly
/// one [`RosterEvent::Updated`] carrying the new roster.
#[derive(Debug, Clone, Default)]
pub struct RosterTracker {
    users: Roster,
}

impl RosterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Replaces the whole roster with a List snapshot.
    ///
    /// Entries with an empty username are skipped with a warning.
    pub fn replace_all(&mut self, snapshot: &ListSnapshot) -> Vec<RosterEvent> {
        self.users.clear();
        for (room, users) in snapshot {
            for (username, entry) in users {
                if username.is_empty() {
                    tracing::warn!(%room, "skipping roster entry with empty username");
                    continue;
                }
                self.users.insert(
                    username.clone(),
                    UserRecord::from_list_entry(username, room, entry),
                );
            }
        }
        tracing::debug!(users = self.users.len(), "roster replaced");
        vec![self.updated()]
    }

    /// Like [`replace_all`](Self::replace_all), but rejects the whole
    /// snapshot if any entry is invalid. The roster is untouched on error.
    ///
    /// # Errors
    /// Returns [`RosterError::InvalidUsername`] for an empty username.
    pub fn try_replace_all(
        &mut self,
        snapshot: &ListSnapshot,
    ) -> Result<Vec<RosterEvent>, RosterError> {
        for (room, users) in snapshot {
            if users.contains_key("") {
                return Err(RosterError::InvalidUsername { room: room.clone() });
            }
        }
        Ok(self.replace_all(snapshot))
    }

    // -----------------------------------------------------------------------
    // Diffs
    // -----------------------------------------------------------------------

    /// Applies one `Set.user` entry.
    pub fn apply_user_event(&mut self, username: &str, update: &UserUpdate) -> Vec<RosterEvent> {
        let room = update.room.name.as_str();
        let event = update.event.unwrap_or_default();
        let mut events = Vec::new();
        let mut removed = false;

        if event.is_joined() {
            self.users
                .insert(username.to_owned(), UserRecord::new(username, room));
            tracing::debug!(user = %username, %room, "user joined");
            events.push(RosterEvent::Joined {
                user: username.to_owned(),
                room: room.to_owned(),
            });
        } else if event.is_left() {
            self.users.remove(username);
            removed = true;
            tracing::debug!(user = %username, %room, "user left");
            events.push(RosterEvent::Left {
                user: username.to_owned(),
                room: room.to_owned(),
            });
        } else {
            match self.users.get_mut(username) {
                Some(record) if record.room != room => {
                    record.room = room.to_owned();
                    tracing::debug!(user = %username, %room, "user moved");
                    events.push(RosterEvent::Moved {
                        user: username.to_owned(),
                        room: room.to_owned(),
                    });
                }
                Some(_) => {}
                None => {
                    self.users
                        .insert(username.to_owned(), UserRecord::new(username, room));
                }
            }
        }

        if !removed {
            if let Some(file) = &update.file {
                if let Some(record) = self.users.get_mut(username) {
                    record.file = Some(file.clone());
                }
            }
        }

        events.push(self.updated());
        events
    }

    /// Applies one `Set.ready` update, creating the user if unknown.
    pub fn apply_ready_event(&mut self, update: &ReadyUpdate) -> Vec<RosterEvent> {
        let record = self
            .users
            .entry(update.username.clone())
            .or_insert_with(|| UserRecord::new(update.username.as_str(), ""));
        record.is_ready = update.is_ready;
        record.manually_initiated = Some(update.manually_initiated);
        tracing::debug!(user = %update.username, is_ready = ?update.is_ready, "readiness changed");
        vec![self.updated()]
    }

    /// Applies the roster parts of a whole Set block: user entries in
    /// username order, then readiness.
    pub fn apply_set(&mut self, set: &ServerSet) -> Vec<RosterEvent> {
        let mut events = Vec::new();
        if let Some(users) = &set.user {
            for (username, update) in users {
                events.extend(self.apply_user_event(username, update));
            }
        }
        if let Some(ready) = &set.ready {
            events.extend(self.apply_ready_event(ready));
        }
        events
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn roster(&self) -> &Roster {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Forgets everyone. Used when a new connection starts.
    pub fn clear(&mut self) {
        self.users.clear();
    }

    /// Users currently in `room`, in username order.
    pub fn users_in_room<'a>(&'a self, room: &'a str) -> impl Iterator<Item = &'a UserRecord> + 'a {
        self.users.values().filter(move |u| u.room == room)
    }

    fn updated(&self) -> RosterEvent {
        RosterEvent::Updated(self.users.clone())
    }
}

#[cfg(test)]
mod tests {
    use cowatch_protocol::{RoomName, UserEvent};

    use super::*;

    fn update(room: &str, joined: bool, left: bool) -> UserUpdate {
        UserUpdate {
            room: RoomName::new(room),
            event: Some(UserEvent {
                joined: joined.then_some(true),
                left: left.then_some(true),
            }),
            file: None,
        }
    }

    #[test]
    fn test_new_tracker_is_empty() {
        let tracker = RosterTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_left_unknown_user_is_tolerated() {
        let mut tracker = RosterTracker::new();
        let events = tracker.apply_user_event("ghost", &update("movie", false, true));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RosterEvent::Left { .. }));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_plain_update_for_unknown_user_inserts_silently() {
        let mut tracker = RosterTracker::new();
        let events = tracker.apply_user_event("bob", &update("movie", false, false));

        assert_eq!(events.len(), 1, "only the Updated event");
        assert_eq!(tracker.get("bob").unwrap().room, "movie");
    }

    #[test]
    fn test_same_room_update_is_not_a_move() {
        let mut tracker = RosterTracker::new();
        tracker.apply_user_event("bob", &update("movie", true, false));
        let events = tracker.apply_user_event("bob", &update("movie", false, false));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_ready_event_creates_unknown_user() {
        let mut tracker = RosterTracker::new();
        tracker.apply_ready_event(&ReadyUpdate {
            username: "carol".into(),
            manually_initiated: true,
            is_ready: Some(true),
        });

        let carol = tracker.get("carol").unwrap();
        assert_eq!(carol.is_ready, Some(true));
        assert_eq!(carol.manually_initiated, Some(true));
        assert_eq!(carol.room, "");
    }

    #[test]
    fn test_clear_forgets_everyone() {
        let mut tracker = RosterTracker::new();
        tracker.apply_user_event("bob", &update("movie", true, false));
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
