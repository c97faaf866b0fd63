//! One participant and the roster map.

use std::collections::BTreeMap;

use cowatch_protocol::{ClientFeatures, FileInfo, ListEntry};

/// The full roster, ordered by username so that snapshots compare equal
/// and iterate deterministically.
pub type Roster = BTreeMap<String, UserRecord>;

/// What the client knows about one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub room: String,
    pub file: Option<FileInfo>,
    pub is_ready: Option<bool>,
    pub manually_initiated: Option<bool>,
    /// Last position the server listed for this user.
    pub position: Option<f64>,
    pub controller: Option<bool>,
    pub features: Option<ClientFeatures>,
}

impl UserRecord {
    /// A bare record: name and room, nothing else known.
    pub fn new(username: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room: room.into(),
            file: None,
            is_ready: None,
            manually_initiated: None,
            position: None,
            controller: None,
            features: None,
        }
    }

    /// Builds a record from one List snapshot entry.
    pub(crate) fn from_list_entry(username: &str, room: &str, entry: &ListEntry) -> Self {
        Self {
            file: entry.file.clone(),
            is_ready: entry.is_ready,
            position: entry.position,
            controller: entry.controller,
            features: entry.features.clone(),
            ..Self::new(username, room)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_bare() {
        let record = UserRecord::new("bob", "movie");
        assert_eq!(record.username, "bob");
        assert_eq!(record.room, "movie");
        assert_eq!(record.file, None);
        assert_eq!(record.is_ready, None);
    }

    #[test]
    fn test_from_list_entry_copies_fields() {
        let entry = ListEntry {
            position: Some(12.0),
            file: Some(FileInfo::new("a.mkv", 90.0)),
            controller: Some(false),
            features: None,
            is_ready: Some(true),
        };

        let record = UserRecord::from_list_entry("bob", "movie", &entry);
        assert_eq!(record.position, Some(12.0));
        assert_eq!(record.is_ready, Some(true));
        assert_eq!(record.file.as_ref().map(|f| f.name.as_str()), Some("a.mkv"));
        assert_eq!(record.manually_initiated, None);
    }
}
