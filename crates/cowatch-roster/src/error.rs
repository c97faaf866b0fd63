//! Error types for the roster layer.

/// Errors that can occur while validating roster input.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// A snapshot entry with an empty username, listed under `room`.
    #[error("empty username in room {room:?}")]
    InvalidUsername { room: String },
}
