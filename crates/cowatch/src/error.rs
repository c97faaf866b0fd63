//! Unified error type for cowatch.

use cowatch_protocol::ProtocolError;
use cowatch_roster::RosterError;
use cowatch_sync::SyncError;
use cowatch_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `cowatch` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum CowatchError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected local playback change.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Invalid roster or identity input.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// `connect` was called on a client that already has a channel.
    #[error("session is already connected")]
    AlreadyConnected,

    /// The operation needs an open channel.
    #[error("session is not connected")]
    NotConnected,

    /// The server refused the session before the handshake completed.
    #[error("server rejected the session: {0}")]
    Rejected(String),
}
