//! Error types for the protocol layer.
//!
//! Each crate in cowatch defines its own error enum, so a `ProtocolError`
//! always means the problem is in turning messages into bytes or back,
//! never in the channel or the sync logic.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or wrong data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but is not a valid protocol message, e.g. a
    /// frame whose top level is not an object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
