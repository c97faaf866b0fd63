//! Error types for the sync layer.

/// Errors that can occur while applying local playback changes.
///
/// Remote updates never fail: whatever the server says is recorded, and
/// anything missing is simply absent. Only host-initiated changes are
/// validated, because a bad local value would be broadcast to everyone.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A seek or time update with a NaN, infinite, or negative position.
    #[error("invalid playback position: {0}")]
    InvalidPosition(f64),
}
