//! Message channel abstraction for cowatch.
//!
//! Provides the [`MessageChannel`] trait: one long-lived, ordered,
//! duplicate-free pipe between a client and a sync server. The session
//! layer only ever sees this trait, so the wire carrier can be swapped
//! without touching the synchronization logic.
//!
//! # Implementations
//!
//! - [`WebSocketChannel`]: client-side WebSocket via `tokio-tungstenite`
//!   (feature `websocket`, default)
//! - [`MemoryChannel`]: an in-process pair backed by tokio channels,
//!   used by tests and embedders that run the server in the same process

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryChannel;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all channel kinds.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single open channel to the sync server.
///
/// Delivery is ordered and never duplicated for the lifetime of one
/// channel. Reconnecting means opening a new channel.
pub trait MessageChannel: Send + Sync + 'static {
    /// The error type for channel operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the channel is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the channel.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this channel.
    fn id(&self) -> ConnectionId;
}
