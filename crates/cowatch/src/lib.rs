//! # cowatch
//!
//! Synchronized media playback against Syncplay-compatible servers.
//!
//! cowatch keeps a local player in step with everyone else in a room: it
//! applies remote seeks and pauses, announces local ones without echoing
//! them back and forth, tracks who is in which room, and estimates
//! network latency so remote positions can be aged to "now".
//!
//! The host application drives a [`SessionClient`]: it reports local
//! player actions through the host operations and reacts to
//! [`SessionEvent`]s delivered to its [`EventSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cowatch::prelude::*;
//!
//! # async fn run() -> Result<(), CowatchError> {
//! let sink = FnSink(|event: SessionEvent| println!("{event:?}"));
//! let mut client = SessionClientBuilder::new()
//!     .username("alice")
//!     .room("movie")
//!     .connect(sink)
//!     .await?;
//! client.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod events;

pub use client::{ServerDetails, SessionClient};
pub use config::{ClientConfig, SessionClientBuilder, SessionIdentity, DEFAULT_ROOM, DEFAULT_URL};
pub use error::CowatchError;
pub use events::{EventSink, FnSink, SessionEvent};

/// Everything a host application usually needs.
pub mod prelude {
    pub use crate::{
        ClientConfig, CowatchError, EventSink, FnSink, ServerDetails, SessionClient,
        SessionClientBuilder, SessionEvent, SessionIdentity,
    };
    pub use cowatch_protocol::{ClientFeatures, FileInfo};
    pub use cowatch_roster::{Roster, RosterTracker, UserRecord};
    pub use cowatch_sync::{LatencyTracker, PingService, PlaybackState, ReconciliationEngine};
    pub use cowatch_transport::{MemoryChannel, MessageChannel, WebSocketChannel};
}
