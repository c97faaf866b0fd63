//! Playback synchronization for cowatch.
//!
//! This crate decides what the local player should do with remote state
//! and what the server should hear about local state:
//!
//! 1. **Reconciliation**: applying remote seeks and pauses, suppressing
//!    echoes of our own changes ([`ReconciliationEngine`])
//! 2. **Flow control**: the "ignoring on the fly" counter handshake
//!    ([`FlowControlCounters`])
//! 3. **Latency**: RTT smoothing and forward-delay estimation
//!    ([`LatencyTracker`] trait, [`PingService`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Session client (above)  ← feeds State blocks in, sends reports out
//!     ↕
//! Sync layer (this crate)  ← playback state and echo suppression
//!     ↕
//! Protocol layer (below)  ← Playstate, PingBlock, IgnoringOnTheFly
//! ```
//!
//! Nothing here does I/O or reads the clock implicitly, so every decision
//! can be tested with plain values.

mod engine;
mod error;
mod latency;
mod state;

pub use engine::{OutboundLatency, PlaybackEvent, ReconciliationEngine, RemoteState};
pub use error::SyncError;
pub use latency::{
    epoch_seconds, LatencySample, LatencyTracker, PingService, PING_MOVING_AVERAGE_WEIGHT,
};
pub use state::{FlowControlCounters, PlaybackState};
