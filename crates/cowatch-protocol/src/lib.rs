//! Wire protocol for cowatch.
//!
//! This crate defines the language a cowatch client speaks with a
//! Syncplay server:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Playstate`], ...):
//!   the message structures that travel on the wire.
//! - **Frames** ([`InboundFrame`]): splitting one inbound JSON object into
//!   typed blocks in dispatch order, tolerating malformed blocks.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ServerMessage) → Sync / Roster (state)
//! ```

mod codec;
mod error;
#[cfg(feature = "json")]
mod frame;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
#[cfg(feature = "json")]
pub use frame::{InboundFrame, RejectedBlock};
pub use types::{
    ChatMessage, ClientFeatures, ClientMessage, ClientSet, ClientState,
    FileInfo, HelloAck, HelloRequest, IgnoringOnTheFly, ListEntry,
    ListSnapshot, PingBlock, Playstate, PlaylistChange, PlaylistIndex,
    PlaylistItem, ReadyRequest, ReadyUpdate, RoomName, ServerError,
    ServerFeatures, ServerMessage, ServerSet, ServerState, TlsMessage,
    UserEvent, UserUpdate, PROTOCOL_VERSION, REAL_VERSION,
};
