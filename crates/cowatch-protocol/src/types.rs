//! Wire types for the Syncplay JSON protocol.
//!
//! Every message on the wire is a JSON object whose key names the message
//! kind: `{"State": {...}}`, `{"Chat": "hi"}`, `{"List": null}`. Outbound
//! messages carry exactly one key, which is exactly serde's default
//! "externally tagged" enum representation, so [`ClientMessage`] needs no
//! tagging attributes at all. Inbound frames may carry several keys at
//! once; see [`InboundFrame`](crate::InboundFrame) for how those are split.
//!
//! Field names on the wire are camelCase. Optional fields are `Option`s
//! that are skipped when `None`: absence is a distinct state from zero or
//! `false` and must round-trip as absence.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// The protocol version string every client announces.
pub const PROTOCOL_VERSION: &str = "1.2.255";

/// The client release the protocol version corresponds to.
pub const REAL_VERSION: &str = "1.6.4";

// ---------------------------------------------------------------------------
// Shared building blocks
// ---------------------------------------------------------------------------

/// A room reference: `{"name": "movie"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomName {
    pub name: String,
}

impl RoomName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Identity of the media file a participant has loaded.
///
/// `duration` and `size` use 0 for "unknown". Servers running in privacy
/// mode send a hashed size string instead of a number; that decodes as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, deserialize_with = "size_or_zero")]
    pub size: u64,
}

impl FileInfo {
    /// Creates a file record with unknown size.
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            size: 0,
        }
    }
}

/// Capabilities a client advertises (and reports back in List snapshots).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_playlists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_list: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_rooms: Option<bool>,
}

impl ClientFeatures {
    /// The feature set this client implements: chat, readiness and the
    /// feature list. Shared playlists and managed rooms are not handled.
    pub fn supported() -> Self {
        Self {
            shared_playlists: Some(false),
            chat: Some(true),
            feature_list: Some(true),
            readiness: Some(true),
            managed_rooms: Some(false),
        }
    }
}

/// The play position block of a State message.
///
/// Outbound, `set_by` is always `None` and `do_seek` is only present when a
/// local seek is being announced. Inbound, `set_by` names the participant
/// who caused the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playstate {
    pub position: f64,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_seek: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_by: Option<String>,
}

/// Latency bookkeeping that rides along with every State message.
///
/// The client stamps `client_latency_calculation` with its send time; the
/// server echoes it back together with its own `server_rtt`, and sends a
/// `latency_calculation` stamp that the client echoes on its next report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_calculation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_latency_calculation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_rtt: Option<f64>,
}

/// Echo-suppression counters.
///
/// Zero is never sent: a counter is either a positive value or absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoringOnTheFly {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<u32>,
}

impl IgnoringOnTheFly {
    /// The client counter, treating a (non-conforming) zero as absent.
    pub fn client(&self) -> Option<u32> {
        self.client.filter(|&n| n > 0)
    }

    /// The server counter, treating a (non-conforming) zero as absent.
    pub fn server(&self) -> Option<u32> {
        self.server.filter(|&n| n > 0)
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Handshake request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub room: RoomName,
    pub version: String,
    pub realversion: String,
    pub features: ClientFeatures,
}

/// Readiness announcement inside an outbound Set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyRequest {
    pub is_ready: bool,
    pub manually_initiated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Outbound Set: either a file announcement or a readiness change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<ReadyRequest>,
}

/// Outbound State report. The ping block is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playstate: Option<Playstate>,
    pub ping: PingBlock,
    #[serde(
        rename = "ignoringOnTheFly",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ignoring_on_the_fly: Option<IgnoringOnTheFly>,
}

/// Every message a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Hello(HelloRequest),
    Set(ClientSet),
    /// A roster request. The unit payload serializes as `{"List": null}`.
    List(()),
    State(ClientState),
    Chat(String),
}

impl ClientMessage {
    /// `{"Set": {"file": ...}}`
    pub fn set_file(file: FileInfo) -> Self {
        Self::Set(ClientSet {
            file: Some(file),
            ready: None,
        })
    }

    /// `{"Set": {"ready": ...}}`
    pub fn set_ready(
        is_ready: bool,
        manually_initiated: bool,
        username: impl Into<String>,
    ) -> Self {
        Self::Set(ClientSet {
            file: None,
            ready: Some(ReadyRequest {
                is_ready,
                manually_initiated,
                username: Some(username.into()),
            }),
        })
    }

    /// `{"List": null}`
    pub fn list_request() -> Self {
        Self::List(())
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Capabilities and limits the server reports in its handshake ack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_username_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chat_message_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_filename_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_rooms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_rooms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_room_name_length: Option<u32>,
}

/// Handshake acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloAck {
    pub username: String,
    pub version: String,
    #[serde(default)]
    pub realversion: String,
    #[serde(default)]
    pub motd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomName>,
    #[serde(default)]
    pub features: ServerFeatures,
}

/// A protocol-level error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

/// `{"joined": true}` / `{"left": true}` inside a user update.
///
/// Newer servers send an object with version details instead of `true`
/// for `joined`; any non-false, non-null value counts as set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub joined: Option<bool>,
    #[serde(
        default,
        deserialize_with = "truthy",
        skip_serializing_if = "Option::is_none"
    )]
    pub left: Option<bool>,
}

impl UserEvent {
    pub fn is_joined(&self) -> bool {
        self.joined == Some(true)
    }

    pub fn is_left(&self) -> bool {
        self.left == Some(true)
    }
}

/// One entry of an inbound `Set.user` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub room: RoomName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<UserEvent>,
    #[serde(
        default,
        deserialize_with = "optional_file",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<FileInfo>,
}

/// Inbound readiness change for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyUpdate {
    pub username: String,
    #[serde(default)]
    pub manually_initiated: bool,
    #[serde(default)]
    pub is_ready: Option<bool>,
}

/// A playlist entry: servers send bare file names, older ones full records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaylistItem {
    Name(String),
    File(FileInfo),
}

/// Inbound playlist replacement. Decoded for logging only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistChange {
    #[serde(default)]
    pub files: Vec<PlaylistItem>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Inbound playlist cursor move. Decoded for logging only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistIndex {
    #[serde(default)]
    pub index: Option<u64>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Inbound Set: roster diffs, readiness, and playlist fields.
///
/// Users are kept in a `BTreeMap` so they are processed in a
/// deterministic (username) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<BTreeMap<String, UserUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<ReadyUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_change: Option<PlaylistChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_index: Option<PlaylistIndex>,
}

/// One participant inside a List snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(
        default,
        deserialize_with = "optional_file",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<ClientFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ready: Option<bool>,
}

/// A full roster: room name → username → entry.
pub type ListSnapshot = BTreeMap<String, BTreeMap<String, ListEntry>>;

/// Inbound State. Every block is optional.
///
/// Some servers put `setBy` next to the playstate instead of inside it;
/// [`ServerState::set_by`] looks in both places.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playstate: Option<Playstate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<PingBlock>,
    #[serde(
        rename = "ignoringOnTheFly",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ignoring_on_the_fly: Option<IgnoringOnTheFly>,
}

impl ServerState {
    /// Who caused this state, preferring the value inside the playstate.
    pub fn set_by(&self) -> Option<&str> {
        self.playstate
            .as_ref()
            .and_then(|p| p.set_by.as_deref())
            .or(self.set_by.as_deref())
    }
}

/// Inbound chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
}

/// Inbound TLS negotiation answer. Decoded for logging only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMessage {
    #[serde(rename = "startTLS", default)]
    pub start_tls: Option<String>,
}

/// One decoded block of an inbound frame.
///
/// The variant order is the dispatch order: when a single frame carries
/// several blocks they are handled Error → Hello → Set → List → State →
/// Chat → TLS.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Error(ServerError),
    Hello(HelloAck),
    Set(ServerSet),
    List(ListSnapshot),
    State(ServerState),
    Chat(ChatMessage),
    Tls(TlsMessage),
}

impl ServerMessage {
    /// The wire key this block arrived under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "Error",
            Self::Hello(_) => "Hello",
            Self::Set(_) => "Set",
            Self::List(_) => "List",
            Self::State(_) => "State",
            Self::Chat(_) => "Chat",
            Self::Tls(_) => "TLS",
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

/// Decodes a file field where `{}` (or a record without a name) means "no file".
fn optional_file<'de, D>(deserializer: D) -> Result<Option<FileInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct PartialFile {
        name: Option<String>,
        #[serde(default)]
        duration: Option<f64>,
        #[serde(default, deserialize_with = "size_or_zero")]
        size: u64,
    }

    let partial: Option<PartialFile> = Option::deserialize(deserializer)?;
    Ok(partial.and_then(|p| {
        p.name.map(|name| FileInfo {
            name,
            duration: p.duration.unwrap_or(0.0),
            size: p.size,
        })
    }))
}

fn size_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct SizeVisitor;

    impl<'de> Visitor<'de> for SizeVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a file size in bytes or a hashed size string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            Ok(u64::try_from(v).unwrap_or(0))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            Ok(if v.is_finite() && v > 0.0 { v as u64 } else { 0 })
        }

        fn visit_str<E: de::Error>(self, _v: &str) -> Result<u64, E> {
            Ok(0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(SizeVisitor)
}

/// Treats `true`, non-zero numbers, non-empty strings, objects and arrays
/// as set; `false` as unset; `null` as absent.
fn truthy<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TruthyVisitor;

    impl<'de> Visitor<'de> for TruthyVisitor {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a flag or an event detail object")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v != 0))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v != 0.0))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(!v.is_empty()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2>(self, d: D2) -> Result<Self::Value, D2::Error>
        where
            D2: Deserializer<'de>,
        {
            d.deserialize_any(TruthyVisitor)
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(Some(true))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(Some(true))
        }
    }

    deserializer.deserialize_option(TruthyVisitor)
}

// =========================================================================
// Tests
// =========================================================================
