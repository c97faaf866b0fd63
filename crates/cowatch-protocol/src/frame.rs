//! Splitting an inbound frame into typed [`ServerMessage`] blocks.
//!
//! A server frame is one JSON object that may carry several message
//! kinds side by side (`{"State": {...}, "Set": {...}}`). Each block is
//! decoded independently: a malformed `Set` must not cost us the `State`
//! that arrived with it. `State` and `Set` go one level further and decode
//! each sub-block (and each `Set.user` entry) on its own, so a broken
//! playstate still lets the ping and ignoring counters through. Anything
//! that fails to decode is reported in [`InboundFrame::rejected`] so the
//! caller can log it.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{ProtocolError, ServerMessage, ServerSet, ServerState, UserUpdate};

/// Wire keys in dispatch order.
const DISPATCH_ORDER: [&str; 7] =
    ["Error", "Hello", "Set", "List", "State", "Chat", "TLS"];

/// A block that was present in the frame but could not be decoded.
#[derive(Debug)]
pub struct RejectedBlock {
    /// The wire key of the block (`"Set"`, `"State"`, ...), or the path of
    /// the sub-block (`"State.playstate"`, `"Set.user"`, ...).
    pub kind: &'static str,
    /// Why decoding failed.
    pub error: ProtocolError,
}

/// The decoded contents of one inbound frame.
#[derive(Debug, Default)]
pub struct InboundFrame {
    /// Successfully decoded blocks, in dispatch order.
    pub messages: Vec<ServerMessage>,
    /// Blocks that were present but malformed.
    pub rejected: Vec<RejectedBlock>,
    /// Top-level keys this client does not know about.
    pub unknown: Vec<String>,
}

impl InboundFrame {
    /// Decodes a frame from raw JSON bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are not JSON, or
    /// [`ProtocolError::InvalidMessage`] if the top level is not an object.
    pub fn from_slice(data: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;
        Self::from_value(value)
    }

    /// Splits an already-parsed JSON value into typed blocks.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::InvalidMessage(
                "frame is not a JSON object".into(),
            ));
        };

        let mut frame = Self::default();
        for kind in DISPATCH_ORDER {
            let Some(body) = map.remove(kind) else {
                continue;
            };
            match decode_block(kind, body, &mut frame.rejected) {
                Ok(msg) => frame.messages.push(msg),
                Err(error) => frame.rejected.push(RejectedBlock { kind, error }),
            }
        }
        frame.unknown = map.into_iter().map(|(key, _)| key).collect();
        Ok(frame)
    }

    /// Returns `true` if nothing usable was decoded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn decode_block(
    kind: &'static str,
    body: Value,
    rejected: &mut Vec<RejectedBlock>,
) -> Result<ServerMessage, ProtocolError> {
    let msg = match kind {
        "Error" => ServerMessage::Error(from_body(body)?),
        "Hello" => ServerMessage::Hello(from_body(body)?),
        "Set" => ServerMessage::Set(decode_set(body, rejected)?),
        "List" => ServerMessage::List(from_body(body)?),
        "State" => ServerMessage::State(decode_state(body, rejected)?),
        "Chat" => ServerMessage::Chat(from_body(body)?),
        "TLS" => ServerMessage::Tls(from_body(body)?),
        other => {
            return Err(ProtocolError::InvalidMessage(format!(
                "unknown message kind {other}"
            )));
        }
    };
    Ok(msg)
}

fn decode_state(
    body: Value,
    rejected: &mut Vec<RejectedBlock>,
) -> Result<ServerState, ProtocolError> {
    let mut map = into_object(body, "State")?;
    Ok(ServerState {
        playstate: sub_block(&mut map, "playstate", "State.playstate", rejected),
        set_by: sub_block(&mut map, "setBy", "State.setBy", rejected),
        ping: sub_block(&mut map, "ping", "State.ping", rejected),
        ignoring_on_the_fly: sub_block(
            &mut map,
            "ignoringOnTheFly",
            "State.ignoringOnTheFly",
            rejected,
        ),
    })
}

fn decode_set(body: Value, rejected: &mut Vec<RejectedBlock>) -> Result<ServerSet, ProtocolError> {
    let mut map = into_object(body, "Set")?;

    let user: Option<BTreeMap<String, UserUpdate>> = match map.remove("user") {
        None | Some(Value::Null) => None,
        Some(Value::Object(entries)) => Some(
            entries
                .into_iter()
                .filter_map(|(username, entry)| match from_body(entry) {
                    Ok(update) => Some((username, update)),
                    Err(error) => {
                        rejected.push(RejectedBlock { kind: "Set.user", error });
                        None
                    }
                })
                .collect(),
        ),
        Some(_) => {
            rejected.push(RejectedBlock {
                kind: "Set.user",
                error: ProtocolError::InvalidMessage("user is not an object".into()),
            });
            None
        }
    };

    Ok(ServerSet {
        user,
        ready: sub_block(&mut map, "ready", "Set.ready", rejected),
        playlist_change: sub_block(&mut map, "playlistChange", "Set.playlistChange", rejected),
        playlist_index: sub_block(&mut map, "playlistIndex", "Set.playlistIndex", rejected),
    })
}

fn into_object(body: Value, kind: &str) -> Result<Map<String, Value>, ProtocolError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ProtocolError::InvalidMessage(format!(
            "{kind} body is not an object"
        ))),
    }
}

/// Takes `key` out of `map` and decodes it. A missing or `null` key is
/// `None`; a malformed one is recorded under `kind` and also `None`.
fn sub_block<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
    kind: &'static str,
    rejected: &mut Vec<RejectedBlock>,
) -> Option<T> {
    let body = map.remove(key).filter(|v| !v.is_null())?;
    match from_body(body) {
        Ok(value) => Some(value),
        Err(error) => {
            rejected.push(RejectedBlock { kind, error });
            None
        }
    }
}

fn from_body<T: DeserializeOwned>(body: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(body).map_err(ProtocolError::Decode)
}

/// Lets an [`InboundFrame`] come straight out of a generic codec.
impl TryFrom<Value> for InboundFrame {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<InboundFrame> for Vec<ServerMessage> {
    fn from(frame: InboundFrame) -> Self {
        frame.messages
    }
}
