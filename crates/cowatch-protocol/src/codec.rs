//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The session layer encodes every outbound [`ClientMessage`](crate::ClientMessage)
//! through a [`Codec`] and never calls `serde_json` directly, so the wire
//! encoding stays swappable in one place.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside a session
/// client that may be moved onto any tokio worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`). This is the only encoding
/// Syncplay servers speak.
///
/// ## Example
///
/// ```rust
/// use cowatch_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientMessage::list_request()).unwrap();
/// assert_eq!(bytes, br#"{"List":null}"#);
///
/// let decoded: ClientMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientMessage::list_request());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ChatMessage, ClientMessage, InboundFrame, ServerMessage};

    #[test]
    fn test_encode_chat() {
        let bytes = JsonCodec.encode(&ClientMessage::Chat("yo".into())).unwrap();
        assert_eq!(bytes, br#"{"Chat":"yo"}"#);
    }

    #[test]
    fn test_decode_into_frame_via_value() {
        let value: serde_json::Value = JsonCodec
            .decode(br#"{"Chat":{"username":"bob","message":"hi"}}"#)
            .unwrap();
        let frame = InboundFrame::try_from(value).unwrap();
        assert_eq!(
            frame.messages,
            vec![ServerMessage::Chat(ChatMessage {
                username: "bob".into(),
                message: "hi".into(),
            })]
        );
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"{nope");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
