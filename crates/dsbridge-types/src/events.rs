use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the backend event that carries chat traffic.
pub const CHAT_MESSAGE_EVENT: &str = "chat-message";

/// Events exchanged with the backend over the `chat-message` channel.
///
/// Ids are local `chat_messages.id` values; the backend resolves them against
/// the shared database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackendEvent {
    NewMessage {
        message_id: i64,
    },
    EditMessage {
        before_message_id: i64,
        after_message_id: i64,
    },
    DeleteMessage {
        message_id: i64,
    },
}

impl BackendEvent {
    /// The `type` discriminator as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new-message",
            Self::EditMessage { .. } => "edit-message",
            Self::DeleteMessage { .. } => "delete-message",
        }
    }
}

const KNOWN_KINDS: [&str; 3] = ["new-message", "edit-message", "delete-message"];

/// A decoded backend payload. Unrecognised `type` values are kept as data so
/// the relay can log and drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(BackendEvent),
    Unknown { kind: String },
}

/// Envelope around every frame on the backend socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    pub namespace: String,
    pub event: String,
    pub data: T,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("chat-message payload has no string `type` field")]
    MissingType,
}

/// Serialize a backend event into a namespaced `chat-message` frame.
pub fn encode_frame(namespace: &str, event: &BackendEvent) -> Result<String, FrameError> {
    let frame = Frame {
        namespace: namespace.to_string(),
        event: CHAT_MESSAGE_EVENT.to_string(),
        data: event,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decode a text frame. Returns `Ok(None)` for frames addressed to another
/// namespace or carrying an event other than `chat-message`.
pub fn decode_frame(namespace: &str, text: &str) -> Result<Option<Inbound>, FrameError> {
    let frame: Frame<serde_json::Value> = serde_json::from_str(text)?;
    if frame.namespace != namespace || frame.event != CHAT_MESSAGE_EVENT {
        return Ok(None);
    }

    let kind = frame
        .data
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(FrameError::MissingType)?
        .to_string();

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Ok(Some(Inbound::Unknown { kind }));
    }

    let event: BackendEvent = serde_json::from_value(frame.data)?;
    Ok(Some(Inbound::Event(event)))
}

/// A message as reported by the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayMessage {
    pub id: i64,
    pub channel_id: i64,
    pub author_id: i64,
    pub content: String,
}

/// A deletion as reported by the chat gateway. The content is gone by the
/// time the event arrives, so only identifiers remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedMessage {
    pub id: i64,
    pub channel_id: i64,
}

/// Events delivered by the chat gateway client, one at a time and in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The gateway session is authenticated as `user_id`.
    Ready { user_id: i64, username: String },

    MessageCreate(GatewayMessage),

    /// Carries the message with its new content.
    MessageEdit(GatewayMessage),

    MessageDelete(DeletedMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_kebab_case_type_inside_envelope() {
        let text = encode_frame(
            "/bridge",
            &BackendEvent::EditMessage {
                before_message_id: 4,
                after_message_id: 5,
            },
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["namespace"], "/bridge");
        assert_eq!(value["event"], "chat-message");
        assert_eq!(value["data"]["type"], "edit-message");
        assert_eq!(value["data"]["before_message_id"], 4);
        assert_eq!(value["data"]["after_message_id"], 5);
    }

    #[test]
    fn decodes_delete_message() {
        let text = r#"{"namespace":"/bridge","event":"chat-message","data":{"type":"delete-message","message_id":42}}"#;
        let inbound = decode_frame("/bridge", text).unwrap();
        assert_eq!(
            inbound,
            Some(Inbound::Event(BackendEvent::DeleteMessage { message_id: 42 }))
        );
    }

    #[test]
    fn unknown_type_is_kept_as_data() {
        let text = r#"{"namespace":"/bridge","event":"chat-message","data":{"type":"pin-message","message_id":1}}"#;
        let inbound = decode_frame("/bridge", text).unwrap();
        assert_eq!(
            inbound,
            Some(Inbound::Unknown {
                kind: "pin-message".into()
            })
        );
    }

    #[test]
    fn other_namespace_and_event_are_ignored() {
        let other_ns = r#"{"namespace":"/admin","event":"chat-message","data":{"type":"new-message","message_id":1}}"#;
        let other_event = r#"{"namespace":"/bridge","event":"presence","data":{}}"#;
        assert!(decode_frame("/bridge", other_ns).unwrap().is_none());
        assert!(decode_frame("/bridge", other_event).unwrap().is_none());
    }

    #[test]
    fn known_type_with_missing_field_is_malformed() {
        let text = r#"{"namespace":"/bridge","event":"chat-message","data":{"type":"edit-message","before_message_id":1}}"#;
        assert!(matches!(
            decode_frame("/bridge", text),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn missing_type_is_an_error() {
        let text = r#"{"namespace":"/bridge","event":"chat-message","data":{"message_id":1}}"#;
        assert!(matches!(
            decode_frame("/bridge", text),
            Err(FrameError::MissingType)
        ));
    }
}
