use serde::{Deserialize, Serialize};

use crate::types::{MessageId, MessageRole, MessageType, StreamEvent};

/// An event emitted by the chat endpoint.
///
/// Each event is a JSON object `{"type": ..., "data": ...}` carried on one `data:` line of
/// the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The user's message was stored.
    UserMessage(UserMessageData),

    /// A model run started.
    RunStart(RunData),

    /// The model started thinking.
    ThinkingStart(StatusData),

    /// The assistant reply started.
    TextMessageStart(TextMessageStartData),

    /// A fragment of the thinking trace.
    ThinkingProcess(ThinkingProcessData),

    /// A fragment of the answer.
    TextMessageDelta(TextMessageDeltaData),

    /// The model finished thinking.
    ThinkingEnd(StatusData),

    /// The assistant reply is complete.
    TextMessageEnd(TextMessageEndData),

    /// The run finished and the reply was stored.
    RunEnd(RunEndData),

    /// The server gave up on the request.
    Error(String),
}

impl ServerEvent {
    /// Every `type` discriminator this client understands.
    pub const KINDS: &'static [&'static str] = &[
        "user_message",
        "run_start",
        "thinking_start",
        "text_message_start",
        "thinking_process",
        "text_message_delta",
        "thinking_end",
        "text_message_end",
        "run_end",
        "error",
    ];

    /// Returns true if `kind` is one of [`ServerEvent::KINDS`].
    pub fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }

    /// Returns the `type` discriminator of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::UserMessage(_) => "user_message",
            ServerEvent::RunStart(_) => "run_start",
            ServerEvent::ThinkingStart(_) => "thinking_start",
            ServerEvent::TextMessageStart(_) => "text_message_start",
            ServerEvent::ThinkingProcess(_) => "thinking_process",
            ServerEvent::TextMessageDelta(_) => "text_message_delta",
            ServerEvent::ThinkingEnd(_) => "thinking_end",
            ServerEvent::TextMessageEnd(_) => "text_message_end",
            ServerEvent::RunEnd(_) => "run_end",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Narrows this event to the part of the vocabulary that changes a reply.
    pub fn to_stream_event(&self) -> Option<StreamEvent> {
        match self {
            ServerEvent::ThinkingProcess(data) => Some(StreamEvent::thinking(&data.message)),
            ServerEvent::TextMessageDelta(data) => Some(StreamEvent::answer(&data.content)),
            ServerEvent::TextMessageEnd(data) => Some(StreamEvent::complete(data.message_id.clone())),
            _ => None,
        }
    }
}

/// Payload of a `user_message` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessageData {
    /// Stored id of the user's message.
    pub id: MessageId,
    /// The message text.
    pub content: String,
    /// Always the user role.
    pub role: MessageRole,
    /// Kind of attachment the message carried.
    #[serde(default)]
    pub message_type: MessageType,
}

/// Payload of a `run_start` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunData {
    /// Identifier of the run.
    pub run_id: String,
}

/// Payload of `thinking_start` and `thinking_end` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    /// Human-readable status.
    #[serde(default)]
    pub message: String,
}

/// Payload of a `text_message_start` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageStartData {
    /// Identifier of the reply being streamed.
    pub message_id: MessageId,
    /// Role of the reply author.
    pub role: MessageRole,
}

/// Payload of a `thinking_process` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingProcessData {
    /// Thinking text.
    pub message: String,
}

/// Payload of a `text_message_delta` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessageDeltaData {
    /// Answer text.
    pub content: String,
}

/// Payload of a `text_message_end` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageEndData {
    /// Final identifier of the reply.
    pub message_id: MessageId,
}

/// Payload of a `run_end` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEndData {
    /// Identifier of the run.
    pub run_id: String,
    /// Stored id of the assistant message.
    pub message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json, to_value};

    #[test]
    fn deserialize_thinking_process() {
        let event: ServerEvent = from_value(json!({
            "type": "thinking_process",
            "data": {"message": "considering"}
        }))
        .unwrap();
        assert_eq!(
            event.to_stream_event(),
            Some(StreamEvent::thinking("considering"))
        );
    }

    #[test]
    fn deserialize_text_message_end_with_uuid() {
        let event: ServerEvent = from_value(json!({
            "type": "text_message_end",
            "data": {"message_id": "0f8c7e52-5b1d-4a43-9b8e-6a1c2d3e4f50"}
        }))
        .unwrap();
        assert_eq!(
            event.to_stream_event(),
            Some(StreamEvent::complete("0f8c7e52-5b1d-4a43-9b8e-6a1c2d3e4f50"))
        );
    }

    #[test]
    fn deserialize_user_message() {
        let event: ServerEvent = from_value(json!({
            "type": "user_message",
            "data": {"id": 17, "content": "hi", "role": "user", "message_type": "text"}
        }))
        .unwrap();
        match event {
            ServerEvent::UserMessage(data) => {
                assert_eq!(data.id, MessageId::Number(17));
                assert_eq!(data.role, MessageRole::User);
            }
            other => panic!("Expected UserMessage, got {other:?}"),
        }
    }

    #[test]
    fn deserialize_error_with_string_data() {
        let event: ServerEvent = from_value(json!({
            "type": "error",
            "data": "Conversation not found"
        }))
        .unwrap();
        assert_eq!(event, ServerEvent::Error("Conversation not found".to_string()));
        assert_eq!(event.to_stream_event(), None);
    }

    #[test]
    fn kinds_match_serialized_tags() {
        let events = vec![
            ServerEvent::RunStart(RunData {
                run_id: "r".to_string(),
            }),
            ServerEvent::ThinkingEnd(StatusData {
                message: "done".to_string(),
            }),
            ServerEvent::RunEnd(RunEndData {
                run_id: "r".to_string(),
                message_id: MessageId::Number(3),
            }),
            ServerEvent::Error("nope".to_string()),
        ];
        for event in events {
            let value = to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
            assert!(ServerEvent::is_known_kind(event.kind()));
        }
        assert!(!ServerEvent::is_known_kind("tool_call"));
    }
}
