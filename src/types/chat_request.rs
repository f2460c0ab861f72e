use serde::{Deserialize, Serialize, Serializer};

use crate::reassembler::{CompositeStyle, DisplayMessage};
use crate::types::{
    ChatMessage, MessageType, RunEndData, ServerEvent, TextMessageDeltaData,
    TextMessageEndData, ThinkingProcessData, UserMessageData,
};

/// Body of the chat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation to append to.
    pub conversation_id: i64,
    /// Model to route the request to.
    pub model: String,
    /// The user's message.
    pub message: String,
    /// Kind of attachment referenced by `file_url`.
    #[serde(default)]
    pub message_type: MessageType,
    /// Reference to an uploaded file; the server expects an empty string when absent.
    #[serde(default, serialize_with = "serialize_optional_as_empty")]
    pub file_url: Option<String>,
}

impl ChatRequest {
    /// Creates a plain text request.
    pub fn new(conversation_id: i64, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            model: model.into(),
            message: message.into(),
            message_type: MessageType::Text,
            file_url: None,
        }
    }

    /// Attaches an uploaded file to the request.
    pub fn with_file(mut self, file_url: impl Into<String>, message_type: MessageType) -> Self {
        self.file_url = Some(file_url.into());
        self.message_type = message_type;
        self
    }
}

fn serialize_optional_as_empty<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

/// Non-streaming reply of the chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The stored user message.
    pub user_message: ChatMessage,
    /// The stored assistant message.
    pub ai_message: ChatMessage,
}

impl ChatResponse {
    /// Converts the response into the event sequence a stream would have carried.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let DisplayMessage { thinking, answer } =
            DisplayMessage::parse(&self.ai_message.content, &CompositeStyle::LEGACY);
        let mut events = vec![ServerEvent::UserMessage(UserMessageData {
            id: self.user_message.id,
            content: self.user_message.content,
            role: self.user_message.role,
            message_type: self.user_message.message_type,
        })];
        if let Some(thinking) = thinking {
            events.push(ServerEvent::ThinkingProcess(ThinkingProcessData {
                message: thinking,
            }));
        }
        if !answer.is_empty() {
            events.push(ServerEvent::TextMessageDelta(TextMessageDeltaData {
                content: answer,
            }));
        }
        events.push(ServerEvent::TextMessageEnd(TextMessageEndData {
            message_id: self.ai_message.id.clone(),
        }));
        events.push(ServerEvent::RunEnd(RunEndData {
            run_id: String::new(),
            message_id: self.ai_message.id,
        }));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageId, StreamEvent};
    use serde_json::{from_value, json, to_value};

    #[test]
    fn request_serializes_missing_file_as_empty_string() {
        let request = ChatRequest::new(4, "qwen3-max", "hello");
        let value = to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "conversation_id": 4,
                "model": "qwen3-max",
                "message": "hello",
                "message_type": "text",
                "file_url": ""
            })
        );
    }

    #[test]
    fn request_with_file() {
        let request = ChatRequest::new(4, "qwen3-max", "what is this?")
            .with_file("http://localhost:8000/uploads/a.png", MessageType::Image);
        let value = to_value(&request).unwrap();
        assert_eq!(value["message_type"], "image");
        assert_eq!(value["file_url"], "http://localhost:8000/uploads/a.png");
    }

    #[test]
    fn response_converts_to_events() {
        let response: ChatResponse = from_value(json!({
            "user_message": {
                "id": 20, "conversation_id": 4, "content": "hello", "role": "user",
                "message_type": "text", "file_url": null, "created_at": "2025-03-01T08:00:00"
            },
            "ai_message": {
                "id": 21, "conversation_id": 4,
                "content": "[思考过程]\ngreeting\n[模型回复]\nHi there!",
                "role": "assistant", "message_type": "text", "file_url": null,
                "created_at": "2025-03-01T08:00:01"
            }
        }))
        .unwrap();
        let events = response.into_events();
        let stream_events: Vec<StreamEvent> =
            events.iter().filter_map(ServerEvent::to_stream_event).collect();
        assert_eq!(
            stream_events,
            vec![
                StreamEvent::thinking("greeting"),
                StreamEvent::answer("Hi there!"),
                StreamEvent::complete(MessageId::Number(21)),
            ]
        );
        assert!(matches!(events.first(), Some(ServerEvent::UserMessage(_))));
        assert!(matches!(events.last(), Some(ServerEvent::RunEnd(_))));
    }
}
