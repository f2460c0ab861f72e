use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::reassembler::{CompositeStyle, DisplayMessage};
use crate::types::MessageId;

/// A conversation owned by the authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id.
    pub id: i64,
    /// Owner of the conversation.
    pub user_id: i64,
    /// Display title.
    pub title: String,
    /// Creation time.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
    /// Last modification time.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

/// Body of the create and rename conversation calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCreate {
    /// Title of the conversation.
    pub title: String,
}

impl ConversationCreate {
    /// Creates a new body with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Author of a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person chatting.
    User,
    /// The model.
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Kind of content a message carries alongside its text.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Text plus an image reference.
    Image,
    /// Text plus a document reference.
    Document,
}

impl MessageType {
    /// Guesses the kind of an attachment from its file name or URL.
    ///
    /// Image extensions map to [`MessageType::Image`]; anything else is sent as a document.
    pub fn from_extension(name: &str) -> Self {
        let extension = name.rsplit('.').next().unwrap_or_default().to_lowercase();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => MessageType::Image,
            _ => MessageType::Document,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Text => write!(f, "text"),
            MessageType::Image => write!(f, "image"),
            MessageType::Document => write!(f, "document"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "document" => Ok(MessageType::Document),
            _ => Err(format!("unknown message type: {s}")),
        }
    }
}

/// A stored message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: i64,
    /// Message text. Assistant replies are stored in the legacy marker layout.
    pub content: String,
    /// Author of the message.
    pub role: MessageRole,
    /// Kind of attachment.
    #[serde(default)]
    pub message_type: MessageType,
    /// Reference to an uploaded file.
    #[serde(default)]
    pub file_url: Option<String>,
    /// Creation time.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Splits the stored content into thinking and answer.
    ///
    /// User messages are returned as an answer without thinking.
    pub fn display(&self) -> DisplayMessage {
        match self.role {
            MessageRole::User => DisplayMessage::answer_only(self.content.clone()),
            MessageRole::Assistant => DisplayMessage::parse(&self.content, &CompositeStyle::LEGACY),
        }
    }
}

/// Response of the model listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Names of the models the server can route to.
    pub models: Vec<String>,
}
