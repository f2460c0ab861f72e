use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a message.
///
/// The backend hands out integer database ids for stored messages and uuid strings for
/// in-flight replies; both forms share this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// A numeric identifier assigned by the message store.
    Number(i64),

    /// A textual identifier, such as a uuid.
    Text(String),
}

impl MessageId {
    /// Creates a fresh client-side identifier for a reply that has not completed yet.
    pub fn provisional() -> Self {
        MessageId::Text(format!("local-{}", uuid::Uuid::new_v4()))
    }

    /// Returns true if this identifier was minted locally by [`MessageId::provisional`].
    pub fn is_provisional(&self) -> bool {
        matches!(self, MessageId::Text(text) if text.starts_with("local-"))
    }

    /// Returns the numeric form of the identifier, if it has one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            MessageId::Number(n) => Some(*n),
            MessageId::Text(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{n}"),
            MessageId::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Number(n)
    }
}

impl From<&str> for MessageId {
    fn from(text: &str) -> Self {
        MessageId::Text(text.to_string())
    }
}

impl From<String> for MessageId {
    fn from(text: String) -> Self {
        MessageId::Text(text)
    }
}
