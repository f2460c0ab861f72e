use serde::{Deserialize, Serialize};

use crate::types::MessageId;

/// An event that changes the state of a reply being reassembled.
///
/// These are the only events the reassembler consumes; lifecycle events such as
/// `run_start` are filtered out before they reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A fragment of the model's thinking trace.
    ThinkingChunk {
        /// The thinking text.
        text: String,
    },

    /// A fragment of the final answer.
    AnswerChunk {
        /// The answer text.
        text: String,
    },

    /// The answer is complete.
    AnswerComplete {
        /// The identifier that replaces the provisional local id.
        final_message_id: MessageId,
    },
}

impl StreamEvent {
    /// Creates a thinking chunk.
    pub fn thinking(text: impl Into<String>) -> Self {
        StreamEvent::ThinkingChunk { text: text.into() }
    }

    /// Creates an answer chunk.
    pub fn answer(text: impl Into<String>) -> Self {
        StreamEvent::AnswerChunk { text: text.into() }
    }

    /// Creates a completion event.
    pub fn complete(final_message_id: impl Into<MessageId>) -> Self {
        StreamEvent::AnswerComplete {
            final_message_id: final_message_id.into(),
        }
    }

    /// Returns true if this event completes the reply.
    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::AnswerComplete { .. })
    }
}
