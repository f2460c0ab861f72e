// Public modules
pub mod chat_request;
pub mod conversation;
pub mod message_id;
pub mod server_event;
pub mod stream_event;
pub mod upload;

// Re-exports
pub use chat_request::{ChatRequest, ChatResponse};
pub use conversation::{
    ChatMessage, Conversation, ConversationCreate, MessageRole, MessageType, ModelList,
};
pub use message_id::MessageId;
pub use server_event::{
    RunData, RunEndData, ServerEvent, StatusData, TextMessageDeltaData, TextMessageEndData,
    TextMessageStartData, ThinkingProcessData, UserMessageData,
};
pub use stream_event::StreamEvent;
pub use upload::UploadedFile;
