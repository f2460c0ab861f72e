//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which tracks the active conversation and
//! drives a streamed reply from request to committed message.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::Error;
use crate::chat::config::ChatConfig;
use crate::client::{ChatClient, ServerEventStream};
use crate::error::Result;
use crate::pacing::{Reveal, Typewriter};
use crate::reassembler::{CompositeStyle, Reassembler};
use crate::render::Renderer;
use crate::types::{
    ChatMessage, ChatRequest, Conversation, MessageId, MessageRole, MessageType, ServerEvent,
    StreamEvent,
};

/// How often an in-flight reply checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Characters of the first message used to title a new conversation.
const TITLE_CHARS: usize = 20;

/// A file reference that will accompany the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Reference to the uploaded file.
    pub url: String,
    /// Kind of file.
    pub kind: MessageType,
}

/// A chat session that manages conversation state and API interactions.
///
/// The session keeps an in-memory view of the active conversation; the server remains the
/// store of record.
pub struct ChatSession {
    client: ChatClient,
    config: ChatConfig,
    conversation_id: Option<i64>,
    history: Vec<ChatMessage>,
    attachment: Option<Attachment>,
    replies_completed: u64,
    replies_failed: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The model used for new messages.
    pub model: String,
    /// Root of the API.
    pub base_url: String,
    /// The active conversation, if any.
    pub conversation_id: Option<i64>,
    /// The number of messages in the local history.
    pub message_count: usize,
    /// Whether thinking text is displayed.
    pub show_thinking: bool,
    /// Pacing tick, if pacing is enabled.
    pub pace: Option<Duration>,
    /// The pending attachment, if any.
    pub attachment: Option<Attachment>,
    /// Replies that completed and were committed.
    pub replies_completed: u64,
    /// Replies that failed or were interrupted.
    pub replies_failed: u64,
}

// What a finished stream left behind.
struct Turn {
    reassembler: Reassembler,
    stored_id: Option<MessageId>,
}

impl ChatSession {
    /// Creates a new chat session with the given client and configuration.
    pub fn new(client: ChatClient, config: ChatConfig) -> Self {
        let conversation_id = config.conversation_id;
        Self {
            client,
            config,
            conversation_id,
            history: Vec::new(),
            attachment: None,
            replies_completed: 0,
            replies_failed: 0,
        }
    }

    /// Sends a user message and streams the reply.
    ///
    /// This method:
    /// 1. Creates a conversation titled after the message if none is active
    /// 2. Sends the message and renders the reply as it arrives
    /// 3. Records the user message once the server has stored it
    /// 4. Adds the completed assistant reply to history
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails, the stream breaks off, the server reports an error,
    /// or `interrupted` is raised. In each case the partial reply is discarded.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<()> {
        let conversation_id = match self.conversation_id {
            Some(id) => id,
            None => {
                let conversation = self
                    .client
                    .create_conversation(&title_from(user_input))
                    .await?;
                tracing::debug!(id = conversation.id, title = %conversation.title, "created conversation");
                self.conversation_id = Some(conversation.id);
                conversation.id
            }
        };

        let mut request = ChatRequest::new(conversation_id, &self.config.model, user_input);
        if let Some(attachment) = &self.attachment {
            request = request.with_file(&attachment.url, attachment.kind);
        }

        let result = match self.client.chat_stream(&request).await {
            Ok(events) => {
                self.stream_reply(&request, events, renderer, &interrupted)
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(turn) => {
                self.attachment = None;
                self.commit(conversation_id, turn);
                self.replies_completed += 1;
                Ok(())
            }
            Err(err) => {
                self.replies_failed += 1;
                Err(err)
            }
        }
    }

    async fn stream_reply(
        &mut self,
        request: &ChatRequest,
        events: ServerEventStream,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
    ) -> Result<Turn> {
        // The reassembler only sees reply content; the session also needs the stored user
        // message and the database id, which arrive as lifecycle events.
        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();
        let events = events.inspect(move |event| {
            if let Ok(event @ (ServerEvent::UserMessage(_) | ServerEvent::RunEnd(_))) = event {
                let _ = tap_tx.send(event.clone());
            }
        });
        let (mut updates, reply_rx) = self.client.reassemble(events, self.config.style);

        let show_thinking = self.config.show_thinking;
        let mut stored_id = None;
        let mut typewriter = self
            .config
            .pace
            .map(|_| Typewriter::new(self.config.units_per_tick));
        let mut ticker = self.config.pace.map(|tick| {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut labels = SectionLabels::new(self.config.style);
        let mut ended = false;

        loop {
            if interrupted.load(Ordering::Relaxed) || renderer.should_interrupt() {
                if !ended {
                    self.record_lifecycle(&mut tap_rx, request, &mut stored_id);
                    renderer.print_interrupted();
                    return Err(Error::abort("reply interrupted"));
                }
                // The reply is complete; only the reveal was cut short.
                if let Some(typewriter) = typewriter.as_mut() {
                    show(renderer, typewriter.flush());
                }
                break;
            }
            if ended && typewriter.as_ref().is_none_or(Typewriter::is_caught_up) {
                break;
            }

            tokio::select! {
                biased;
                next = updates.next(), if !ended => match next {
                    Some(Ok(update)) => {
                        self.record_lifecycle(&mut tap_rx, request, &mut stored_id);
                        match typewriter.as_mut() {
                            Some(typewriter) if show_thinking => {
                                typewriter.set_target(&update.composite)
                            }
                            Some(typewriter) => typewriter.set_target(&update.display.answer),
                            None => labels.print(renderer, &update.event, show_thinking),
                        }
                    }
                    Some(Err(err)) => {
                        self.record_lifecycle(&mut tap_rx, request, &mut stored_id);
                        renderer.finish_response();
                        return Err(err);
                    }
                    None => ended = true,
                },
                _ = next_tick(&mut ticker) => {
                    if let Some(typewriter) = typewriter.as_mut() {
                        show(renderer, typewriter.tick());
                    }
                }
                _ = tokio::time::sleep(INTERRUPT_POLL) => {}
            }
        }

        self.record_lifecycle(&mut tap_rx, request, &mut stored_id);
        renderer.finish_response();
        let reassembler = reply_rx
            .await
            .map_err(|_| Error::streaming("reply was dropped before it ended", None))?;
        if !reassembler.is_complete() {
            return Err(Error::streaming(
                "stream ended before the reply completed",
                None,
            ));
        }
        Ok(Turn {
            reassembler,
            stored_id,
        })
    }

    // Applies the lifecycle events seen so far: the stored user message joins the history
    // and the database id of the reply is remembered.
    fn record_lifecycle(
        &mut self,
        tap: &mut mpsc::UnboundedReceiver<ServerEvent>,
        request: &ChatRequest,
        stored_id: &mut Option<MessageId>,
    ) {
        while let Ok(event) = tap.try_recv() {
            match event {
                ServerEvent::UserMessage(data) => self.history.push(ChatMessage {
                    id: data.id,
                    conversation_id: request.conversation_id,
                    content: data.content,
                    role: MessageRole::User,
                    message_type: data.message_type,
                    file_url: request.file_url.clone(),
                    created_at: OffsetDateTime::now_utc(),
                }),
                ServerEvent::RunEnd(data) => *stored_id = Some(data.message_id),
                _ => {}
            }
        }
    }

    fn commit(&mut self, conversation_id: i64, turn: Turn) {
        let Turn {
            reassembler,
            stored_id,
        } = turn;
        let id = stored_id.unwrap_or_else(|| reassembler.message_id().clone());
        self.history.push(ChatMessage {
            id,
            conversation_id,
            content: reassembler.stored_content(),
            role: MessageRole::Assistant,
            message_type: MessageType::Text,
            file_url: None,
            created_at: OffsetDateTime::now_utc(),
        });
    }

    /// Makes conversation `id` the active one and loads its stored history.
    pub async fn set_conversation(&mut self, id: i64) -> Result<usize> {
        let messages = self.client.messages(id).await?;
        self.conversation_id = Some(id);
        self.history = messages;
        Ok(self.history.len())
    }

    /// Starts a new conversation.
    ///
    /// With a title the conversation is created right away; without one it is created, and
    /// titled, by the first message.
    pub async fn start_conversation(&mut self, title: Option<&str>) -> Result<Option<Conversation>> {
        self.clear();
        match title {
            Some(title) => {
                let conversation = self.client.create_conversation(title).await?;
                self.conversation_id = Some(conversation.id);
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// Renames the active conversation.
    pub async fn rename(&mut self, title: &str) -> Result<Conversation> {
        let Some(id) = self.conversation_id else {
            return Err(Error::bad_request("no active conversation to rename"));
        };
        self.client.rename_conversation(id, title).await
    }

    /// Deletes conversation `id`. Deleting the active conversation detaches from it.
    pub async fn delete(&mut self, id: i64) -> Result<()> {
        self.client.delete_conversation(id).await?;
        if self.conversation_id == Some(id) {
            self.clear();
        }
        Ok(())
    }

    /// Lists the caller's conversations.
    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.client.list_conversations().await
    }

    /// Lists the models the backend offers.
    pub async fn models(&self) -> Result<Vec<String>> {
        self.client.list_models().await
    }

    /// Forgets the local history and detaches from the active conversation.
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.history.clear();
    }

    /// The messages of the active conversation, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Returns the number of messages in the local history.
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// The active conversation, if any.
    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    /// Changes the model used for responses.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Shows or hides thinking text.
    pub fn set_show_thinking(&mut self, show: bool) {
        self.config.show_thinking = show;
    }

    /// Sets the pacing tick. `None` renders replies as they arrive.
    pub fn set_pace(&mut self, pace: Option<Duration>) {
        self.config.pace = pace;
    }

    /// Attaches a file to the next message.
    pub fn attach(&mut self, url: impl Into<String>, kind: MessageType) {
        self.attachment = Some(Attachment {
            url: url.into(),
            kind,
        });
    }

    /// Attaches a file to the next message, uploading it first when `source` is a local file.
    ///
    /// Anything that is not an existing file is taken as a reference to an uploaded file.
    /// Without an explicit kind, uploads use the stored content type and references use the
    /// file extension.
    pub async fn attach_file(
        &mut self,
        source: &str,
        kind: Option<MessageType>,
    ) -> Result<Attachment> {
        let attachment = if Path::new(source).is_file() {
            let uploaded = self.client.upload_file(source).await?;
            tracing::debug!(
                saved_filename = %uploaded.saved_filename,
                size = uploaded.size,
                "uploaded attachment"
            );
            Attachment {
                kind: kind.unwrap_or_else(|| uploaded.message_type()),
                url: uploaded.url,
            }
        } else {
            Attachment {
                url: source.to_string(),
                kind: kind.unwrap_or_else(|| MessageType::from_extension(source)),
            }
        };
        self.attachment = Some(attachment.clone());
        Ok(attachment)
    }

    /// Drops the pending attachment, returning it.
    pub fn detach(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    /// The session configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            base_url: self.client.config().base_url.to_string(),
            conversation_id: self.conversation_id,
            message_count: self.message_count(),
            show_thinking: self.config.show_thinking,
            pace: self.config.pace,
            attachment: self.attachment.clone(),
            replies_completed: self.replies_completed,
            replies_failed: self.replies_failed,
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Prints reply chunks as they arrive, labelling sections the way composites are rendered.
struct SectionLabels {
    style: CompositeStyle,
    thinking_shown: bool,
    answer_labelled: bool,
}

impl SectionLabels {
    fn new(style: CompositeStyle) -> Self {
        Self {
            style,
            thinking_shown: false,
            answer_labelled: false,
        }
    }

    fn print(&mut self, renderer: &mut dyn Renderer, event: &StreamEvent, show_thinking: bool) {
        let sep = self.style.separator;
        match event {
            StreamEvent::ThinkingChunk { text } if show_thinking && !text.is_empty() => {
                if !self.thinking_shown {
                    renderer.print_thinking(&format!("{}{sep}", self.style.thinking_label));
                    self.thinking_shown = true;
                }
                renderer.print_thinking(text);
            }
            StreamEvent::AnswerChunk { text } => {
                // An answer-only reply carries no labels.
                if self.thinking_shown && !self.answer_labelled {
                    renderer.print_text(&format!("{sep}{}{sep}", self.style.answer_label));
                    self.answer_labelled = true;
                }
                renderer.print_text(text);
            }
            _ => {}
        }
    }
}

fn show(renderer: &mut dyn Renderer, reveal: Option<Reveal<'_>>) {
    match reveal {
        Some(Reveal::Append(text)) => renderer.print_text(text),
        Some(Reveal::Rewrite(text)) => renderer.print_revision(text),
        None => {}
    }
}

/// Titles a conversation after the first characters of its opening message.
fn title_from(input: &str) -> String {
    let input = input.trim();
    let mut title: String = input.chars().take(TITLE_CHARS).collect();
    if input.chars().count() > TITLE_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_logger::ClientLogger;
    use crate::config::ClientConfig;
    use crate::reassembler::DisplayMessage;
    use crate::types::ChatResponse;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<&'static str>>,
        replies: Mutex<Vec<String>>,
    }

    impl ClientLogger for RecordingLogger {
        fn log_response(&self, _response: &ChatResponse) {}

        fn log_stream_event(&self, event: &ServerEvent) {
            self.events.lock().unwrap().push(event.kind());
        }

        fn log_reply(&self, reply: &Reassembler) {
            self.replies
                .lock()
                .unwrap()
                .push(format!("{}: {}", reply.message_id(), reply.answer_text()));
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        text: String,
        thinking: String,
        errors: Vec<String>,
        interrupted: bool,
    }

    impl Renderer for RecordingRenderer {
        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn print_thinking(&mut self, text: &str) {
            self.thinking.push_str(text);
        }

        fn print_revision(&mut self, text: &str) {
            self.text = text.to_string();
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, _info: &str) {}

        fn finish_response(&mut self) {}

        fn print_interrupted(&mut self) {
            self.interrupted = true;
        }
    }

    const REPLY: &str = concat!(
        "data: {\"type\":\"user_message\",\"data\":{\"id\":41,\"content\":\"Plan a trip\",\"role\":\"user\",\"message_type\":\"text\"}}\n\n",
        "data: {\"type\":\"run_start\",\"data\":{\"run_id\":\"r-1\"}}\n\n",
        "data: {\"type\":\"thinking_start\",\"data\":{\"message\":\"AI is thinking...\"}}\n\n",
        "data: {\"type\":\"thinking_process\",\"data\":{\"message\":\"a\\n\"}}\n\n",
        "data: {\"type\":\"thinking_process\",\"data\":{\"message\":\"b\\n\"}}\n\n",
        "data: {\"type\":\"thinking_end\",\"data\":{\"message\":\"done\"}}\n\n",
        "data: {\"type\":\"text_message_start\",\"data\":{\"message_id\":\"9b1de0a4\",\"role\":\"assistant\"}}\n\n",
        "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"X\"}}\n\n",
        "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"Y\"}}\n\n",
        "data: {\"type\":\"text_message_end\",\"data\":{\"message_id\":\"9b1de0a4\"}}\n\n",
        "data: {\"type\":\"run_end\",\"data\":{\"run_id\":\"r-1\",\"message_id\":42}}\n\n",
    );

    const CONVERSATION: &str = r#"{"id": 5, "user_id": 1, "title": "Plan a trip", "created_at": "2025-03-01T08:15:30", "updated_at": "2025-03-01T08:15:30"}"#;

    fn session_for(server: &mockito::ServerGuard, config: ChatConfig) -> ChatSession {
        let client_config = ClientConfig::new().with_base_url(&server.url()).unwrap();
        ChatSession::new(ChatClient::new(client_config).unwrap(), config)
    }

    async fn mock_chat(server: &mut mockito::ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("POST", "/conversations/chat")
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    #[test]
    fn titles_are_truncated() {
        assert_eq!(title_from("  Plan a trip  "), "Plan a trip");
        assert_eq!(
            title_from("How do I get from Shanghai to Hangzhou?"),
            "How do I get from Sh..."
        );
        assert_eq!(
            title_from("周末去杭州玩两天应该怎么安排行程比较合理呢请帮我规划"),
            "周末去杭州玩两天应该怎么安排行程比较合理..."
        );
    }

    #[tokio::test]
    async fn send_creates_conversation_and_commits_reply() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/conversations/")
            .match_body(mockito::Matcher::Json(serde_json::json!({"title": "Plan a trip"})))
            .with_header("content-type", "application/json")
            .with_body(CONVERSATION)
            .create_async()
            .await;
        let chat = mock_chat(&mut server, REPLY).await;

        let mut session = session_for(&server, ChatConfig::new());
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("Plan a trip", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        create.assert_async().await;
        chat.assert_async().await;

        assert_eq!(renderer.thinking, "[thinking] a\nb\n");
        assert_eq!(renderer.text, " [answer] XY");
        assert_eq!(session.conversation_id(), Some(5));

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, MessageId::Number(41));
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].id, MessageId::Number(42));
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "[思考过程]\na\nb\n\n[模型回复]\nXY");
        assert_eq!(
            history[1].display(),
            DisplayMessage {
                thinking: Some("a\nb".to_string()),
                answer: "XY".to_string(),
            }
        );
        assert_eq!(session.stats().replies_completed, 1);
    }

    #[tokio::test]
    async fn completed_reply_reaches_logger() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"X\"}}\n\n",
            "data: {\"type\":\"text_message_end\",\"data\":{\"message_id\":42}}\n\n",
        );
        mock_chat(&mut server, body).await;
        let logger = Arc::new(RecordingLogger::default());
        let client_config = ClientConfig::new().with_base_url(&server.url()).unwrap();
        let client = ChatClient::new(client_config)
            .unwrap()
            .with_logger(logger.clone());
        let mut session = ChatSession::new(client, ChatConfig::new().with_conversation(5));
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(
            *logger.events.lock().unwrap(),
            vec!["text_message_delta", "text_message_end"]
        );
        assert_eq!(*logger.replies.lock().unwrap(), vec!["42: X".to_string()]);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].id, MessageId::Number(42));
        assert_eq!(session.history()[0].content, "[思考过程]\n\n[模型回复]\nX");
        assert_eq!(session.history()[0].display(), DisplayMessage::answer_only("X"));
    }

    #[tokio::test]
    async fn failed_reply_is_not_logged() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"X\"}}\n\n",
            "data: {\"type\":\"error\",\"data\":\"model unavailable\"}\n\n",
            "data: {\"type\":\"text_message_end\",\"data\":{\"message_id\":42}}\n\n",
        );
        mock_chat(&mut server, body).await;
        let logger = Arc::new(RecordingLogger::default());
        let client_config = ClientConfig::new().with_base_url(&server.url()).unwrap();
        let client = ChatClient::new(client_config)
            .unwrap()
            .with_logger(logger.clone());
        let mut session = ChatSession::new(client, ChatConfig::new().with_conversation(5));
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "stream_error: model unavailable");
        assert!(logger.replies.lock().unwrap().is_empty());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn hidden_thinking_is_not_rendered() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(&mut server, REPLY).await;
        let config = ChatConfig::new().with_conversation(5).with_show_thinking(false);
        let mut session = session_for(&server, config);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("Plan a trip", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert!(renderer.thinking.is_empty());
        assert_eq!(renderer.text, "XY");
    }

    #[tokio::test]
    async fn paced_reply_reveals_composite() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(&mut server, REPLY).await;
        let config = ChatConfig::new()
            .with_conversation(5)
            .with_pace(Some(Duration::from_millis(1)))
            .with_units_per_tick(8);
        let mut session = session_for(&server, config);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("Plan a trip", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert_eq!(renderer.text, "[thinking] a\nb [answer] XY");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn legacy_labels_apply_without_pacing() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(&mut server, REPLY).await;
        let config = ChatConfig::new()
            .with_conversation(5)
            .with_style(CompositeStyle::LEGACY);
        let mut session = session_for(&server, config);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("Plan a trip", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert_eq!(renderer.thinking, "[思考过程]\na\nb\n");
        assert_eq!(renderer.text, "\n[模型回复]\nXY");
    }

    #[test]
    fn answer_only_reply_is_unlabelled() {
        let mut renderer = RecordingRenderer::default();
        let mut labels = SectionLabels::new(CompositeStyle::INLINE);
        labels.print(&mut renderer, &StreamEvent::ThinkingChunk { text: String::new() }, true);
        labels.print(&mut renderer, &StreamEvent::AnswerChunk { text: "Hi".to_string() }, true);
        assert!(renderer.thinking.is_empty());
        assert_eq!(renderer.text, "Hi");
    }

    #[tokio::test]
    async fn truncated_stream_discards_reply() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"user_message\",\"data\":{\"id\":41,\"content\":\"hi\",\"role\":\"user\"}}\n\n",
            "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"partial\"}}\n\n",
        );
        mock_chat(&mut server, body).await;
        let mut session = session_for(&server, ChatConfig::new().with_conversation(5));
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, MessageRole::User);
        assert_eq!(session.stats().replies_failed, 1);
    }

    #[tokio::test]
    async fn empty_stream_is_incomplete() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(&mut server, "").await;
        let mut session = session_for(&server, ChatConfig::new().with_conversation(5));
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Streaming error: stream ended before the reply completed"
        );
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn server_error_event_fails_reply() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(
            &mut server,
            "data: {\"type\":\"error\",\"data\":\"Conversation not found\"}\n\n",
        )
        .await;
        let mut session = session_for(&server, ChatConfig::new().with_conversation(99));
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "stream_error: Conversation not found");
    }

    #[tokio::test]
    async fn interrupted_reply_is_discarded() {
        let mut server = mockito::Server::new_async().await;
        mock_chat(&mut server, REPLY).await;
        let mut session = session_for(&server, ChatConfig::new().with_conversation(5));
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hi", &mut renderer, Arc::new(AtomicBool::new(true)))
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert!(renderer.interrupted);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn attachment_is_sent_and_cleared() {
        let mut server = mockito::Server::new_async().await;
        let chat = server
            .mock("POST", "/conversations/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "file_url": "http://localhost:8000/uploads/cat.png",
                "message_type": "image"
            })))
            .with_header("content-type", "text/event-stream")
            .with_body(REPLY)
            .create_async()
            .await;
        let mut session = session_for(&server, ChatConfig::new().with_conversation(5));
        session.attach("http://localhost:8000/uploads/cat.png", MessageType::Image);
        let mut renderer = RecordingRenderer::default();
        session
            .send_streaming("what is this?", &mut renderer, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        chat.assert_async().await;
        assert!(session.stats().attachment.is_none());
    }

    #[tokio::test]
    async fn local_attachment_is_uploaded() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/upload/")
            .match_body(mockito::Matcher::Regex(r#"filename="notes\.txt""#.to_string()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"filename": "notes.txt", "saved_filename": "5f0c.txt", "url": "/uploads/5f0c.txt", "content_type": "text/plain", "size": 5}"#,
            )
            .create_async()
            .await;
        let dir = std::env::temp_dir().join(format!("parley-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut session = session_for(&server, ChatConfig::new());
        let attachment = session
            .attach_file(path.to_str().unwrap(), None)
            .await
            .unwrap();
        upload.assert_async().await;
        assert_eq!(
            attachment,
            Attachment {
                url: "/uploads/5f0c.txt".to_string(),
                kind: MessageType::Document,
            }
        );
        assert_eq!(session.stats().attachment, Some(attachment));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn remote_attachment_is_referenced() {
        let server = mockito::Server::new_async().await;
        let mut session = session_for(&server, ChatConfig::new());
        let attachment = session
            .attach_file("http://localhost:8000/uploads/cat.PNG", None)
            .await
            .unwrap();
        assert_eq!(attachment.kind, MessageType::Image);
        let attachment = session
            .attach_file("/uploads/report", Some(MessageType::Image))
            .await
            .unwrap();
        assert_eq!(attachment.kind, MessageType::Image);
        assert_eq!(attachment.url, "/uploads/report");
    }

    #[tokio::test]
    async fn switch_loads_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations/5")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 1, "conversation_id": 5, "content": "hi", "role": "user", "message_type": "text", "file_url": null, "created_at": "2025-03-01T08:15:30"},
                    {"id": 2, "conversation_id": 5, "content": "[思考过程]\ngreet\n[模型回复]\nHello!", "role": "assistant", "message_type": "text", "file_url": null, "created_at": "2025-03-01T08:15:31"}
                ]"#,
            )
            .create_async()
            .await;
        let mut session = session_for(&server, ChatConfig::new());
        assert_eq!(session.set_conversation(5).await.unwrap(), 2);
        assert_eq!(session.conversation_id(), Some(5));
        assert_eq!(session.history()[1].display().answer, "Hello!");
    }

    #[tokio::test]
    async fn rename_requires_active_conversation() {
        let server = mockito::Server::new_async().await;
        let mut session = session_for(&server, ChatConfig::new());
        let err = session.rename("x").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[test]
    fn set_model() {
        let client = ChatClient::new(ClientConfig::new()).unwrap();
        let mut session = ChatSession::new(client, ChatConfig::new());
        assert_eq!(session.model(), "doubao-seed-1-6-thinking-250715");
        session.set_model("qwen3-max");
        assert_eq!(session.model(), "qwen3-max");
    }

    #[test]
    fn clear_session() {
        let client = ChatClient::new(ClientConfig::new()).unwrap();
        let mut session = ChatSession::new(client, ChatConfig::new().with_conversation(3));
        assert_eq!(session.conversation_id(), Some(3));
        session.clear();
        assert_eq!(session.conversation_id(), None);
        assert_eq!(session.message_count(), 0);
    }
}
