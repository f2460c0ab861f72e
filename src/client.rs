use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::accumulating_stream::ReassemblingStream;
use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_TTFE,
};
use crate::reassembler::{CompositeStyle, Reassembler};
use crate::sse::{process_sse, stream_events};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, Conversation, ConversationCreate, ModelList,
    ServerEvent, UploadedFile,
};

/// A boxed stream of server events.
pub type ServerEventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent>> + Send>>;

/// Client for the chat conversation API.
///
/// A client is an explicit value owned by its caller; clones share the underlying connection
/// pool.
#[derive(Clone)]
pub struct ChatClient {
    config: ClientConfig,
    client: ReqwestClient,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("has_token", &self.config.token.is_some())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl ChatClient {
    /// Create a new client from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        // The total timeout is applied per request so that it never cuts a long reply short.
        let client = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            config,
            client,
            logger: None,
        })
    }

    /// Create a new client configured from `PARLEY_BASE_URL` and `PARLEY_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Attach a logger that observes responses, stream events and completed replies.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create and return default headers for API requests.
    ///
    /// The content type is left to the body: JSON and multipart bodies each set their own.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::authentication("token contains invalid header characters"))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.config.endpoint(path)?;
        tracing::debug!(%method, %url, "request");
        Ok(self
            .client
            .request(method, url)
            .headers(self.default_headers()?))
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.config.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = builder.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            self.map_send_error(e)
        })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder.timeout(self.config.timeout)).await?;
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // FastAPI reports errors as {"detail": "..."} or, for validation failures,
        // {"detail": [{"loc": [...], "msg": "..."}]}.
        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<Detail>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Detail {
            Message(String),
            Validation(Vec<ValidationDetail>),
        }

        #[derive(Deserialize)]
        struct ValidationDetail {
            #[serde(default)]
            loc: Vec<serde_json::Value>,
            msg: String,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.detail);
        let (error_message, error_param) = match detail {
            Some(Detail::Message(message)) => (message, None),
            Some(Detail::Validation(details)) => {
                let param = details.first().map(|d| {
                    d.loc
                        .iter()
                        .map(|part| match part {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                });
                let message = details
                    .iter()
                    .map(|d| d.msg.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                (message, param)
            }
            None => (error_body, None),
        };

        match status_code {
            400 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message, None, None),
            408 => Error::timeout(error_message, None),
            422 => Error::validation(error_message, error_param),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(Some(status_code), None, error_message),
        }
    }

    /// List the models the backend can answer with.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let list: ModelList = self
            .call(self.request(Method::GET, "conversations/models")?)
            .await?;
        Ok(list.models)
    }

    /// List the caller's conversations.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.call(self.request(Method::GET, "conversations/")?).await
    }

    /// Create a conversation titled `title`.
    pub async fn create_conversation(&self, title: &str) -> Result<Conversation> {
        let builder = self
            .request(Method::POST, "conversations/")?
            .json(&ConversationCreate::new(title));
        self.call(builder).await
    }

    /// Rename conversation `id`.
    pub async fn rename_conversation(&self, id: i64, title: &str) -> Result<Conversation> {
        let builder = self
            .request(Method::PUT, &format!("conversations/{id}"))?
            .json(&ConversationCreate::new(title));
        self.call(builder).await.map_err(conversation_not_found(id))
    }

    /// Fetch the stored messages of conversation `id`, oldest first.
    pub async fn messages(&self, id: i64) -> Result<Vec<ChatMessage>> {
        self.call(self.request(Method::GET, &format!("conversations/{id}"))?)
            .await
            .map_err(conversation_not_found(id))
    }

    /// Delete conversation `id` and its messages.
    pub async fn delete_conversation(&self, id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .call(self.request(Method::DELETE, &format!("conversations/{id}"))?)
            .await
            .map_err(conversation_not_found(id))?;
        Ok(())
    }

    /// Upload a local file so that a chat message can reference it.
    ///
    /// The returned record's `url` is what [`ChatRequest::with_file`] expects.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadedFile> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(format!("Failed to read {}: {}", path.display(), e), e))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        tracing::debug!(file = %file_name, size = data.len(), "upload");

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(content_type_for(path))
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build upload: {}", e),
                    Some(Box::new(e)),
                )
            })?;
        let builder = self
            .request(Method::POST, "upload/")?
            .multipart(Form::new().part("file", part));
        self.call(builder).await
    }

    /// Send a chat message and get a streaming response.
    ///
    /// Returns every [`ServerEvent`] of the reply, lifecycle events included. Malformed and
    /// unrecognized events are skipped. A server that answers with a single JSON
    /// [`ChatResponse`] instead of an event stream is handled transparently: the response is
    /// converted into the equivalent event sequence.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ServerEventStream> {
        let url = self.config.endpoint("conversations/chat")?;
        tracing::debug!(%url, conversation_id = request.conversation_id, model = %request.model, "chat");

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let builder = self.client.post(url).headers(headers).json(request);

        let start = Instant::now();
        let response = self.send(builder).await?;

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let events: ServerEventStream = if is_json {
            let reply = response.json::<ChatResponse>().await.map_err(|e| {
                Error::serialization(
                    format!("Failed to parse response: {}", e),
                    Some(Box::new(e)),
                )
            })?;
            if let Some(logger) = &self.logger {
                logger.log_response(&reply);
            }
            Box::pin(stream::iter(reply.into_events().into_iter().map(Ok)))
        } else {
            // Get the byte stream from the response
            Box::pin(process_sse(response.bytes_stream()))
        };

        let logger = self.logger.clone();
        let mut first = true;
        Ok(Box::pin(events.inspect(move |event| {
            if first {
                first = false;
                STREAM_TTFE.add(start.elapsed().as_secs_f64());
            }
            if let (Some(logger), Ok(event)) = (&logger, event) {
                logger.log_stream_event(event);
            }
        })))
    }

    /// Send a chat message and reassemble the reply.
    ///
    /// The returned stream yields an update for each event that changes the reply. When it is
    /// drained, the final [`Reassembler`] arrives on the receiver.
    pub async fn reply(
        &self,
        request: &ChatRequest,
    ) -> Result<(ReassemblingStream, tokio::sync::oneshot::Receiver<Reassembler>)> {
        self.reply_with_style(request, CompositeStyle::INLINE).await
    }

    /// Like [`ChatClient::reply`], rendering composites with `style`.
    pub async fn reply_with_style(
        &self,
        request: &ChatRequest,
        style: CompositeStyle,
    ) -> Result<(ReassemblingStream, tokio::sync::oneshot::Receiver<Reassembler>)> {
        Ok(self.reassemble(self.chat_stream(request).await?, style))
    }

    /// Reassemble a stream of server events with this client's logger attached.
    ///
    /// Lifecycle events are dropped and a server `error` event becomes an error item.
    pub fn reassemble<S>(
        &self,
        events: S,
        style: CompositeStyle,
    ) -> (ReassemblingStream, tokio::sync::oneshot::Receiver<Reassembler>)
    where
        S: Stream<Item = Result<ServerEvent>> + Send + 'static,
    {
        let (stream, rx) = ReassemblingStream::with_style(stream_events(events), style);
        (stream.with_logger(self.logger.clone()), rx)
    }
}

/// Attaches the conversation to a "not found" error.
fn conversation_not_found(id: i64) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::NotFound { message, .. } => Error::not_found(
            message,
            Some("conversation".to_string()),
            Some(id.to_string()),
        ),
        other => other,
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
