//! Logging trait for chat client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log the traffic passing through a [`ChatClient`](crate::ChatClient).

use crate::{ChatResponse, Reassembler, ServerEvent};

/// A trait for logging chat client operations.
///
/// Implement this trait to capture and record replies, including both non-streaming
/// responses and individual streaming events.
///
/// # Example
///
/// ```rust,ignore
/// use parley::{ChatResponse, ClientLogger, Reassembler, ServerEvent};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_response(&self, response: &ChatResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(response).unwrap()).unwrap();
///     }
///
///     fn log_stream_event(&self, event: &ServerEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream event: {}", serde_json::to_string(event).unwrap()).unwrap();
///     }
///
///     fn log_reply(&self, reply: &Reassembler) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Reply {}: {}", reply.message_id(), reply.composite()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a complete response returned as a single JSON body.
    ///
    /// Called when the chat endpoint answers with `application/json` instead of an event
    /// stream.
    fn log_response(&self, response: &ChatResponse);

    /// Log an individual streaming event.
    ///
    /// Called for each [`ServerEvent`] that survives parsing, lifecycle events included.
    fn log_stream_event(&self, event: &ServerEvent);

    /// Log a reply once it has been fully reassembled.
    fn log_reply(&self, reply: &Reassembler);
}
