//! Server-Sent Events (SSE) processing for streaming replies.
//!
//! This module classifies the lines of a chat response body into structured
//! [`ServerEvent`] values. One bad event never costs the rest of the reply: malformed
//! payloads and unknown event types are logged, counted and skipped.

use bytes::Bytes;
use futures::future;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;

use crate::lines::read_lines;
use crate::observability::{STREAM_ERRORS, STREAM_EVENTS, STREAM_SKIPPED_EVENTS};
use crate::{Error, Result, ServerEvent, StreamEvent};

/// Prefix of the lines that carry an event payload.
pub const DATA_PREFIX: &str = "data:";

/// Returns the payload of a data line, or `None` for any other line.
fn data_payload(line: &str) -> Option<&str> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    Some(payload.strip_prefix(' ').unwrap_or(payload))
}

/// Parse one line of the response body.
///
/// Returns `Ok(None)` for lines that do not carry data: blank separators, comments and
/// keep-alives. A data line whose JSON does not parse, has no string `type`, or does not
/// match the shape of its type yields [`Error::PayloadParse`]; a `type` outside
/// [`ServerEvent::KINDS`] yields [`Error::UnrecognizedEventType`].
pub fn parse_line(line: &str) -> Result<Option<ServerEvent>> {
    let Some(payload) = data_payload(line) else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(payload).map_err(|e| {
        Error::payload_parse(
            format!("Failed to parse event JSON: {e}"),
            payload,
            Some(Box::new(e)),
        )
    })?;

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(Error::payload_parse(
            "event has no string 'type' field",
            payload,
            None,
        ));
    };
    if !ServerEvent::is_known_kind(kind) {
        return Err(Error::unrecognized_event_type(kind));
    }

    serde_json::from_value::<ServerEvent>(value)
        .map(Some)
        .map_err(|e| {
            Error::payload_parse(
                format!("Malformed event payload: {e}"),
                payload,
                Some(Box::new(e)),
            )
        })
}

/// Parse one line and narrow it to the events that change a reply.
///
/// Lifecycle events (`run_start`, `thinking_end`, ...) yield `Ok(None)` just like
/// non-data lines. A server `error` event yields [`Error::Api`] with type `stream_error`.
pub fn parse_stream_event(line: &str) -> Result<Option<StreamEvent>> {
    match parse_line(line)? {
        Some(event) => narrow(event),
        None => Ok(None),
    }
}

fn narrow(event: ServerEvent) -> Result<Option<StreamEvent>> {
    match event {
        ServerEvent::Error(message) => Err(Error::stream_error(message)),
        event => Ok(event.to_stream_event()),
    }
}

/// Process a stream of bytes into a stream of server events.
///
/// This takes the byte stream of an HTTP response and converts it into parsed
/// [`ServerEvent`]s, recovering from per-event errors. A transport error is passed
/// through and ends the stream.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ServerEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    read_lines(byte_stream).filter_map(|line| future::ready(classify(line)))
}

fn classify(line: Result<String>) -> Option<Result<ServerEvent>> {
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            STREAM_ERRORS.click();
            return Some(Err(e));
        }
    };
    match parse_line(&line) {
        Ok(Some(event)) => {
            STREAM_EVENTS.click();
            Some(Ok(event))
        }
        Ok(None) => None,
        Err(e) if e.is_recoverable() => {
            STREAM_SKIPPED_EVENTS.click();
            tracing::warn!(error = %e, line = %line, "skipping stream event");
            None
        }
        Err(e) => Some(Err(e)),
    }
}

/// Narrow a stream of server events to the events that change a reply.
///
/// A server `error` event becomes an [`Error::Api`] item.
pub fn stream_events<S>(events: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<ServerEvent>> + Send + 'static,
{
    events.filter_map(|event| {
        future::ready(match event {
            Ok(event) => {
                if event.to_stream_event().is_none() {
                    tracing::debug!(kind = event.kind(), "lifecycle event");
                }
                narrow(event).transpose()
            }
            Err(e) => Some(Err(e)),
        })
    })
}
