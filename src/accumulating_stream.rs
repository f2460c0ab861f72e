//! Reassembles streaming events into a complete reply while passing updates through.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::observability::{REPLIES_ABANDONED, REPLIES_COMPLETED};
use crate::{
    ClientLogger, CompositeStyle, DisplayMessage, Error, Phase, Reassembler, StreamEvent,
};

/// A snapshot of a reply taken after an event changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// The event that was applied.
    pub event: StreamEvent,
    /// Phase after the event.
    pub phase: Phase,
    /// Structured view after the event.
    pub display: DisplayMessage,
    /// Composite string after the event.
    pub composite: String,
}

impl Update {
    fn of(event: StreamEvent, reassembler: &Reassembler) -> Self {
        Update {
            event,
            phase: reassembler.phase(),
            display: reassembler.display(),
            composite: reassembler.composite().to_string(),
        }
    }
}

/// A stream wrapper that folds `StreamEvent`s into a [`Reassembler`].
///
/// Each event that changes the reply yields an [`Update`], so callers can redraw as tokens
/// arrive without keeping their own buffers. An error is passed through and ends the stream:
/// the reply is abandoned in whatever phase it had reached. When the stream ends, or is
/// dropped before its end, the reassembler is sent via the oneshot channel returned by `new()`.
pub struct ReassemblingStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>,
    reply_tx: Option<tokio::sync::oneshot::Sender<Reassembler>>,
    reassembler: Reassembler,
    logger: Option<Arc<dyn ClientLogger>>,
    failed: bool,
}

impl ReassemblingStream {
    /// Wraps a `StreamEvent` stream to reassemble its events.
    ///
    /// Returns the stream and a receiver that will contain the [`Reassembler`] once the
    /// stream is fully drained.
    pub fn new<S>(stream: S) -> (Self, tokio::sync::oneshot::Receiver<Reassembler>)
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self::with_reassembler(stream, Reassembler::new())
    }

    /// Wraps a `StreamEvent` stream and folds it into `reassembler`.
    pub fn with_reassembler<S>(
        stream: S,
        reassembler: Reassembler,
    ) -> (Self, tokio::sync::oneshot::Receiver<Reassembler>)
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let this = Self {
            inner: Box::pin(stream),
            reply_tx: Some(tx),
            reassembler,
            logger: None,
            failed: false,
        };
        (this, rx)
    }

    /// Wraps a `StreamEvent` stream, rendering composites with `style`.
    pub fn with_style<S>(
        stream: S,
        style: CompositeStyle,
    ) -> (Self, tokio::sync::oneshot::Receiver<Reassembler>)
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self::with_reassembler(stream, Reassembler::new().with_style(style))
    }

    /// Reports the completed reply to `logger`.
    pub fn with_logger(mut self, logger: Option<Arc<dyn ClientLogger>>) -> Self {
        self.logger = logger;
        self
    }

    /// The reply as reassembled so far.
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Takes the reply as reassembled so far without draining the stream.
    ///
    /// The receiver returned by `new()` is closed without a value.
    pub fn finalize_partial(&mut self) -> Reassembler {
        self.reply_tx.take();
        self.reassembler.clone()
    }

    fn finish(&mut self) {
        if self.reply_tx.is_none() {
            return;
        }
        if self.reassembler.is_complete() {
            REPLIES_COMPLETED.click();
            if let Some(logger) = &self.logger {
                logger.log_reply(&self.reassembler);
            }
        } else {
            REPLIES_ABANDONED.click();
            tracing::debug!(phase = %self.reassembler.phase(), "stream ended before the reply completed");
        }
        if let Some(tx) = self.reply_tx.take() {
            let _ = tx.send(self.reassembler.clone());
        }
    }
}

impl Stream for ReassemblingStream {
    type Item = Result<Update, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.reassembler.apply(&event) {
                        return Poll::Ready(Some(Ok(Update::of(event, &self.reassembler))));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.failed = true;
                    self.finish();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.finish();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ReassemblingStream {
    fn drop(&mut self) {
        self.finish();
    }
}
