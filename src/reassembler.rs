//! Reassembly of a streamed reply into its thinking and answer sections.
//!
//! A [`Reassembler`] folds [`StreamEvent`]s into two buffers and keeps a composite display
//! string current after every event, so a caller can redraw the reply at any point.

use std::fmt;

use crate::{MessageId, StreamEvent};

/// Where a reply is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing has been received.
    Idle,
    /// Thinking text is arriving and no answer text has been seen.
    Thinking,
    /// Answer text is arriving.
    Answering,
    /// The reply is complete. No further event changes it.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Thinking => "thinking",
            Phase::Answering => "answering",
            Phase::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Labels and separator used to flatten a [`DisplayMessage`] into one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeStyle {
    /// Label placed before the thinking section.
    pub thinking_label: &'static str,
    /// Label placed before the answer section.
    pub answer_label: &'static str,
    /// Text placed between labels and sections.
    pub separator: &'static str,
}

impl CompositeStyle {
    /// Single-line style for live display: `[thinking] ... [answer] ...`.
    pub const INLINE: CompositeStyle = CompositeStyle {
        thinking_label: "[thinking]",
        answer_label: "[answer]",
        separator: " ",
    };

    /// The form in which the backend stores assistant messages.
    pub const LEGACY: CompositeStyle = CompositeStyle {
        thinking_label: "[思考过程]",
        answer_label: "[模型回复]",
        separator: "\n",
    };
}

impl Default for CompositeStyle {
    fn default() -> Self {
        CompositeStyle::INLINE
    }
}

/// The structured view of a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayMessage {
    /// The thinking section, if the reply has one.
    pub thinking: Option<String>,
    /// The answer section.
    pub answer: String,
}

impl DisplayMessage {
    /// Creates a message that has no thinking section.
    pub fn answer_only(answer: impl Into<String>) -> Self {
        DisplayMessage {
            thinking: None,
            answer: answer.into(),
        }
    }

    /// Flattens the message into a composite string.
    ///
    /// With a non-empty thinking section the result is the labelled thinking section,
    /// followed by the labelled answer once the answer is non-empty. Without thinking the
    /// result is the bare answer.
    pub fn render(&self, style: &CompositeStyle) -> String {
        let thinking = match self.thinking.as_deref() {
            Some(thinking) if !thinking.is_empty() => thinking,
            _ => return self.answer.clone(),
        };
        let sep = style.separator;
        let mut out = format!("{}{sep}{thinking}", style.thinking_label);
        if !self.answer.is_empty() {
            out.push_str(sep);
            out.push_str(style.answer_label);
            out.push_str(sep);
            out.push_str(&self.answer);
        }
        out
    }

    /// Splits a composite string produced with `style` back into its sections.
    ///
    /// Content that does not start with a label is taken to be a bare answer.
    pub fn parse(content: &str, style: &CompositeStyle) -> Self {
        let sep = style.separator;
        if let Some(rest) = content.strip_prefix(style.thinking_label) {
            let rest = rest.strip_prefix(sep).unwrap_or(rest);
            let marker = format!("{sep}{}", style.answer_label);
            let (thinking, answer) = match rest.find(&marker) {
                Some(idx) => {
                    let answer = &rest[idx + marker.len()..];
                    (&rest[..idx], answer.strip_prefix(sep).unwrap_or(answer))
                }
                None => match rest.strip_prefix(style.answer_label) {
                    Some(answer) => ("", answer.strip_prefix(sep).unwrap_or(answer)),
                    None => (rest, ""),
                },
            };
            let thinking = thinking.trim();
            return DisplayMessage {
                thinking: (!thinking.is_empty()).then(|| thinking.to_string()),
                answer: answer.to_string(),
            };
        }
        if let Some(answer) = content.strip_prefix(style.answer_label) {
            return DisplayMessage::answer_only(answer.strip_prefix(sep).unwrap_or(answer));
        }
        DisplayMessage::answer_only(content)
    }
}

/// Folds the events of one reply into thinking and answer text.
///
/// A reassembler is created per request. It starts [`Phase::Idle`] with a provisional local
/// id and becomes [`Phase::Done`] exactly once, on [`StreamEvent::AnswerComplete`]; after
/// that every event is ignored. It never retries: if the stream fails, the state reached so
/// far is left for the caller to inspect.
#[derive(Debug, Clone)]
pub struct Reassembler {
    id: MessageId,
    thinking: Vec<String>,
    answer: Vec<String>,
    phase: Phase,
    style: CompositeStyle,
    composite: String,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// Creates an idle reassembler that renders with [`CompositeStyle::INLINE`].
    pub fn new() -> Self {
        Reassembler {
            id: MessageId::provisional(),
            thinking: Vec::new(),
            answer: Vec::new(),
            phase: Phase::Idle,
            style: CompositeStyle::INLINE,
            composite: String::new(),
        }
    }

    /// Sets the style used for the composite string.
    pub fn with_style(mut self, style: CompositeStyle) -> Self {
        self.style = style;
        self.recompute();
        self
    }

    /// Applies one event. Returns false if the event was ignored because the reply is done.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        if self.phase == Phase::Done {
            return false;
        }
        match event {
            StreamEvent::ThinkingChunk { text } => {
                if self.phase == Phase::Idle {
                    self.phase = Phase::Thinking;
                }
                self.thinking.push(text.clone());
            }
            StreamEvent::AnswerChunk { text } => {
                self.phase = Phase::Answering;
                self.answer.push(text.clone());
            }
            StreamEvent::AnswerComplete { final_message_id } => {
                self.phase = Phase::Done;
                self.id = final_message_id.clone();
            }
        }
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        self.composite = self.display().render(&self.style);
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once [`StreamEvent::AnswerComplete`] has been applied.
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The message id: provisional until the reply completes.
    pub fn message_id(&self) -> &MessageId {
        &self.id
    }

    /// The thinking fragments, concatenated as received.
    pub fn thinking_text(&self) -> String {
        self.thinking.concat()
    }

    /// The answer fragments, concatenated as received.
    pub fn answer_text(&self) -> String {
        self.answer.concat()
    }

    /// The structured view of the reply so far.
    pub fn display(&self) -> DisplayMessage {
        let thinking = self.thinking_text();
        let thinking = thinking.trim_end();
        DisplayMessage {
            thinking: (!thinking.is_empty()).then(|| thinking.to_string()),
            answer: self.answer_text(),
        }
    }

    /// The message content the server stores for this reply.
    ///
    /// Both sections are always present and the fragments are kept verbatim, so a reply
    /// committed locally reads the same as one reloaded from the server.
    pub fn stored_content(&self) -> String {
        let style = CompositeStyle::LEGACY;
        format!(
            "{}\n{}\n{}\n{}",
            style.thinking_label,
            self.thinking_text(),
            style.answer_label,
            self.answer_text()
        )
    }

    /// The composite string for the reply so far.
    pub fn composite(&self) -> &str {
        &self.composite
    }

    /// The style used for [`Reassembler::composite`].
    pub fn style(&self) -> &CompositeStyle {
        &self.style
    }
}
