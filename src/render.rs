//! Output rendering for streamed replies.
//!
//! This module provides the renderer trait used by the chat session and a plain-text
//! implementation for terminals.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI escape code for dim text (used for thinking text).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for thinking text).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering streaming output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print a chunk of answer text.
    ///
    /// This is called incrementally as deltas arrive.
    fn print_text(&mut self, text: &str);

    /// Print a chunk of thinking text.
    ///
    /// Thinking is displayed differently (dim/italic) to distinguish it from the answer.
    fn print_thinking(&mut self, text: &str);

    /// Replace everything printed for the current reply with `text`.
    ///
    /// Terminals that cannot erase simply start a new line.
    fn print_revision(&mut self, text: &str) {
        self.print_text("\n");
        self.print_text(text);
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a reply is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes to stdout (or any writer) with optional ANSI escape codes for
/// styling thinking text.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    in_thinking: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }

    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: impl Write + Send + 'static, use_color: bool) -> Self {
        Self {
            out: Box::new(out),
            use_color,
            in_thinking: false,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Creates a new PlainTextRenderer with specified color and interrupt flag.
    pub fn with_color_and_interrupt(use_color: bool, interrupted: Arc<AtomicBool>) -> Self {
        Self::with_color(use_color).with_interrupt(interrupted)
    }

    /// Whether ANSI styling is emitted.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            if self.use_color {
                self.write(ANSI_RESET);
            }
            if !self.line_start {
                self.write("\n");
            }
            self.in_thinking = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        self.reset_thinking();
        self.write(text);
    }

    fn print_thinking(&mut self, text: &str) {
        if !self.in_thinking {
            if self.use_color {
                self.write(ANSI_DIM);
                self.write(ANSI_ITALIC);
            } else {
                self.write("[thinking] ");
            }
            self.in_thinking = true;
        }
        self.write(text);
    }

    fn print_error(&mut self, error: &str) {
        self.reset_thinking();
        if !self.line_start {
            self.write("\n");
        }
        if self.use_color {
            self.write(&format!("{ANSI_RED}Error: {error}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("Error: {error}\n"));
        }
    }

    fn print_info(&mut self, info: &str) {
        self.reset_thinking();
        self.write(&format!("{info}\n"));
    }

    fn finish_response(&mut self) {
        self.reset_thinking();
        if !self.line_start {
            self.write("\n");
        }
    }

    fn print_interrupted(&mut self) {
        self.reset_thinking();
        if !self.line_start {
            self.write("\n");
        }
        self.write("[interrupted]\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color());
    }

    #[test]
    fn plain_thinking_then_answer() {
        let out = Shared::default();
        let mut renderer = PlainTextRenderer::with_writer(out.clone(), false);
        renderer.print_thinking("a\n");
        renderer.print_thinking("b");
        renderer.print_text("X");
        renderer.print_text("Y");
        renderer.finish_response();
        assert_eq!(out.contents(), "[thinking] a\nb\nXY\n");
    }

    #[test]
    fn colored_thinking_is_reset() {
        let out = Shared::default();
        let mut renderer = PlainTextRenderer::with_writer(out.clone(), true);
        renderer.print_thinking("hmm");
        renderer.print_text("ok");
        renderer.finish_response();
        assert_eq!(out.contents(), "\x1b[2m\x1b[3mhmm\x1b[0m\nok\n");
    }

    #[test]
    fn revision_starts_a_new_line() {
        let out = Shared::default();
        let mut renderer = PlainTextRenderer::with_writer(out.clone(), false);
        renderer.print_text("[thinking] a");
        renderer.print_revision("[thinking] b");
        assert_eq!(out.contents(), "[thinking] a\n[thinking] b");
    }

    #[test]
    fn interrupt_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let renderer = PlainTextRenderer::with_color_and_interrupt(false, flag.clone());
        assert!(!renderer.should_interrupt());
        flag.store(true, Ordering::Relaxed);
        assert!(renderer.should_interrupt());
    }
}
