//! Interactive chat against the conversation API.
//!
//! This module provides a streaming REPL built on top of the parley client library. It
//! supports:
//!
//! - Streaming replies with thinking and answer text shown as they arrive
//! - Optional paced reveal of the composite reply
//! - Conversation management through slash commands
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation state and reply streaming
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{Attachment, ChatSession, SessionStats};
