//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

use crate::types::MessageType;

/// A parsed chat command.
///
/// These commands control the chat session and are not sent as messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Forget the local history and detach from the active conversation.
    Clear,

    /// List the models the backend offers.
    Models,

    /// Change the model.
    Model(String),

    /// List the caller's conversations.
    Conversations,

    /// Start a new conversation, optionally with a title.
    New(Option<String>),

    /// Make conversation `id` the active one and load its history.
    Switch(i64),

    /// Rename the active conversation.
    Rename(String),

    /// Delete conversation `id`.
    Delete(i64),

    /// Print the history of the active conversation.
    History,

    /// Toggle thinking visibility.
    Thinking(bool),

    /// Attach a file to the next message.
    Attach {
        /// Local path to upload, or a reference to an already uploaded file.
        source: String,
        /// Kind of file, when given explicitly.
        kind: Option<MessageType>,
    },

    /// Drop the pending attachment.
    Detach,

    /// Reveal replies at one tick per this many milliseconds.
    Pace(u64),

    /// Render replies as they arrive.
    ClearPace,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model qwen3-max").is_some());
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "models" => ChatCommand::Models,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "conversations" | "ls" => ChatCommand::Conversations,
        "new" => ChatCommand::New(argument.map(|s| s.to_string())),
        "switch" | "open" => parse_id_command(argument, ChatCommand::Switch, "/switch"),
        "rename" => match argument {
            Some(title) => ChatCommand::Rename(title.to_string()),
            None => ChatCommand::Invalid("/rename requires a title".to_string()),
        },
        "delete" => parse_id_command(argument, ChatCommand::Delete, "/delete"),
        "history" => ChatCommand::History,
        "thinking" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Thinking(value),
            None => ChatCommand::Invalid("/thinking expects 'on' or 'off'".to_string()),
        },
        "attach" => parse_attach_command(argument),
        "detach" => ChatCommand::Detach,
        "pace" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("off") => ChatCommand::ClearPace,
            Some(arg) => match arg.parse::<u64>() {
                Ok(0) => ChatCommand::ClearPace,
                Ok(value) => ChatCommand::Pace(value),
                Err(_) => ChatCommand::Invalid(
                    "/pace expects milliseconds per tick or 'off'".to_string(),
                ),
            },
            None => ChatCommand::Invalid("/pace requires a value".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_id_command<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(i64) -> ChatCommand,
{
    match argument {
        Some(arg) => match arg.parse::<i64>() {
            Ok(value) => constructor(value),
            Err(_) => ChatCommand::Invalid(format!("{} expects a conversation id", name)),
        },
        None => ChatCommand::Invalid(format!("{} requires a conversation id", name)),
    }
}

fn parse_attach_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid("/attach requires a file path or URL".to_string());
    };

    let mut parts = arg.split_whitespace();
    let Some(source) = parts.next() else {
        return ChatCommand::Invalid("/attach requires a file path or URL".to_string());
    };
    let kind = match parts.next() {
        Some(kind) => match kind.parse::<MessageType>() {
            Ok(kind) => Some(kind),
            Err(err) => return ChatCommand::Invalid(format!("/attach {err}")),
        },
        None => None,
    };
    ChatCommand::Attach {
        source: source.to_string(),
        kind,
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /models                List available models
  /model <name>          Change the model (e.g., /model qwen3-max)
  /conversations         List your conversations
  /new [title]           Start a new conversation
  /switch <id>           Switch to a conversation and load its history
  /rename <title>        Rename the active conversation
  /delete <id>           Delete a conversation
  /history               Show the active conversation
  /clear                 Forget local history and detach from the conversation
  /thinking on|off       Show or hide thinking text
  /attach <path|url> [kind]  Attach a file, uploading local paths (image, document)
  /detach                Drop the pending attachment
  /pace <ms>|off         Reveal replies at a steady pace, or as they arrive
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}
