//! Interactive chat against the conversation API.
//!
//! This binary provides a streaming REPL that shows the model's thinking and answer as they
//! arrive.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! parley-chat
//!
//! # Talk to a remote backend with a token
//! parley-chat --base-url https://chat.example.com/api --token "$TOKEN"
//!
//! # Resume a conversation and reveal replies at a steady pace
//! parley-chat --conversation 12 --pace-ms 20
//!
//! # Disable colors (useful for piping output)
//! parley-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/conversations` - List conversations
//! - `/switch <id>` - Resume a conversation
//! - `/thinking on|off` - Show or hide thinking text
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::Level;

use parley::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use parley::{ChatClient, ChatMessage, MessageRole};

/// Main entry point for the parley-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("parley-chat [OPTIONS]");

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .init();

    let profile = args.load_profile()?;
    let client_config = args.client_config(profile.as_ref())?;
    let config = ChatConfig::resolve(&args, profile.as_ref());
    let use_color = config.use_color;
    let resume = config.conversation_id;

    let client = ChatClient::new(client_config)?;
    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer = PlainTextRenderer::with_color_and_interrupt(use_color, interrupted.clone());

    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Parley Chat (model: {})", session.model());
    println!("Type /help for commands, /quit to exit\n");

    if let Some(id) = resume {
        match session.set_conversation(id).await {
            Ok(count) => {
                renderer.print_info(&format!("Resumed conversation {id} ({count} messages)."))
            }
            Err(err) => {
                session.clear();
                renderer.print_error(&format!("Failed to resume conversation {id}: {err}"));
            }
        }
    }

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if !run_command(cmd, &mut session, &mut renderer).await {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                println!("Assistant:");
                if let Err(e) = session
                    .send_streaming(line, &mut renderer, interrupted.clone())
                    .await
                {
                    if !e.is_abort() {
                        renderer.print_error(&e.to_string());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

/// Runs one slash command. Returns false when the session should end.
async fn run_command(
    cmd: ChatCommand,
    session: &mut ChatSession,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Clear => {
            session.clear();
            renderer.print_info("Conversation cleared. The next message starts a new one.");
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Models => match session.models().await {
            Ok(models) => {
                println!("    Available models:");
                for model in models {
                    let marker = if model == session.model() { "*" } else { " " };
                    println!("    {marker} {model}");
                }
            }
            Err(err) => renderer.print_error(&format!("Failed to list models: {err}")),
        },
        ChatCommand::Model(model) => {
            session.set_model(model.clone());
            renderer.print_info(&format!("Model changed to: {}", model));
        }
        ChatCommand::Conversations => match session.conversations().await {
            Ok(conversations) if conversations.is_empty() => {
                renderer.print_info("No conversations yet.")
            }
            Ok(conversations) => {
                println!("    Conversations:");
                for conversation in conversations {
                    let marker = if Some(conversation.id) == session.conversation_id() {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "    {marker} {:>5}  {}  ({})",
                        conversation.id,
                        conversation.title,
                        conversation.updated_at.date()
                    );
                }
            }
            Err(err) => renderer.print_error(&format!("Failed to list conversations: {err}")),
        },
        ChatCommand::New(title) => match session.start_conversation(title.as_deref()).await {
            Ok(Some(conversation)) => renderer.print_info(&format!(
                "Started conversation {}: {}",
                conversation.id, conversation.title
            )),
            Ok(None) => renderer.print_info("The next message starts a new conversation."),
            Err(err) => renderer.print_error(&format!("Failed to create conversation: {err}")),
        },
        ChatCommand::Switch(id) => match session.set_conversation(id).await {
            Ok(count) => {
                renderer.print_info(&format!("Switched to conversation {id} ({count} messages)."))
            }
            Err(err) => renderer.print_error(&format!("Failed to open conversation {id}: {err}")),
        },
        ChatCommand::Rename(title) => match session.rename(&title).await {
            Ok(conversation) => renderer.print_info(&format!(
                "Renamed conversation {} to: {}",
                conversation.id, conversation.title
            )),
            Err(err) => renderer.print_error(&format!("Failed to rename conversation: {err}")),
        },
        ChatCommand::Delete(id) => match session.delete(id).await {
            Ok(()) => renderer.print_info(&format!("Deleted conversation {id}.")),
            Err(err) => renderer.print_error(&format!("Failed to delete conversation {id}: {err}")),
        },
        ChatCommand::History => {
            print_history(session.history(), session.config().show_thinking, renderer)
        }
        ChatCommand::Thinking(show) => {
            session.set_show_thinking(show);
            if show {
                renderer.print_info("Thinking output enabled.");
            } else {
                renderer.print_info("Thinking output hidden.");
            }
        }
        ChatCommand::Attach { source, kind } => match session.attach_file(&source, kind).await {
            Ok(attachment) => renderer.print_info(&format!(
                "Attached {} {} to the next message.",
                attachment.kind, attachment.url
            )),
            Err(err) => renderer.print_error(&format!("Failed to attach {source}: {err}")),
        },
        ChatCommand::Detach => match session.detach() {
            Some(attachment) => renderer.print_info(&format!("Dropped {}.", attachment.url)),
            None => renderer.print_info("Nothing attached."),
        },
        ChatCommand::Pace(ms) => {
            session.set_pace(Some(Duration::from_millis(ms)));
            renderer.print_info(&format!("Replies revealed every {ms} ms."));
        }
        ChatCommand::ClearPace => {
            session.set_pace(None);
            renderer.print_info("Replies shown as they arrive.");
        }
        ChatCommand::Stats => print_stats(session),
        ChatCommand::ShowConfig => print_config(session),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn print_history(history: &[ChatMessage], show_thinking: bool, renderer: &mut PlainTextRenderer) {
    if history.is_empty() {
        renderer.print_info("No messages yet.");
        return;
    }
    for message in history {
        match message.role {
            MessageRole::User => println!("You: {}", message.content),
            MessageRole::Assistant => {
                println!("Assistant:");
                let display = message.display();
                if let Some(thinking) = display.thinking.as_deref().filter(|_| show_thinking) {
                    renderer.print_thinking(thinking);
                }
                renderer.print_text(&display.answer);
                renderer.finish_response();
            }
        }
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Conversation: {}", describe_conversation(stats.conversation_id));
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Replies: {} completed / {} failed",
        stats.replies_completed, stats.replies_failed
    );
    match stats.attachment {
        Some(ref attachment) => {
            println!("      Attachment: {} ({})", attachment.url, attachment.kind)
        }
        None => println!("      Attachment: (none)"),
    }
}

fn print_config(session: &ChatSession) {
    let stats = session.stats();
    println!("    Current Configuration:");
    println!("      Base URL: {}", stats.base_url);
    println!("      Model: {}", stats.model);
    println!(
        "      Thinking output: {}",
        if stats.show_thinking {
            "shown"
        } else {
            "hidden"
        }
    );
    match stats.pace {
        Some(pace) => println!("      Pace: {} ms per tick", pace.as_millis()),
        None => println!("      Pace: (off)"),
    }
}

fn describe_conversation(id: Option<i64>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
