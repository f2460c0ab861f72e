//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::env;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::{ClientConfig, DEFAULT_MODEL, Profile};
use crate::error::Result;
use crate::reassembler::CompositeStyle;

/// Characters revealed per pacing tick.
const DEFAULT_UNITS_PER_TICK: usize = 2;

/// Command-line arguments for the parley-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Root URL of the chat API.
    #[arrrg(optional, "API base URL (default: http://localhost:8000/)", "URL")]
    pub base_url: Option<String>,

    /// Bearer token for the API.
    #[arrrg(optional, "Bearer token (default: $PARLEY_TOKEN)", "TOKEN")]
    pub token: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: doubao-seed-1-6-thinking-250715)", "MODEL")]
    pub model: Option<String>,

    /// Conversation to resume.
    #[arrrg(optional, "Resume the conversation with this id", "ID")]
    pub conversation: Option<i64>,

    /// YAML profile with defaults.
    #[arrrg(optional, "Load defaults from a YAML profile", "FILE")]
    pub profile: Option<String>,

    /// Pacing tick in milliseconds.
    #[arrrg(optional, "Reveal replies at one tick per MS milliseconds", "MS")]
    pub pace_ms: Option<u64>,

    /// Hide thinking text.
    #[arrrg(flag, "Hide the model's thinking")]
    pub hide_thinking: bool,

    /// Label the thinking and answer sections of printed replies the way the server stores
    /// them, whether or not output is paced.
    #[arrrg(flag, "Label printed reply sections the way the server stores them")]
    pub legacy_labels: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log debug output to stderr.
    #[arrrg(flag, "Log requests and stream events to stderr")]
    pub verbose: bool,
}

impl ChatArgs {
    /// Loads the profile named by `--profile`, if any.
    pub fn load_profile(&self) -> Result<Option<Profile>> {
        self.profile.as_deref().map(Profile::from_file).transpose()
    }

    /// Resolves connection settings: arguments, then environment, then profile, then defaults.
    pub fn client_config(&self, profile: Option<&Profile>) -> Result<ClientConfig> {
        self.client_config_with_env(profile, |key| env::var(key).ok())
    }

    fn client_config_with_env<F>(&self, profile: Option<&Profile>, lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::new();
        if let Some(profile) = profile {
            config = config.apply_profile(profile)?;
        }
        config = config.apply_env(lookup)?;
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url)?;
        }
        if let Some(token) = &self.token {
            config = config.with_token(token.clone());
        }
        Ok(config)
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments and the profile with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// Conversation to resume on start.
    pub conversation_id: Option<i64>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether thinking text is displayed.
    pub show_thinking: bool,

    /// Pacing tick; `None` renders replies as they arrive.
    pub pace: Option<Duration>,

    /// Characters revealed per pacing tick.
    pub units_per_tick: usize,

    /// Labels used for composite rendering.
    pub style: CompositeStyle,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: doubao-seed-1-6-thinking-250715
    /// - Color: enabled
    /// - Thinking: shown
    /// - Pacing: disabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            conversation_id: None,
            use_color: true,
            show_thinking: true,
            pace: None,
            units_per_tick: DEFAULT_UNITS_PER_TICK,
            style: CompositeStyle::INLINE,
        }
    }

    /// Resolves the configuration from arguments layered over an optional profile.
    pub fn resolve(args: &ChatArgs, profile: Option<&Profile>) -> Self {
        let profile = profile.cloned().unwrap_or_default();
        let model = args
            .model
            .clone()
            .or(profile.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let pace_ms = args.pace_ms.or(profile.pace_ms).filter(|ms| *ms > 0);
        let show_thinking = !args.hide_thinking && profile.show_thinking.unwrap_or(true);

        ChatConfig {
            model,
            conversation_id: args.conversation,
            use_color: !args.no_color,
            show_thinking,
            pace: pace_ms.map(Duration::from_millis),
            style: if args.legacy_labels {
                CompositeStyle::LEGACY
            } else {
                CompositeStyle::INLINE
            },
            ..ChatConfig::new()
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the conversation to resume.
    pub fn with_conversation(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets whether thinking text is displayed.
    pub fn with_show_thinking(mut self, show: bool) -> Self {
        self.show_thinking = show;
        self
    }

    /// Sets the pacing tick. `None` disables pacing.
    pub fn with_pace(mut self, pace: Option<Duration>) -> Self {
        self.pace = pace;
        self
    }

    /// Sets the number of characters revealed per pacing tick.
    pub fn with_units_per_tick(mut self, units: usize) -> Self {
        self.units_per_tick = units.max(1);
        self
    }

    /// Sets the composite style.
    pub fn with_style(mut self, style: CompositeStyle) -> Self {
        self.style = style;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig::resolve(&args, None)
    }
}
