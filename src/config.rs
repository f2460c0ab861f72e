//! Connection settings for [`ChatClient`](crate::ChatClient).
//!
//! Settings come from three places, in increasing order of precedence: an optional YAML
//! profile, the environment, and explicit values supplied by the caller (usually the command
//! line).

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "doubao-seed-1-6-thinking-250715";

/// Timeout for REST calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the base URL.
pub const BASE_URL_ENV: &str = "PARLEY_BASE_URL";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "PARLEY_TOKEN";

/// Settings for a [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the API. Always ends with `/`.
    pub base_url: Url,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Total timeout for REST calls. The chat stream is not subject to it.
    pub timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: normalize_base_url(default_base_url()),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

fn default_base_url() -> Url {
    match Url::parse(DEFAULT_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("DEFAULT_BASE_URL is a valid URL"),
    }
}

/// Ensures `url` ends with `/` so that relative paths join below it.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl ClientConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `base_url` and sets it as the root of the API.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)?;
        self.base_url = normalize_base_url(url);
        Ok(self)
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the timeout for REST calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Reads `PARLEY_BASE_URL` and `PARLEY_TOKEN` on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| env::var(key).ok())
    }

    /// Applies a profile on top of this configuration.
    pub fn apply_profile(mut self, profile: &Profile) -> Result<Self> {
        if let Some(base_url) = &profile.base_url {
            self = self.with_base_url(base_url)?;
        }
        if let Some(token) = &profile.token {
            self.token = Some(token.clone());
        }
        if let Some(secs) = profile.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    /// Applies environment settings, looked up through `lookup`, on top of this configuration.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|s| !s.is_empty()) {
            self = self.with_base_url(&base_url)?;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|s| !s.is_empty()) {
            self.token = Some(token);
        }
        Ok(self)
    }

    /// Resolves the final URL for `path`, which must be relative.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// A named set of defaults, stored as YAML.
///
/// ```yaml
/// base_url: http://chat.internal:8000
/// token: eyJhbGciOi...
/// model: qwen3-max
/// pace_ms: 15
/// show_thinking: true
/// timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Root of the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Model for new messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Milliseconds per reveal tick; absent disables pacing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace_ms: Option<u64>,
    /// Whether thinking text is displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_thinking: Option<bool>,
    /// Timeout for REST calls, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Profile {
    /// Parses a profile from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads a profile from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read profile {}", path.display()), err)
        })?;
        Self::from_yaml(&content)
    }

    /// Serializes the profile to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
