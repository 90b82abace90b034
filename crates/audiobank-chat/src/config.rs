//! Configuration for the chat feed

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Danmaku relay defaults
pub mod danmaku {
    /// Relay server assumed when none is configured
    pub const DEFAULT_URL: &str = "http://127.0.0.1:5252/";

    /// Endpoint returning the full message list as JSON
    pub const MESSAGES_ENDPOINT: &str = "getMessages";

    /// Poll cadence in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Prompt language used when none is configured
    pub const DEFAULT_LANGUAGE: &str = "zh";
}

/// Runtime configuration of the danmaku plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Relay base URL; `getMessages` is appended verbatim
    pub url: String,

    /// Forward each new message to the display channel
    pub display: bool,

    /// Prompt language code (`zh` or `ja`)
    pub language: String,

    pub poll_interval_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: danmaku::DEFAULT_URL.to_string(),
            display: false,
            language: danmaku::DEFAULT_LANGUAGE.to_string(),
            poll_interval_ms: danmaku::POLL_INTERVAL_MS,
        }
    }
}

impl ChatConfig {
    /// Full URL of the message list
    pub fn messages_url(&self) -> String {
        format!("{}{}", self.url, danmaku::MESSAGES_ENDPOINT)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(ChatError::Config("url must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ChatError::Config(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
