//! Danmaku message types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Relay-assigned message id; the relay sends numbers or strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Num(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Num(n) => write!(f, "{}", n),
            MessageId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One live-chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Danmaku {
    pub id: MessageId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
}

impl Danmaku {
    pub fn new(id: MessageId, username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            content: content.into(),
        }
    }
}

/// Prompt language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Zh,
    Ja,
}

impl FromStr for Language {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zh" => Ok(Language::Zh),
            "ja" => Ok(Language::Ja),
            other => Err(ChatError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Zh => write!(f, "zh"),
            Language::Ja => write!(f, "ja"),
        }
    }
}
