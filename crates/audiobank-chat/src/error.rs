//! Error types for the chat feed
//!
//! Feed-level errors that wrap engine errors and add chat-specific variants.

use audiobank::error::BankError;
use thiserror::Error;

/// Chat feed error type
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Engine(#[from] BankError),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the chat feed
pub type Result<T> = std::result::Result<T, ChatError>;
