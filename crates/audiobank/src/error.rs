//! Error types for the audio bank
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::audio::types::ClipId;

/// Main error type for the audio bank
#[derive(Error, Debug)]
pub enum BankError {
    #[error("Audio not found: {0}")]
    NotFound(ClipId),

    #[error("Audio not ready: {0}")]
    NotReady(ClipId),

    #[error("Media error: {0}")]
    Media(String),

    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

/// Result type alias for the audio bank
pub type Result<T> = std::result::Result<T, BankError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    if e.is_status() {
        if let Some(status) = e.status() {
            return format!("Server responded with {status}");
        }
    }
    if e.is_decode() {
        return "Invalid response from server".to_string();
    }
    format!("Network error: {e}")
}
