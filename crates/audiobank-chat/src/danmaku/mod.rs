//! Live-chat (danmaku) feed
//!
//! Polls a relay server for live-stream chat messages and turns the new ones
//! into prompt text for the avatar's language model.

pub mod feed;
pub mod plugin;
pub mod prompt;
pub mod source;
pub mod types;

pub use feed::DanmakuFeed;
pub use plugin::{DanmakuPlugin, SharedFeed};
pub use prompt::format_prompt;
pub use source::{HttpMessageSource, MessageSource};
pub use types::{Danmaku, Language, MessageId};
