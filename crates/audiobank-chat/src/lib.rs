//! Audiobank Chat Feed
//!
//! Live-stream danmaku polling and prompt formatting for the avatar's
//! language model. Depends on the `audiobank` crate for networking and
//! error types.

pub mod config;
pub mod danmaku;
pub mod error;
