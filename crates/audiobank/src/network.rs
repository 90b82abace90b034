//! Shared HTTP client wrapper
//!
//! Thin wrapper around `reqwest::blocking::Client` that centralizes
//! USER_AGENT and timeout configuration. Used to fetch remote clips and
//! polled JSON feeds.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::network::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT};
use crate::error::Result;

/// Shared HTTP client with standard configuration
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    /// Create a new client with default Audiobank settings
    pub fn new() -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()?;
        Ok(Self { inner })
    }

    /// GET a URL and deserialize the JSON response
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.inner.get(url).send()?.error_for_status()?;
        let data = resp.json::<T>()?;
        Ok(data)
    }

    /// GET a URL and return the whole body
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.inner.get(url).send()?.error_for_status()?;
        let body = resp.bytes()?;
        tracing::debug!(url, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}
