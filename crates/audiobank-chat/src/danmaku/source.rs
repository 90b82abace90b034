//! Where polled messages come from

use audiobank::network::HttpClient;

use crate::config::ChatConfig;
use crate::error::Result;

use super::types::Danmaku;

/// A relay that returns its current message list
pub trait MessageSource: Send + 'static {
    fn fetch(&self) -> Result<Vec<Danmaku>>;
}

/// Relay reached over HTTP (`GET {url}getMessages`)
pub struct HttpMessageSource {
    client: HttpClient,
    url: String,
}

impl HttpMessageSource {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
            url: config.messages_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MessageSource for HttpMessageSource {
    fn fetch(&self) -> Result<Vec<Danmaku>> {
        // The relay answers `null` when it has nothing yet
        let batch: Option<Vec<Danmaku>> = self.client.get_json(&self.url)?;
        Ok(batch.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_config() {
        let source = HttpMessageSource::new(&ChatConfig::default()).unwrap();
        assert_eq!(source.url(), "http://127.0.0.1:5252/getMessages");
    }

    #[test]
    fn test_unreachable_relay_is_an_error() {
        let config = ChatConfig {
            url: "http://invalid.invalid.invalid/".to_string(),
            ..ChatConfig::default()
        };
        let source = HttpMessageSource::new(&config).unwrap();
        assert!(source.fetch().is_err());
    }
}
