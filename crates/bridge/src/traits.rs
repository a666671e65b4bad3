use {async_trait::async_trait, std::time::Duration};

use crate::{
    classify::ImageExtension,
    error::Result,
    types::{Identity, OutboundMessage},
};

/// Publish side of the message bus.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Send messages to chat users.
///
/// Text arguments are Telegram-flavoured HTML; implementations fall back to
/// plain text when the HTML is rejected.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    async fn send_text(&self, to: Identity, html: &str) -> Result<()>;

    async fn send_photo(
        &self,
        to: Identity,
        image: Vec<u8>,
        extension: ImageExtension,
        caption: &str,
    ) -> Result<()>;

    async fn send_animation(
        &self,
        to: Identity,
        image: Vec<u8>,
        extension: ImageExtension,
        caption: &str,
    ) -> Result<()>;

    /// Answer `original` in the chat it came from.
    async fn reply(&self, original: &OutboundMessage, html: &str) -> Result<()>;
}

/// Download remote media referenced by bus payloads.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;
}
