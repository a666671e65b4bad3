use std::time::Duration;

use {async_trait::async_trait, tracing::debug};

use crate::{
    error::{Error, Result},
    traits::MediaFetcher,
};

/// Upper bound for a single image download.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// [`MediaFetcher`] backed by a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn too_large(url: &str, bytes: u64) -> Error {
    Error::unavailable(format!(
        "image at {url} is at least {bytes} bytes, limit is {MAX_IMAGE_BYTES}"
    ))
}

#[async_trait]
impl MediaFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let request = async {
            let mut response = self.client.get(url).timeout(timeout).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            if let Some(len) = response.content_length()
                && len > MAX_IMAGE_BYTES as u64
            {
                return Err(too_large(url, len));
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > MAX_IMAGE_BYTES {
                    return Err(too_large(url, (body.len() + chunk.len()) as u64));
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, Error>(body)
        };

        let body = match tokio::time::timeout(timeout, request).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::timeout("image download", timeout)),
        };

        if body.is_empty() {
            return Err(Error::EmptyBody {
                url: url.to_string(),
            });
        }

        debug!(url, bytes = body.len(), "downloaded image");
        Ok(body)
    }
}
