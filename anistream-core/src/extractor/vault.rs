//! Quota-limited vault storage.
//!
//! Vault embeds reference files behind a bandwidth-metered gateway:
//! `https://{host}/embed/{id}#{key}`. Resolution only fetches metadata
//! (name, size); actual bytes come later through [`VaultClient::open_range`]
//! so playback seeks map to exact byte windows and quota is spent on what
//! the player really reads. The gateway signals exhausted quota with a 429
//! or an `ETOOMANY` body, surfaced here as [`Error::RateLimited`] so
//! callers can stop queueing work against it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{http_client, VideoExtractor};
use crate::error::{Error, Result};
use crate::models::RawSource;

const QUOTA_MARKER: &str = "ETOOMANY";

#[derive(Debug, Clone, Deserialize)]
pub struct VaultDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub size: u64,
}

/// One ranged read: the file's total size plus the byte stream for the
/// requested window.
pub struct VaultRange {
    pub total_size: u64,
    pub stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl std::fmt::Debug for VaultRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultRange")
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

pub struct VaultClient {
    client: reqwest::Client,
    api_base: String,
    host_needle: String,
}

impl VaultClient {
    #[must_use]
    pub fn new(api_base: String, host_needle: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_base: api_base.trim_end_matches('/').to_string(),
            host_needle,
        }
    }

    #[must_use]
    pub fn is_vault_url(&self, url: &str) -> bool {
        url.contains(&self.host_needle) && url.contains("/embed/")
    }

    /// Split `https://{host}/embed/{id}#{key}` into id and decryption key.
    pub fn parse_embed(url: &str) -> Result<(String, String)> {
        let parsed =
            Url::parse(url).map_err(|err| Error::Parse(format!("bad vault URL {url}: {err}")))?;
        let id = parsed
            .path_segments()
            .and_then(|mut segments| {
                segments.find(|s| *s == "embed")?;
                segments.next()
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Parse(format!("vault URL has no file id: {url}")))?
            .to_string();
        let key = parsed
            .fragment()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::Parse(format!("vault URL has no key fragment: {url}")))?
            .to_string();
        Ok((id, key))
    }

    async fn quota_checked(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited("vault bandwidth quota exceeded".to_string()));
        }
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if body.contains(QUOTA_MARKER) {
            return Err(Error::RateLimited("vault bandwidth quota exceeded".to_string()));
        }
        Err(Error::UpstreamFetch(format!("vault gateway answered {status}")))
    }

    /// Fetch the file's metadata without spending transfer quota.
    pub async fn descriptor(&self, embed_url: &str) -> Result<VaultDescriptor> {
        let (id, key) = Self::parse_embed(embed_url)?;
        let response = self
            .client
            .post(format!("{}/meta", self.api_base))
            .json(&serde_json::json!({ "id": id, "key": key }))
            .send()
            .await?;
        let response = Self::quota_checked(response).await?;
        response
            .json::<VaultDescriptor>()
            .await
            .map_err(|err| Error::Parse(format!("vault metadata is not JSON: {err}")))
    }

    /// Open a byte window `[start, end]` (inclusive) of the file. The
    /// gateway streams raw bytes without range headers, so the caller
    /// synthesizes `Content-Range` from the descriptor it already holds.
    pub async fn open_range(&self, embed_url: &str, start: u64, end: u64) -> Result<VaultRange> {
        if end < start {
            return Err(Error::InvalidInput(format!(
                "byte range {start}-{end} is inverted"
            )));
        }
        let descriptor = self.descriptor(embed_url).await?;
        if start >= descriptor.size {
            return Err(Error::InvalidInput(format!(
                "range start {start} beyond file size {}",
                descriptor.size
            )));
        }
        let (id, key) = Self::parse_embed(embed_url)?;
        let end = end.min(descriptor.size.saturating_sub(1));
        let response = self
            .client
            .get(format!("{}/download/{id}", self.api_base))
            .query(&[("start", start.to_string()), ("end", end.to_string())])
            .header("x-vault-key", key)
            .send()
            .await?;
        let response = Self::quota_checked(response).await?;
        Ok(VaultRange {
            total_size: descriptor.size,
            stream: response.bytes_stream().boxed(),
        })
    }
}

/// Registry entry for vault embeds. Resolution is the metadata probe: a
/// reachable file keeps its embed URL as the "resolved" URL, which the
/// delivery layer recognizes and serves through ranged vault reads.
pub struct VaultExtractor {
    client: std::sync::Arc<VaultClient>,
}

impl VaultExtractor {
    #[must_use]
    pub fn new(client: std::sync::Arc<VaultClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VideoExtractor for VaultExtractor {
    fn name(&self) -> &'static str {
        "vault"
    }

    fn matches(&self, url: &str) -> bool {
        self.client.is_vault_url(url)
    }

    async fn extract(&self, source: &RawSource) -> Result<Option<String>> {
        let descriptor = self.client.descriptor(&source.embed_url).await?;
        if descriptor.size == 0 {
            return Ok(None);
        }
        Ok(Some(source.embed_url.clone()))
    }
}
