//! Blogger-hosted video embeds.
//!
//! The embed page inlines a `VIDEO_CONFIG` JSON object whose `streams`
//! array carries googlevideo play URLs. No JavaScript runs here; we lift
//! the object straight out of the page text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, VideoExtractor};
use crate::error::{Error, Result};
use crate::models::RawSource;

static VIDEO_CONFIG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)var\s+VIDEO_CONFIG\s*=\s*(\{.*?\})\s*</script>"#).expect("valid regex")
});

#[derive(Debug, Deserialize)]
struct VideoConfig {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    play_url: String,
}

pub struct BloggerExtractor {
    client: reqwest::Client,
}

impl BloggerExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn parse(page: &str) -> Result<Option<String>> {
        let Some(caps) = VIDEO_CONFIG_RE.captures(page) else {
            return Ok(None);
        };
        let config: VideoConfig = serde_json::from_str(&caps[1])
            .map_err(|err| Error::Parse(format!("VIDEO_CONFIG is not valid JSON: {err}")))?;
        Ok(config.streams.first().map(|s| s.play_url.clone()))
    }
}

#[async_trait]
impl VideoExtractor for BloggerExtractor {
    fn name(&self) -> &'static str {
        "blogger"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("blogger.com/video.g") || url.contains("blogspot.com/video.g")
    }

    async fn extract(&self, source: &RawSource) -> Result<Option<String>> {
        let page = self
            .client
            .get(&source.embed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Self::parse(&page)
    }
}
