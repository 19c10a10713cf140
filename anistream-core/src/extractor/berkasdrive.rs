//! Berkasdrive streaming pages.
//!
//! The page is a bare HTML5 player: the media URL sits in a
//! `<source src="..." type="video/mp4">` tag.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::{http_client, VideoExtractor};
use crate::error::Result;
use crate::models::RawSource;

static SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<source\s+src="([^"]+)"\s+type="video/mp4""#).expect("valid regex"));

pub struct BerkasdriveExtractor {
    client: reqwest::Client,
}

impl BerkasdriveExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn parse(page: &str) -> Option<String> {
        SOURCE_RE
            .captures(page)
            .map(|caps| caps[1].to_string())
            .filter(|u| !u.is_empty())
    }
}

#[async_trait]
impl VideoExtractor for BerkasdriveExtractor {
    fn name(&self) -> &'static str {
        "berkasdrive"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("berkasdrive.com")
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
        Ok(Self::parse(&page))
    }
}
