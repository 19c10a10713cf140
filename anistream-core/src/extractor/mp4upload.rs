//! Mp4upload embed player.
//!
//! The `/embed-{id}` page configures its player inline; the media URL is
//! the `src: "...mp4"` entry in that setup script.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::{http_client, VideoExtractor};
use crate::error::Result;
use crate::models::RawSource;

static SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src:\s*"([^"]+\.mp4[^"]*)""#).expect("valid regex"));

pub struct Mp4uploadExtractor {
    client: reqwest::Client,
}

impl Mp4uploadExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn parse(page: &str) -> Option<String> {
        SRC_RE.captures(page).map(|caps| caps[1].to_string())
    }
}

#[async_trait]
impl VideoExtractor for Mp4uploadExtractor {
    fn name(&self) -> &'static str {
        "mp4upload"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("mp4upload.com/embed-")
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_the_player_src_url() {
        let page = concat!(
            "<script>player.src({ type: \"video/mp4\", ",
            r#"src: "https://a4.mp4upload.com:282/d/xyz/video.mp4?t=1" });</script>"#
        );
        assert_eq!(
            Mp4uploadExtractor::parse(page),
            Some("https://a4.mp4upload.com:282/d/xyz/video.mp4?t=1".to_string())
        );
    }

    #[test]
    fn page_without_mp4_src_yields_none() {
        assert_eq!(
            Mp4uploadExtractor::parse(r#"<script>src: "poster.jpg"</script>"#),
            None
        );
    }

    #[test]
    fn only_embed_pages_are_claimed() {
        let e = Mp4uploadExtractor::new(Duration::from_secs(5));
        assert!(e.matches("https://www.mp4upload.com/embed-abc123.html"));
        assert!(!e.matches("https://www.mp4upload.com/abc123"));
    }
}
