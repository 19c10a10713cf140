//! Direct-link passthrough.
//!
//! Some servers already hand out a fetchable media URL as the embed
//! reference. Nothing to resolve; the URL is returned as-is so it still
//! lands in the resolved-URL cache and sorts with the rest.

use async_trait::async_trait;

use super::VideoExtractor;
use crate::error::Result;
use crate::models::RawSource;

pub struct DirectLinkExtractor;

const DIRECT_HOST_NEEDLES: &[&str] = &["googlevideo.com"];
const DIRECT_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".webm", ".mkv"];

#[async_trait]
impl VideoExtractor for DirectLinkExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn matches(&self, url: &str) -> bool {
        if DIRECT_HOST_NEEDLES.iter().any(|n| url.contains(n)) {
            return true;
        }
        let path = url.split(['?', '#']).next().unwrap_or(url);
        DIRECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    async fn extract(&self, source: &RawSource) -> Result<Option<String>> {
        Ok(Some(source.embed_url.clone()))
    }
}
