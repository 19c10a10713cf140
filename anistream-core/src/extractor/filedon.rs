//! Filedon embeds.
//!
//! The player page is an Inertia-style app: the root element carries a
//! `data-page` attribute holding HTML-entity-encoded JSON whose
//! `props.url` is the direct file URL.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, VideoExtractor};
use crate::error::{Error, Result};
use crate::models::RawSource;

static DATA_PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-page="([^"]+)""#).expect("valid regex"));

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    props: PageProps,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    url: Option<String>,
}

/// Decode the named and numeric entities the attribute encoding produces.
fn decode_entities(input: &str) -> String {
    input
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub struct FiledonExtractor {
    client: reqwest::Client,
}

impl FiledonExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
        }
    }

    fn parse(page: &str) -> Result<Option<String>> {
        let Some(caps) = DATA_PAGE_RE.captures(page) else {
            return Ok(None);
        };
        let decoded = decode_entities(&caps[1]);
        let envelope: PageEnvelope = serde_json::from_str(&decoded)
            .map_err(|err| Error::Parse(format!("data-page is not valid JSON: {err}")))?;
        Ok(envelope.props.url.filter(|u| !u.is_empty()))
    }
}

#[async_trait]
impl VideoExtractor for FiledonExtractor {
    fn name(&self) -> &'static str {
        "filedon"
    }

    fn matches(&self, url: &str) -> bool {
        url.contains("filedon.co")
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
